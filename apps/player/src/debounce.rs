//! Single-slot debounce timer for autosave scheduling.
//!
//! `schedule` cancels the pending not-yet-fired timer and arms a new one,
//! so rapid changes coalesce into one save carrying the latest state. Once
//! the timer fires the action is detached onto its own task: cancelling the
//! slot never kills a save that is already underway.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Arm the timer, replacing any pending one.
    pub fn schedule<F, Fut>(&mut self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action());
        }));
    }

    /// Drop the pending timer without running its action.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const DELAY: Duration = Duration::from_secs(3);

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_coalesces_to_one_run() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debounce = Debouncer::new(DELAY);

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            debounce.schedule(move || async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(DELAY * 2).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_the_run() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debounce = Debouncer::new(DELAY);

        {
            let fired = Arc::clone(&fired);
            debounce.schedule(move || async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        debounce.cancel();

        tokio::time::sleep(DELAY * 2).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_does_not_kill_the_action() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debounce = Debouncer::new(DELAY);

        {
            let fired = Arc::clone(&fired);
            debounce.schedule(move || async move {
                // An in-flight save takes time; cancellation must not
                // reach it once the timer has fired.
                tokio::time::sleep(Duration::from_secs(1)).await;
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;
        settle().await;
        debounce.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn is_pending_tracks_the_slot() {
        let mut debounce = Debouncer::new(DELAY);
        assert!(!debounce.is_pending());

        debounce.schedule(|| async {});
        assert!(debounce.is_pending());

        tokio::time::sleep(DELAY * 2).await;
        settle().await;
        assert!(!debounce.is_pending());
    }
}
