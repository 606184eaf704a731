//! Quiz session: loads, drives and persists one attempt for one step.
//!
//! The server is the system of record; the local cache is a resumability
//! fallback only. Every answer change is written to the cache synchronously
//! and to the server through a debounced draft save that always snapshots
//! the latest in-memory state at send time. Finalization persists the score
//! first and clears the cache only once the server accepted it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use quiz_core::answers::{Answer, AnswerMap, GapAnswers};
use quiz_core::scoring::{grade, requires_manual_review, ScoreSummary};
use quiz_core::state::{QuizFlow, QuizState};
use quiz_core::types::{Question, QuizDefinition};

use crate::api::{AttemptApi, AttemptDraft, AttemptUpdate, QuizAttempt};
use crate::cache::{answers_key, gap_answers_key, StepCache};
use crate::debounce::Debouncer;
use crate::error::SessionError;
use crate::hash::content_hash;

/// Identifiers tying an attempt to its place in a course.
#[derive(Debug, Clone, Copy)]
pub struct StepRef {
    pub course_id: i64,
    pub lesson_id: i64,
    pub step_id: i64,
}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay before a changed answer is written to the server as a draft.
    pub autosave_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: Duration::from_secs(3),
        }
    }
}

/// How a session came up after [`QuizSession::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No usable prior state anywhere.
    Fresh,
    /// Answers restored from the local cache; navigation starts over.
    CacheRestored,
    /// Draft attempt resumed from the server at its stored position.
    DraftResumed,
    /// Finalized attempt restored with its stored score.
    CompletedRestored,
    /// A prior attempt existed but the quiz changed since; its state was
    /// discarded and the cache cleared.
    DefinitionChanged,
}

struct SessionState {
    definition: QuizDefinition,
    content_hash: String,
    flow: QuizFlow,
    answers: AnswerMap,
    gap_answers: GapAnswers,
    attempt_id: Option<Uuid>,
    base_time_seconds: u64,
    counting_since: DateTime<Utc>,
    revision: u64,
    saved_revision: u64,
    last_score: Option<ScoreSummary>,
}

impl SessionState {
    fn fresh(definition: QuizDefinition, content_hash: String, now: DateTime<Utc>) -> Self {
        let flow = QuizFlow::new(definition.display_mode, definition.questions.len());
        Self {
            definition,
            content_hash,
            flow,
            answers: AnswerMap::new(),
            gap_answers: GapAnswers::new(),
            attempt_id: None,
            base_time_seconds: 0,
            counting_since: now,
            revision: 0,
            saved_revision: 0,
            last_score: None,
        }
    }

    fn restore_attempt(&mut self, attempt: &QuizAttempt, now: DateTime<Utc>) -> LoadOutcome {
        match AnswerMap::decode(&attempt.answers) {
            Ok(merged) => {
                let (answers, gap_answers) = split_gap_answers(&self.definition.questions, merged);
                self.answers = answers;
                self.gap_answers = gap_answers;
            }
            Err(err) => {
                warn!(attempt_id = %attempt.id, error = %err, "stored answers unreadable; resuming without them");
            }
        }
        self.attempt_id = Some(attempt.id);
        self.base_time_seconds = attempt.time_spent_seconds;
        self.counting_since = now;

        let count = self.definition.questions.len();
        if attempt.is_draft {
            self.flow = QuizFlow::resume_draft(
                self.definition.display_mode,
                count,
                attempt.current_question_index,
                now,
            );
            LoadOutcome::DraftResumed
        } else {
            self.flow = QuizFlow::resume_completed(self.definition.display_mode, count);
            self.last_score = Some(ScoreSummary {
                score: attempt.correct_answers,
                total: attempt.total_questions,
            });
            LoadOutcome::CompletedRestored
        }
    }

    /// Server payload view: gap answers folded back into the one collection.
    fn merged_answers(&self) -> AnswerMap {
        let mut merged = self.answers.clone();
        for (question_id, texts) in self.gap_answers.iter() {
            merged.set(question_id, Answer::Texts(texts.to_vec()));
        }
        merged
    }

    fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        let running = (now - self.counting_since).num_seconds().max(0) as u64;
        self.base_time_seconds + running
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Split gap-question `Texts` entries out of a merged answer collection.
fn split_gap_answers(questions: &[Question], mut merged: AnswerMap) -> (AnswerMap, GapAnswers) {
    let mut gap_answers = GapAnswers::new();
    for question in questions.iter().filter(|q| q.is_gap_fill()) {
        if let Some(Answer::Texts(texts)) = merged.get(question.id).cloned() {
            merged.remove(question.id);
            gap_answers.set(question.id, texts);
        }
    }
    (merged, gap_answers)
}

struct SaveSnapshot {
    revision: u64,
    attempt_id: Option<Uuid>,
    answers: String,
    index: usize,
    time_spent: u64,
    hash: String,
}

struct SessionInner<A, C> {
    api: A,
    cache: C,
    step: StepRef,
    state: Mutex<Option<SessionState>>,
    debounce: std::sync::Mutex<Debouncer>,
}

/// The persistence reconciler: entry point when a learner opens a quiz step.
///
/// Cheap to clone; clones share one session.
pub struct QuizSession<A, C> {
    inner: Arc<SessionInner<A, C>>,
}

impl<A, C> Clone for QuizSession<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, C> QuizSession<A, C>
where
    A: AttemptApi + 'static,
    C: StepCache + 'static,
{
    pub fn new(api: A, cache: C, step: StepRef) -> Self {
        Self::with_config(api, cache, step, SessionConfig::default())
    }

    pub fn with_config(api: A, cache: C, step: StepRef, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                api,
                cache,
                step,
                state: Mutex::new(None),
                debounce: std::sync::Mutex::new(Debouncer::new(config.autosave_debounce)),
            }),
        }
    }

    /// Load prior state for this step: server first, cache as fallback.
    pub async fn load(&self) -> Result<LoadOutcome, SessionError> {
        let step_id = self.inner.step.step_id;

        let step = self.inner.api.get_step_definition(step_id).await?;
        let definition: QuizDefinition = serde_json::from_str(&step.content_text)?;
        let hash = content_hash(&step.content_text);

        let attempts = self.inner.api.list_attempts(step_id).await?;

        let now = Utc::now();
        let mut state = SessionState::fresh(definition, hash, now);

        let outcome = match attempts.into_iter().next() {
            Some(attempt) if attempt.quiz_content_hash != state.content_hash => {
                // Definition drift: gap positions or counts may no longer
                // align, so this is a hard invalidation, never a merge.
                debug!(step_id, attempt_id = %attempt.id, "quiz definition changed; discarding stale attempt state");
                self.clear_cache();
                LoadOutcome::DefinitionChanged
            }
            Some(attempt) => {
                let outcome = state.restore_attempt(&attempt, now);
                // The server row is now the sole source of truth.
                self.clear_cache();
                outcome
            }
            None => {
                if self.restore_from_cache(&mut state) {
                    LoadOutcome::CacheRestored
                } else {
                    LoadOutcome::Fresh
                }
            }
        };

        debug!(step_id, ?outcome, "session loaded");
        *self.inner.state.lock().await = Some(state);
        Ok(outcome)
    }

    /// Record an answer change.
    ///
    /// The cache is written synchronously so an abrupt teardown is never
    /// worse than the last committed value; the server write is debounced.
    pub async fn set_answer(&self, question_id: i64, answer: Answer) -> Result<(), SessionError> {
        {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            state.answers.set(question_id, answer);
            state.touch();
            self.write_cache(state);
        }
        self.schedule_autosave();
        Ok(())
    }

    /// Record one gap's text for a gap-fill question.
    pub async fn set_gap_answer(
        &self,
        question_id: i64,
        gap_index: usize,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            state.gap_answers.set_gap(question_id, gap_index, text);
            state.touch();
            self.write_cache(state);
        }
        self.schedule_autosave();
        Ok(())
    }

    /// Begin the run.
    pub async fn start(&self) -> Result<QuizState, SessionError> {
        let next = {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            state.flow.start(Utc::now())?
        };
        if next == QuizState::Completed {
            self.finalize().await?;
        }
        Ok(next)
    }

    /// Submit the current question. Completing the quiz finalizes it; a
    /// finalize failure surfaces here.
    pub async fn submit_current(&self) -> Result<QuizState, SessionError> {
        let next = {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            let index = state.flow.current_index();
            let long_text = state
                .definition
                .questions
                .get(index)
                .map(Question::is_long_text)
                .unwrap_or(false);
            let next = state.flow.submit(long_text)?;
            if next != QuizState::Completed {
                state.touch();
            }
            next
        };
        self.after_transition(next).await?;
        Ok(next)
    }

    /// Leave the result screen for the next question, or complete.
    pub async fn advance(&self) -> Result<QuizState, SessionError> {
        let next = {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            let next = state.flow.advance()?;
            if next != QuizState::Completed {
                state.touch();
            }
            next
        };
        self.after_transition(next).await?;
        Ok(next)
    }

    /// Navigate backward for review; forward progress markers are kept.
    pub async fn revisit(&self, index: usize) -> Result<QuizState, SessionError> {
        let next = {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            let next = state.flow.revisit(index)?;
            state.touch();
            next
        };
        self.schedule_autosave();
        Ok(next)
    }

    /// Mark the feed as reviewed (no transition).
    pub async fn mark_feed_checked(&self) -> Result<(), SessionError> {
        let mut guard = self.inner.state.lock().await;
        let state = self.require_mut(&mut guard)?;
        state.flow.mark_checked()?;
        Ok(())
    }

    /// Finish a feed-mode run, finalizing the attempt.
    pub async fn finish(&self) -> Result<QuizState, SessionError> {
        {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            state.flow.finish()?;
        }
        self.finalize().await?;
        Ok(QuizState::Completed)
    }

    /// Retry persisting a completed run after a finalize failure.
    ///
    /// Until this succeeds the attempt is still a draft on the server (or
    /// local-only) even though the flow shows completed.
    pub async fn retry_finalize(&self) -> Result<ScoreSummary, SessionError> {
        {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            if state.flow.state() != QuizState::Completed {
                return Err(SessionError::Flow(quiz_core::StateError::InvalidTransition {
                    state: state.flow.state().name(),
                    event: "finalize",
                }));
            }
        }
        self.finalize().await
    }

    /// Re-enter the quiz after completion. Prior answers are retained for
    /// edit-and-resubmit unless explicitly cleared.
    pub async fn reset(&self, clear_answers: bool) -> Result<QuizState, SessionError> {
        let mut guard = self.inner.state.lock().await;
        let state = self.require_mut(&mut guard)?;
        let next = state.flow.reset()?;
        if clear_answers {
            state.answers.clear();
            state.gap_answers.clear();
            state.touch();
            self.write_cache(state);
        }
        Ok(next)
    }

    /// Tear the session down. Cancels the pending (not yet fired) autosave
    /// timer; an in-flight save is never cancelled. With `flush`, unsent
    /// changes are written out immediately, best-effort.
    pub async fn teardown(&self, flush: bool) {
        self.cancel_pending_save();
        if flush {
            if let Err(err) = self.autosave().await {
                warn!(step_id = self.inner.step.step_id, error = %err, "teardown flush failed");
            }
        }
    }

    // === accessors ===

    pub async fn quiz_state(&self) -> Result<QuizState, SessionError> {
        self.with_state(|state| state.flow.state()).await
    }

    pub async fn current_index(&self) -> Result<usize, SessionError> {
        self.with_state(|state| state.flow.current_index()).await
    }

    pub async fn furthest_index(&self) -> Result<usize, SessionError> {
        self.with_state(|state| state.flow.furthest_index()).await
    }

    pub async fn attempt_id(&self) -> Result<Option<Uuid>, SessionError> {
        self.with_state(|state| state.attempt_id).await
    }

    pub async fn last_score(&self) -> Result<Option<ScoreSummary>, SessionError> {
        self.with_state(|state| state.last_score).await
    }

    pub async fn definition(&self) -> Result<QuizDefinition, SessionError> {
        self.with_state(|state| state.definition.clone()).await
    }

    pub async fn answer(&self, question_id: i64) -> Result<Option<Answer>, SessionError> {
        self.with_state(|state| state.answers.get(question_id).cloned())
            .await
    }

    pub async fn gap_answer(&self, question_id: i64) -> Result<Option<Vec<String>>, SessionError> {
        self.with_state(|state| state.gap_answers.get(question_id).map(<[String]>::to_vec))
            .await
    }

    pub async fn time_spent_seconds(&self) -> Result<u64, SessionError> {
        self.with_state(|state| state.elapsed_seconds(Utc::now()))
            .await
    }

    // === internals ===

    async fn after_transition(&self, next: QuizState) -> Result<(), SessionError> {
        if next == QuizState::Completed {
            self.finalize().await?;
        } else {
            self.schedule_autosave();
        }
        Ok(())
    }

    /// Persist the final score, then clear the cache. Ordering matters: a
    /// crash between score computation and persist must not destroy the
    /// only copy of the answers.
    async fn finalize(&self) -> Result<ScoreSummary, SessionError> {
        // A pending draft save is superseded by this one.
        self.cancel_pending_save();

        let (revision, attempt_id, draft, update, summary) = {
            let mut guard = self.inner.state.lock().await;
            let state = self.require_mut(&mut guard)?;
            let now = Utc::now();

            let report = grade(&state.definition.questions, &state.answers, &state.gap_answers);
            let summary = report.summary;
            let graded = !requires_manual_review(&state.definition.questions);
            let answers = state.merged_answers().encode();

            let draft = AttemptDraft {
                step_id: self.inner.step.step_id,
                course_id: self.inner.step.course_id,
                lesson_id: self.inner.step.lesson_id,
                answers: answers.clone(),
                current_question_index: state.flow.current_index(),
                time_spent_seconds: state.elapsed_seconds(now),
                quiz_content_hash: state.content_hash.clone(),
            };
            let update = AttemptUpdate {
                answers: Some(answers),
                current_question_index: Some(state.flow.current_index()),
                time_spent_seconds: Some(state.elapsed_seconds(now)),
                is_draft: Some(false),
                is_graded: Some(graded),
                score_percentage: Some(summary.percentage()),
                total_questions: Some(summary.total),
                correct_answers: Some(summary.score),
            };
            (state.revision, state.attempt_id, draft, update, summary)
        };

        let id = match attempt_id {
            Some(id) => id,
            None => {
                let created = self.inner.api.create_draft(&draft).await?;
                // Record the row before the finalize write: if that write
                // fails, the retry must update this row, not create another.
                let mut guard = self.inner.state.lock().await;
                if let Some(state) = guard.as_mut() {
                    state.attempt_id = Some(created.id);
                }
                created.id
            }
        };
        self.inner.api.update_attempt(id, &update).await?;

        {
            let mut guard = self.inner.state.lock().await;
            if let Some(state) = guard.as_mut() {
                state.attempt_id = Some(id);
                state.saved_revision = state.saved_revision.max(revision);
                state.last_score = Some(summary);
            }
        }

        // Only now is the cache redundant.
        self.clear_cache();
        debug!(step_id = self.inner.step.step_id, score = summary.score, total = summary.total, "attempt finalized");
        Ok(summary)
    }

    async fn autosave(&self) -> Result<(), SessionError> {
        let Some(snapshot) = self.save_snapshot().await? else {
            return Ok(());
        };
        self.push_draft(snapshot).await
    }

    /// Latest state at send time, or `None` when already saved.
    async fn save_snapshot(&self) -> Result<Option<SaveSnapshot>, SessionError> {
        let guard = self.inner.state.lock().await;
        let state = guard
            .as_ref()
            .ok_or(SessionError::NotLoaded(self.inner.step.step_id))?;
        if state.revision == state.saved_revision {
            return Ok(None);
        }
        Ok(Some(SaveSnapshot {
            revision: state.revision,
            attempt_id: state.attempt_id,
            answers: state.merged_answers().encode(),
            index: state.flow.current_index(),
            time_spent: state.elapsed_seconds(Utc::now()),
            hash: state.content_hash.clone(),
        }))
    }

    async fn push_draft(&self, snapshot: SaveSnapshot) -> Result<(), SessionError> {
        let saved = match snapshot.attempt_id {
            Some(id) => {
                let update = AttemptUpdate {
                    answers: Some(snapshot.answers),
                    current_question_index: Some(snapshot.index),
                    time_spent_seconds: Some(snapshot.time_spent),
                    ..Default::default()
                };
                self.inner.api.update_attempt(id, &update).await?
            }
            None => {
                let draft = AttemptDraft {
                    step_id: self.inner.step.step_id,
                    course_id: self.inner.step.course_id,
                    lesson_id: self.inner.step.lesson_id,
                    answers: snapshot.answers,
                    current_question_index: snapshot.index,
                    time_spent_seconds: snapshot.time_spent,
                    quiz_content_hash: snapshot.hash,
                };
                self.inner.api.create_draft(&draft).await?
            }
        };

        let mut guard = self.inner.state.lock().await;
        if let Some(state) = guard.as_mut() {
            // Remember the draft row so later saves update it in place.
            state.attempt_id = Some(saved.id);
            state.saved_revision = state.saved_revision.max(snapshot.revision);
        }
        Ok(())
    }

    fn schedule_autosave(&self) {
        let session = self.clone();
        let step_id = self.inner.step.step_id;
        self.inner
            .debounce
            .lock()
            .expect("debounce lock")
            .schedule(move || async move {
                if let Err(err) = session.autosave().await {
                    // Non-fatal: the cache still holds the latest answers
                    // and the next change retries.
                    warn!(step_id, error = %err, "draft autosave failed");
                }
            });
    }

    fn cancel_pending_save(&self) {
        self.inner.debounce.lock().expect("debounce lock").cancel();
    }

    fn write_cache(&self, state: &SessionState) {
        let step_id = self.inner.step.step_id;
        self.inner
            .cache
            .put(&answers_key(step_id), &state.answers.encode());
        self.inner
            .cache
            .put(&gap_answers_key(step_id), &state.gap_answers.encode());
    }

    fn restore_from_cache(&self, state: &mut SessionState) -> bool {
        let step_id = self.inner.step.step_id;
        let mut restored = false;

        if let Some(raw) = self.inner.cache.get(&answers_key(step_id)) {
            match AnswerMap::decode(&raw) {
                Ok(answers) if !answers.is_empty() => {
                    state.answers = answers;
                    restored = true;
                }
                Ok(_) => {}
                Err(err) => warn!(step_id, error = %err, "cached answers unreadable; ignoring"),
            }
        }
        if let Some(raw) = self.inner.cache.get(&gap_answers_key(step_id)) {
            match GapAnswers::decode(&raw) {
                Ok(gap_answers) if !gap_answers.is_empty() => {
                    state.gap_answers = gap_answers;
                    restored = true;
                }
                Ok(_) => {}
                Err(err) => warn!(step_id, error = %err, "cached gap answers unreadable; ignoring"),
            }
        }

        restored
    }

    fn clear_cache(&self) {
        let step_id = self.inner.step.step_id;
        self.inner.cache.remove(&answers_key(step_id));
        self.inner.cache.remove(&gap_answers_key(step_id));
    }

    fn require_mut<'a>(
        &self,
        guard: &'a mut tokio::sync::MutexGuard<'_, Option<SessionState>>,
    ) -> Result<&'a mut SessionState, SessionError> {
        guard
            .as_mut()
            .ok_or(SessionError::NotLoaded(self.inner.step.step_id))
    }

    async fn with_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> Result<R, SessionError> {
        let guard = self.inner.state.lock().await;
        let state = guard
            .as_ref()
            .ok_or(SessionError::NotLoaded(self.inner.step.step_id))?;
        Ok(f(state))
    }
}
