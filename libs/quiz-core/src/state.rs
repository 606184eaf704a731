//! Quiz flow state machine.
//!
//! One explicit state value with an explicit transition function, instead of
//! flags scattered around the player. The furthest index reached is tracked
//! separately from the current index: surrounding lesson logic uses it for
//! access control, so backward navigation must never move it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::types::DisplayMode;

/// Where the player currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    Title,
    Question,
    Result,
    Feed,
    Completed,
}

impl QuizState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Question => "question",
            Self::Result => "result",
            Self::Feed => "feed",
            Self::Completed => "completed",
        }
    }
}

/// Navigation state for one quiz run.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizFlow {
    mode: DisplayMode,
    state: QuizState,
    question_count: usize,
    current_index: usize,
    furthest_index: usize,
    feed_checked: bool,
    started_at: Option<DateTime<Utc>>,
}

fn entry_state(mode: DisplayMode) -> QuizState {
    match mode {
        DisplayMode::OneByOne => QuizState::Title,
        DisplayMode::AllAtOnce => QuizState::Feed,
    }
}

impl QuizFlow {
    /// A fresh flow at the mode's entry state.
    pub fn new(mode: DisplayMode, question_count: usize) -> Self {
        Self {
            mode,
            state: entry_state(mode),
            question_count,
            current_index: 0,
            furthest_index: 0,
            feed_checked: false,
            started_at: None,
        }
    }

    /// Resume a draft attempt mid-run at a stored index.
    pub fn resume_draft(
        mode: DisplayMode,
        question_count: usize,
        index: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        let index = index.min(question_count.saturating_sub(1));
        Self {
            mode,
            state: match mode {
                DisplayMode::OneByOne => QuizState::Question,
                DisplayMode::AllAtOnce => QuizState::Feed,
            },
            question_count,
            current_index: index,
            furthest_index: index,
            feed_checked: false,
            started_at: Some(started_at),
        }
    }

    /// Restore a finalized attempt straight into `Completed`.
    pub fn resume_completed(mode: DisplayMode, question_count: usize) -> Self {
        Self {
            mode,
            state: QuizState::Completed,
            question_count,
            current_index: 0,
            furthest_index: question_count.saturating_sub(1),
            feed_checked: false,
            started_at: None,
        }
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn furthest_index(&self) -> usize {
        self.furthest_index
    }

    pub fn feed_checked(&self) -> bool {
        self.feed_checked
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Begin the run, recording the start timestamp.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<QuizState, StateError> {
        match self.state {
            QuizState::Title => {
                self.started_at = Some(now);
                self.state = if self.question_count == 0 {
                    QuizState::Completed
                } else {
                    match self.mode {
                        DisplayMode::OneByOne => QuizState::Question,
                        DisplayMode::AllAtOnce => QuizState::Feed,
                    }
                };
                Ok(self.state)
            }
            QuizState::Feed if self.started_at.is_none() => {
                self.started_at = Some(now);
                if self.question_count == 0 {
                    self.state = QuizState::Completed;
                }
                Ok(self.state)
            }
            _ => Err(self.invalid("start")),
        }
    }

    /// Submit the current question's answer.
    ///
    /// Free-text questions skip the result screen and advance directly,
    /// completing the quiz on the last question.
    pub fn submit(&mut self, long_text: bool) -> Result<QuizState, StateError> {
        if self.state != QuizState::Question {
            return Err(self.invalid("submit"));
        }
        if long_text {
            self.step_forward();
        } else {
            self.state = QuizState::Result;
        }
        Ok(self.state)
    }

    /// Leave the result screen for the next question, or complete.
    pub fn advance(&mut self) -> Result<QuizState, StateError> {
        if self.state != QuizState::Result {
            return Err(self.invalid("advance"));
        }
        self.step_forward();
        Ok(self.state)
    }

    /// Navigate backward (or forward within reached ground) for review.
    pub fn revisit(&mut self, index: usize) -> Result<QuizState, StateError> {
        if !matches!(self.state, QuizState::Question | QuizState::Result) {
            return Err(self.invalid("revisit"));
        }
        if index >= self.question_count {
            return Err(StateError::IndexOutOfRange {
                index,
                count: self.question_count,
            });
        }
        if index > self.furthest_index {
            return Err(StateError::PastFurthest {
                index,
                furthest: self.furthest_index,
            });
        }
        self.current_index = index;
        self.state = QuizState::Question;
        Ok(self.state)
    }

    /// Mark the feed as reviewed. Not a transition.
    pub fn mark_checked(&mut self) -> Result<(), StateError> {
        if self.state != QuizState::Feed {
            return Err(self.invalid("review"));
        }
        self.feed_checked = true;
        Ok(())
    }

    /// Finish a feed-mode run.
    pub fn finish(&mut self) -> Result<QuizState, StateError> {
        if self.state != QuizState::Feed {
            return Err(self.invalid("finish"));
        }
        self.state = QuizState::Completed;
        Ok(self.state)
    }

    /// Re-enter the quiz after completion.
    ///
    /// The furthest index is kept: forward progress markers never regress.
    pub fn reset(&mut self) -> Result<QuizState, StateError> {
        if self.state != QuizState::Completed {
            return Err(self.invalid("reset"));
        }
        self.state = entry_state(self.mode);
        self.current_index = 0;
        self.feed_checked = false;
        self.started_at = None;
        Ok(self.state)
    }

    fn step_forward(&mut self) {
        if self.current_index + 1 < self.question_count {
            self.current_index += 1;
            self.furthest_index = self.furthest_index.max(self.current_index);
            self.state = QuizState::Question;
        } else {
            self.furthest_index = self.furthest_index.max(self.current_index);
            self.state = QuizState::Completed;
        }
    }

    fn invalid(&self, event: &'static str) -> StateError {
        StateError::InvalidTransition {
            state: self.state.name(),
            event,
        }
    }
}
