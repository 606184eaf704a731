//! Shared fixtures and a scripted fake attempt store for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use quiz_core::types::{ChoiceOption, DisplayMode, Question, QuestionKind, QuizDefinition};
use quiz_player::api::{
    ApiError, AttemptApi, AttemptDraft, AttemptUpdate, QuizAttempt, StepDefinition,
};
use quiz_player::hash::content_hash;
use quiz_player::session::StepRef;

pub const STEP: StepRef = StepRef {
    course_id: 10,
    lesson_id: 20,
    step_id: 77,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

// === quiz fixtures ===

fn choice(id: i64, text: &str, is_correct: bool) -> ChoiceOption {
    ChoiceOption {
        id,
        text: text.into(),
        is_correct,
        letter: None,
    }
}

pub fn single_choice_question(id: i64, correct: usize) -> Question {
    Question {
        id,
        points: 1,
        order_index: 0,
        explanation: None,
        kind: QuestionKind::SingleChoice {
            options: vec![choice(1, "first", correct == 0), choice(2, "second", correct == 1)],
            correct_answer: correct,
        },
    }
}

pub fn fill_blank_question(id: i64, content_text: &str) -> Question {
    Question {
        id,
        points: 1,
        order_index: 0,
        explanation: None,
        kind: QuestionKind::FillBlank {
            content_text: content_text.into(),
            correct_answer: quiz_core::extract_correct_answers(content_text, ","),
            gap_separator: None,
        },
    }
}

pub fn long_text_question(id: i64) -> Question {
    Question {
        id,
        points: 1,
        order_index: 0,
        explanation: None,
        kind: QuestionKind::LongText {
            expected_length: None,
            keywords: None,
        },
    }
}

fn definition(mode: DisplayMode, questions: Vec<Question>) -> QuizDefinition {
    QuizDefinition {
        title: "Colours of the world".into(),
        display_mode: mode,
        questions,
    }
}

/// One single-choice question (correct index 1) and one two-gap fill-blank.
pub fn mixed_definition() -> QuizDefinition {
    definition(
        DisplayMode::OneByOne,
        vec![
            single_choice_question(1, 1),
            fill_blank_question(2, "sky [[blue*,azure]] grass [[green*]]"),
        ],
    )
}

/// Four sequential single-choice questions.
pub fn long_definition() -> QuizDefinition {
    definition(
        DisplayMode::OneByOne,
        (1..=4).map(|id| single_choice_question(id, 1)).collect(),
    )
}

pub fn single_question_definition() -> QuizDefinition {
    definition(DisplayMode::OneByOne, vec![single_choice_question(1, 1)])
}

pub fn long_text_definition() -> QuizDefinition {
    definition(DisplayMode::OneByOne, vec![long_text_question(1)])
}

pub fn feed_definition() -> QuizDefinition {
    definition(
        DisplayMode::AllAtOnce,
        vec![single_choice_question(1, 1), single_choice_question(2, 0)],
    )
}

pub fn content_of(def: &QuizDefinition) -> String {
    serde_json::to_string(def).expect("definition serializes")
}

// === attempt fixtures ===

pub fn draft_attempt(content_text: &str, answers: String, index: usize) -> QuizAttempt {
    QuizAttempt {
        id: Uuid::new_v4(),
        step_id: STEP.step_id,
        course_id: STEP.course_id,
        lesson_id: STEP.lesson_id,
        answers,
        current_question_index: index,
        time_spent_seconds: 120,
        is_draft: true,
        is_graded: false,
        score_percentage: 0.0,
        total_questions: 0,
        correct_answers: 0,
        quiz_content_hash: content_hash(content_text),
        updated_at: Utc::now(),
    }
}

pub fn finalized_attempt(content_text: &str, correct: u32, total: u32) -> QuizAttempt {
    QuizAttempt {
        is_draft: false,
        is_graded: true,
        score_percentage: f64::from(correct) / f64::from(total) * 100.0,
        total_questions: total,
        correct_answers: correct,
        ..draft_attempt(content_text, "[]".into(), 0)
    }
}

// === fake attempt store ===

#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<FakeApiState>>,
}

#[derive(Default)]
pub struct FakeApiState {
    pub step_content: String,
    pub attempts: Vec<QuizAttempt>,
    pub list_calls: usize,
    pub create_calls: usize,
    pub update_calls: usize,
    pub fail_creates: bool,
    pub fail_updates: bool,
    pub last_update: Option<AttemptUpdate>,
}

impl FakeApi {
    pub fn new(step_content: impl Into<String>) -> Self {
        let api = Self::default();
        api.lock().step_content = step_content.into();
        api
    }

    pub fn with_attempt(step_content: impl Into<String>, attempt: QuizAttempt) -> Self {
        let api = Self::new(step_content);
        api.lock().attempts.push(attempt);
        api
    }

    pub fn lock(&self) -> MutexGuard<'_, FakeApiState> {
        self.state.lock().expect("fake api lock")
    }
}

#[async_trait]
impl AttemptApi for FakeApi {
    async fn list_attempts(&self, _step_id: i64) -> Result<Vec<QuizAttempt>, ApiError> {
        let mut state = self.lock();
        state.list_calls += 1;
        Ok(state.attempts.clone())
    }

    async fn create_draft(&self, draft: &AttemptDraft) -> Result<QuizAttempt, ApiError> {
        let mut state = self.lock();
        state.create_calls += 1;
        if state.fail_creates {
            return Err(ApiError::Network("injected create failure".into()));
        }
        let attempt = QuizAttempt {
            id: Uuid::new_v4(),
            step_id: draft.step_id,
            course_id: draft.course_id,
            lesson_id: draft.lesson_id,
            answers: draft.answers.clone(),
            current_question_index: draft.current_question_index,
            time_spent_seconds: draft.time_spent_seconds,
            is_draft: true,
            is_graded: false,
            score_percentage: 0.0,
            total_questions: 0,
            correct_answers: 0,
            quiz_content_hash: draft.quiz_content_hash.clone(),
            updated_at: Utc::now(),
        };
        state.attempts.insert(0, attempt.clone());
        Ok(attempt)
    }

    async fn update_attempt(
        &self,
        id: Uuid,
        update: &AttemptUpdate,
    ) -> Result<QuizAttempt, ApiError> {
        let mut state = self.lock();
        state.update_calls += 1;
        if state.fail_updates {
            return Err(ApiError::Network("injected update failure".into()));
        }
        state.last_update = Some(update.clone());
        let row = state
            .attempts
            .iter_mut()
            .find(|attempt| attempt.id == id)
            .ok_or_else(|| ApiError::Backend {
                status: 404,
                message: "attempt not found".into(),
            })?;
        if let Some(answers) = &update.answers {
            row.answers = answers.clone();
        }
        if let Some(index) = update.current_question_index {
            row.current_question_index = index;
        }
        if let Some(seconds) = update.time_spent_seconds {
            row.time_spent_seconds = seconds;
        }
        if let Some(is_draft) = update.is_draft {
            row.is_draft = is_draft;
        }
        if let Some(is_graded) = update.is_graded {
            row.is_graded = is_graded;
        }
        if let Some(percentage) = update.score_percentage {
            row.score_percentage = percentage;
        }
        if let Some(total) = update.total_questions {
            row.total_questions = total;
        }
        if let Some(correct) = update.correct_answers {
            row.correct_answers = correct;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn get_step_definition(&self, _step_id: i64) -> Result<StepDefinition, ApiError> {
        Ok(StepDefinition {
            content_text: self.lock().step_content.clone(),
        })
    }
}

/// Give detached save tasks a chance to run to completion.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
