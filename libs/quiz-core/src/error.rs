//! Error types for quiz-core.

use thiserror::Error;

/// Errors from illegal quiz flow transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot {event} from {state} state")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("question index {index} out of range for {count} questions")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("cannot revisit index {index} past furthest reached {furthest}")]
    PastFurthest { index: usize, furthest: usize },
}

/// Errors from decoding a persisted answer value.
#[derive(Debug, Error)]
pub enum AnswerDecodeError {
    #[error("unsupported answer shape: {0}")]
    UnsupportedShape(String),

    #[error("malformed pair map entry")]
    MalformedPairMap,

    #[error("answer collection is not a list of [question_id, value] pairs")]
    NotAPairList,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
