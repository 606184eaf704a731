//! Core quiz library shared by the player and the authoring preview.
//!
//! Provides:
//! - Text normalizer for author-supplied rich text
//! - Gap extractor for the bracketed fill-in-the-blank syntax
//! - Answer model with a self-describing wire encoding
//! - Scoring engine over heterogeneous question lists
//! - Quiz flow state machine for both display modes

pub mod answers;
pub mod error;
pub mod gaps;
pub mod normalize;
pub mod scoring;
pub mod state;
pub mod types;

pub use answers::{Answer, AnswerMap, GapAnswers};
pub use error::{AnswerDecodeError, StateError};
pub use gaps::{extract_correct_answers, extract_gaps, GapSpec, DEFAULT_SEPARATOR};
pub use normalize::normalize;
pub use scoring::{
    grade, requires_manual_review, score, QuestionOutcome, ScoreReport, ScoreSummary,
    PASS_THRESHOLD,
};
pub use state::{QuizFlow, QuizState};
pub use types::{
    ChoiceOption, DisplayMode, MatchingPair, Question, QuestionKind, QuizDefinition,
};
