//! Quiz definition types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::gaps::DEFAULT_SEPARATOR;

/// How the player walks the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Sequential single-question flow.
    OneByOne,
    /// Single scrollable feed of all questions.
    AllAtOnce,
}

impl Default for DisplayMode {
    fn default() -> Self {
        Self::OneByOne
    }
}

/// One selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter: Option<String>,
}

/// A pair in a matching question, in authored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

/// Type-specific question payload, tagged by `question_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "question_type", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice {
        options: Vec<ChoiceOption>,
        /// Index of the correct option.
        correct_answer: usize,
    },
    MediaQuestion {
        options: Vec<ChoiceOption>,
        correct_answer: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_url: Option<String>,
    },
    MultipleChoice {
        options: Vec<ChoiceOption>,
        /// Set of correct option indices.
        correct_answer: BTreeSet<usize>,
    },
    ShortAnswer {
        /// Pipe-delimited list of accepted variants.
        correct_answer: String,
    },
    MediaOpenQuestion {
        correct_answer: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_url: Option<String>,
    },
    LongText {
        #[serde(skip_serializing_if = "Option::is_none")]
        expected_length: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        keywords: Option<Vec<String>>,
    },
    FillBlank {
        /// Passage text containing `[[...]]` gap markers.
        content_text: String,
        /// Expected answer per gap, aligned to gap order.
        correct_answer: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gap_separator: Option<String>,
    },
    TextCompletion {
        content_text: String,
        correct_answer: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gap_separator: Option<String>,
    },
    Matching {
        matching_pairs: Vec<MatchingPair>,
    },
    /// Display-only; contributes to neither score nor total.
    ImageContent {
        #[serde(skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
    },
}

impl QuestionKind {
    /// The `question_type` tag as it appears on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SingleChoice { .. } => "single_choice",
            Self::MediaQuestion { .. } => "media_question",
            Self::MultipleChoice { .. } => "multiple_choice",
            Self::ShortAnswer { .. } => "short_answer",
            Self::MediaOpenQuestion { .. } => "media_open_question",
            Self::LongText { .. } => "long_text",
            Self::FillBlank { .. } => "fill_blank",
            Self::TextCompletion { .. } => "text_completion",
            Self::Matching { .. } => "matching",
            Self::ImageContent { .. } => "image_content",
        }
    }
}

/// A quiz question: common envelope plus type-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub points: u32,
    pub order_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// Whether this is a free-text question graded by a human.
    pub fn is_long_text(&self) -> bool {
        matches!(self.kind, QuestionKind::LongText { .. })
    }

    /// Whether this question carries gaps in passage text.
    pub fn is_gap_fill(&self) -> bool {
        matches!(
            self.kind,
            QuestionKind::FillBlank { .. } | QuestionKind::TextCompletion { .. }
        )
    }

    /// Passage text and separator for gap questions.
    pub fn gap_source(&self) -> Option<(&str, &str)> {
        match &self.kind {
            QuestionKind::FillBlank {
                content_text,
                gap_separator,
                ..
            }
            | QuestionKind::TextCompletion {
                content_text,
                gap_separator,
                ..
            } => Some((
                content_text.as_str(),
                gap_separator.as_deref().unwrap_or(DEFAULT_SEPARATOR),
            )),
            _ => None,
        }
    }
}

/// A quiz as owned by a lesson step.
///
/// Immutable from the learner's perspective during an attempt; author edits
/// produce a new content version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub title: String,
    #[serde(default)]
    pub display_mode: DisplayMode,
    pub questions: Vec<Question>,
}
