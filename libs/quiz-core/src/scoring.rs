//! Scoring across a heterogeneous question list.
//!
//! Gap questions are graded against the extractor's canonical answers with
//! the same normalization the authoring surface used, so grading exactly
//! reproduces what the author previewed.

use crate::answers::{Answer, AnswerMap, GapAnswers};
use crate::gaps::extract_correct_answers;
use crate::types::{Question, QuestionKind};

/// Hard pass boundary gating lesson-step progression. Not configurable.
pub const PASS_THRESHOLD: f64 = 0.5;

/// Aggregate result of grading an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSummary {
    pub score: u32,
    pub total: u32,
}

impl ScoreSummary {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.score) / f64::from(self.total) * 100.0
        }
    }

    /// A quiz with nothing scorable counts as passed on completion.
    pub fn passed(&self) -> bool {
        self.total == 0 || f64::from(self.score) / f64::from(self.total) >= PASS_THRESHOLD
    }
}

/// Per-question grading detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub question_id: i64,
    /// Points earned; for gap questions, one per matching gap.
    pub earned: u32,
    /// Points available; gap count for gap questions, otherwise 1.
    pub available: u32,
}

/// Summary plus question-level counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReport {
    pub summary: ScoreSummary,
    pub outcomes: Vec<QuestionOutcome>,
}

/// Compute score and total across the question list.
pub fn score(questions: &[Question], answers: &AnswerMap, gap_answers: &GapAnswers) -> ScoreSummary {
    grade(questions, answers, gap_answers).summary
}

/// Grade every question, keeping gap-level and question-level counts.
pub fn grade(questions: &[Question], answers: &AnswerMap, gap_answers: &GapAnswers) -> ScoreReport {
    let mut outcomes = Vec::new();
    let mut summary = ScoreSummary { score: 0, total: 0 };

    for question in questions {
        let Some(outcome) = grade_question(question, answers, gap_answers) else {
            continue;
        };
        summary.score += outcome.earned;
        summary.total += outcome.available;
        outcomes.push(outcome);
    }

    ScoreReport { summary, outcomes }
}

/// Whether any answer needs human grading before the score is final.
pub fn requires_manual_review(questions: &[Question]) -> bool {
    questions.iter().any(Question::is_long_text)
}

fn grade_question(
    question: &Question,
    answers: &AnswerMap,
    gap_answers: &GapAnswers,
) -> Option<QuestionOutcome> {
    let (earned, available) = match &question.kind {
        QuestionKind::ImageContent { .. } => return None,

        QuestionKind::FillBlank { .. } | QuestionKind::TextCompletion { .. } => {
            let (text, separator) = question.gap_source()?;
            let expected = extract_correct_answers(text, separator);
            let given = gap_answers.get(question.id).unwrap_or(&[]);
            let earned = expected
                .iter()
                .enumerate()
                .filter(|(idx, want)| {
                    given.get(*idx).is_some_and(|got| eq_loose(got, want))
                })
                .count() as u32;
            (earned, expected.len() as u32)
        }

        QuestionKind::SingleChoice { correct_answer, .. }
        | QuestionKind::MediaQuestion { correct_answer, .. } => {
            let correct = matches!(
                answers.get(question.id),
                Some(Answer::Choice(picked)) if picked == correct_answer
            );
            (u32::from(correct), 1)
        }

        QuestionKind::MultipleChoice { correct_answer, .. } => {
            // Exact set equality; a superset earns nothing.
            let correct = matches!(
                answers.get(question.id),
                Some(Answer::Choices(picked)) if picked == correct_answer
            );
            (u32::from(correct), 1)
        }

        QuestionKind::ShortAnswer { correct_answer }
        | QuestionKind::MediaOpenQuestion { correct_answer, .. } => {
            let correct = match answers.get(question.id) {
                Some(Answer::Text(text)) => accepted_variant(text, correct_answer),
                _ => false,
            };
            (u32::from(correct), 1)
        }

        QuestionKind::LongText { .. } => {
            // Auto-credit anything non-blank; real grading is a human's job
            // and is flagged at the attempt level.
            let answered = matches!(
                answers.get(question.id),
                Some(Answer::Text(text)) if !text.trim().is_empty()
            );
            (u32::from(answered), 1)
        }

        QuestionKind::Matching { matching_pairs } => {
            let correct = match answers.get(question.id) {
                Some(Answer::PairMap(entries)) => {
                    entries.len() == matching_pairs.len()
                        && matching_pairs.iter().all(|pair| {
                            entries
                                .iter()
                                .any(|(left, right)| *left == pair.left && *right == pair.right)
                        })
                }
                _ => false,
            };
            (u32::from(correct), 1)
        }
    };

    Some(QuestionOutcome {
        question_id: question.id,
        earned,
        available,
    })
}

fn eq_loose(given: &str, expected: &str) -> bool {
    given.trim().to_lowercase() == expected.trim().to_lowercase()
}

/// `accepted` is a pipe-delimited list of acceptable variants.
fn accepted_variant(given: &str, accepted: &str) -> bool {
    accepted.split('|').any(|variant| eq_loose(given, variant))
}
