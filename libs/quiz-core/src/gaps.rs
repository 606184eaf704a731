//! Gap extraction for the bracketed fill-in-the-blank syntax.
//!
//! A gap is a `[[...]]` span inside passage text. The inner text is a
//! separator-delimited list of candidate answers; a candidate carrying a `*`
//! marker is the correct one, otherwise the first candidate wins. Gaps are
//! positional, ordered by first appearance.

use crate::normalize::normalize;

/// Default separator between gap candidates.
pub const DEFAULT_SEPARATOR: &str = ",";

/// One extracted gap: normalized candidates plus the index of the correct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapSpec {
    pub candidates: Vec<String>,
    pub correct_index: usize,
}

impl GapSpec {
    /// The candidate grading compares against.
    pub fn correct(&self) -> &str {
        &self.candidates[self.correct_index]
    }
}

/// Scan `text` left to right for non-overlapping `[[...]]` spans.
///
/// An opening `[[` with no closing `]]` ends the scan; it is authoring
/// noise, not a gap.
pub fn extract_gaps(text: &str, separator: &str) -> Vec<GapSpec> {
    let mut gaps = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else { break };
        gaps.push(parse_gap(&after[..end], separator));
        rest = &after[end + 2..];
    }

    gaps
}

/// Just the chosen candidate per gap, in gap order.
///
/// This is the canonical expected-answer vector used for grading and for
/// auto-fill in the authoring preview.
pub fn extract_correct_answers(text: &str, separator: &str) -> Vec<String> {
    extract_gaps(text, separator)
        .into_iter()
        .map(|mut gap| gap.candidates.swap_remove(gap.correct_index))
        .collect()
}

fn parse_gap(inner: &str, separator: &str) -> GapSpec {
    let raw: Vec<&str> = inner.split(separator).map(str::trim).collect();

    // Correctness is decided on the raw pieces, before any are dropped.
    let marked = raw
        .iter()
        .position(|piece| piece.contains('*'))
        .unwrap_or(0);

    let mut candidates = Vec::new();
    let mut correct_index = None;

    for (idx, piece) in raw.iter().enumerate() {
        if piece.is_empty() {
            continue;
        }
        let candidate = normalize(piece);
        if candidate.is_empty() {
            continue;
        }
        if idx == marked {
            correct_index = Some(candidates.len());
        }
        candidates.push(candidate);
    }

    // A gap never comes out with zero options: when normalization emptied
    // everything, fall back to the first raw candidate.
    if candidates.is_empty() {
        let first = raw.first().copied().unwrap_or("");
        candidates.push(first.replace('*', "").trim().to_string());
    }

    GapSpec {
        // The marked candidate may not have survived; the first survivor
        // stands in for it.
        correct_index: correct_index.unwrap_or(0),
        candidates,
    }
}
