//! Learner answer values and their wire encoding.
//!
//! One collection holds every answer kind, so each entry self-describes its
//! shape. On the wire a collection is an ordered list of
//! `[question_id, value]` pairs. Scalars and lists encode as bare JSON
//! values; matching answers are wrapped as
//! `{"kind": "pairmap", "entries": [[left, right], ...]}` so decoding never
//! has to guess at object shapes.

use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use crate::error::AnswerDecodeError;

/// A single stored answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Selected option index of a single-choice question.
    Choice(usize),
    /// Selected option indices of a multiple-choice question.
    Choices(BTreeSet<usize>),
    /// Free text of a short or long answer.
    Text(String),
    /// Gap texts aligned to gap position.
    Texts(Vec<String>),
    /// Matching assignment, left side to chosen right side, in pair order.
    PairMap(Vec<(String, String)>),
}

impl Answer {
    /// Encode to the wire value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Choice(index) => json!(index),
            Self::Choices(set) => Value::Array(set.iter().map(|i| json!(i)).collect()),
            Self::Text(text) => json!(text),
            Self::Texts(items) => Value::Array(items.iter().map(|s| json!(s)).collect()),
            Self::PairMap(entries) => json!({
                "kind": "pairmap",
                "entries": entries
                    .iter()
                    .map(|(left, right)| json!([left, right]))
                    .collect::<Vec<_>>(),
            }),
        }
    }

    /// Decode from a wire value.
    pub fn from_value(value: &Value) -> Result<Self, AnswerDecodeError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(|i| Self::Choice(i as usize))
                .ok_or_else(|| AnswerDecodeError::UnsupportedShape(value.to_string())),
            Value::String(text) => Ok(Self::Text(text.clone())),
            Value::Array(items) => decode_list(items, value),
            Value::Object(map) => decode_pairmap(map),
            _ => Err(AnswerDecodeError::UnsupportedShape(value.to_string())),
        }
    }
}

fn decode_list(items: &[Value], original: &Value) -> Result<Answer, AnswerDecodeError> {
    if !items.is_empty() && items.iter().all(Value::is_u64) {
        let set = items
            .iter()
            .filter_map(Value::as_u64)
            .map(|i| i as usize)
            .collect();
        return Ok(Answer::Choices(set));
    }
    if items.iter().all(Value::is_string) {
        let texts = items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        return Ok(Answer::Texts(texts));
    }
    Err(AnswerDecodeError::UnsupportedShape(original.to_string()))
}

fn decode_pairmap(map: &Map<String, Value>) -> Result<Answer, AnswerDecodeError> {
    if map.get("kind").and_then(Value::as_str) != Some("pairmap") {
        return Err(AnswerDecodeError::MalformedPairMap);
    }
    let entries = map
        .get("entries")
        .and_then(Value::as_array)
        .ok_or(AnswerDecodeError::MalformedPairMap)?;

    let mut pairs = Vec::with_capacity(entries.len());
    for entry in entries {
        let pair = entry.as_array().ok_or(AnswerDecodeError::MalformedPairMap)?;
        match (pair.first().and_then(Value::as_str), pair.get(1).and_then(Value::as_str)) {
            (Some(left), Some(right)) if pair.len() == 2 => {
                pairs.push((left.to_string(), right.to_string()));
            }
            _ => return Err(AnswerDecodeError::MalformedPairMap),
        }
    }
    Ok(Answer::PairMap(pairs))
}

/// Insertion-ordered collection of answers keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerMap {
    entries: Vec<(i64, Answer)>,
}

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: i64) -> Option<&Answer> {
        self.entries
            .iter()
            .find(|(id, _)| *id == question_id)
            .map(|(_, answer)| answer)
    }

    /// Replace in place, or append for a new question id.
    pub fn set(&mut self, question_id: i64, answer: Answer) {
        match self.entries.iter_mut().find(|(id, _)| *id == question_id) {
            Some((_, slot)) => *slot = answer,
            None => self.entries.push((question_id, answer)),
        }
    }

    pub fn remove(&mut self, question_id: i64) -> Option<Answer> {
        let idx = self.entries.iter().position(|(id, _)| *id == question_id)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &Answer)> {
        self.entries.iter().map(|(id, answer)| (*id, answer))
    }

    /// Encode the whole collection as the ordered pair list.
    pub fn encode(&self) -> String {
        let pairs: Vec<Value> = self
            .entries
            .iter()
            .map(|(id, answer)| json!([id, answer.to_value()]))
            .collect();
        Value::Array(pairs).to_string()
    }

    /// Decode a collection, skipping entries that fail to decode.
    ///
    /// A corrupt entry loses that one question's answer, never the rest of
    /// the collection.
    pub fn decode(raw: &str) -> Result<Self, AnswerDecodeError> {
        let outer: Value = serde_json::from_str(raw)?;
        let pairs = outer.as_array().ok_or(AnswerDecodeError::NotAPairList)?;

        let mut map = Self::new();
        for pair in pairs {
            let Some(entry) = pair.as_array() else { continue };
            let (Some(id), Some(value)) = (entry.first().and_then(Value::as_i64), entry.get(1))
            else {
                continue;
            };
            if let Ok(answer) = Answer::from_value(value) {
                map.set(id, answer);
            }
        }
        Ok(map)
    }
}

/// Gap texts per gap-fill question, keyed by question id.
///
/// Kept separate from [`AnswerMap`] because the local cache persists it in
/// its own slot; merged into the answer collection for server saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapAnswers {
    entries: Vec<(i64, Vec<String>)>,
}

impl GapAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: i64) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(id, _)| *id == question_id)
            .map(|(_, texts)| texts.as_slice())
    }

    /// Replace all gap texts for a question.
    pub fn set(&mut self, question_id: i64, texts: Vec<String>) {
        match self.entries.iter_mut().find(|(id, _)| *id == question_id) {
            Some((_, slot)) => *slot = texts,
            None => self.entries.push((question_id, texts)),
        }
    }

    /// Set one gap's text, growing the list with empty slots as needed.
    pub fn set_gap(&mut self, question_id: i64, gap_index: usize, text: impl Into<String>) {
        let idx = match self.entries.iter().position(|(id, _)| *id == question_id) {
            Some(idx) => idx,
            None => {
                self.entries.push((question_id, Vec::new()));
                self.entries.len() - 1
            }
        };
        let texts = &mut self.entries[idx].1;
        if texts.len() <= gap_index {
            texts.resize(gap_index + 1, String::new());
        }
        texts[gap_index] = text.into();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &[String])> {
        self.entries.iter().map(|(id, texts)| (*id, texts.as_slice()))
    }

    pub fn encode(&self) -> String {
        let pairs: Vec<Value> = self
            .entries
            .iter()
            .map(|(id, texts)| json!([id, texts]))
            .collect();
        Value::Array(pairs).to_string()
    }

    /// Decode, skipping malformed entries like [`AnswerMap::decode`].
    pub fn decode(raw: &str) -> Result<Self, AnswerDecodeError> {
        let outer: Value = serde_json::from_str(raw)?;
        let pairs = outer.as_array().ok_or(AnswerDecodeError::NotAPairList)?;

        let mut map = Self::new();
        for pair in pairs {
            let Some(entry) = pair.as_array() else { continue };
            let (Some(id), Some(Value::Array(items))) =
                (entry.first().and_then(Value::as_i64), entry.get(1))
            else {
                continue;
            };
            if !items.iter().all(Value::is_string) {
                continue;
            }
            let texts = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            map.set(id, texts);
        }
        Ok(map)
    }
}
