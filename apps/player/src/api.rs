//! Server attempt store boundary.
//!
//! The surrounding platform exposes plain request/response operations for
//! attempts and step definitions. The trait keeps the reconciler testable
//! with an in-memory fake; [`HttpAttemptApi`] is the production
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Errors from the attempt store.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

/// A persisted quiz attempt, draft or finalized.
///
/// `answers` is the encoded answer collection (see `quiz_core::answers`),
/// carried as an opaque blob and decoded by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub step_id: i64,
    pub course_id: i64,
    pub lesson_id: i64,
    pub answers: String,
    pub current_question_index: usize,
    pub time_spent_seconds: u64,
    pub is_draft: bool,
    pub is_graded: bool,
    pub score_percentage: f64,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub quiz_content_hash: String,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a draft attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptDraft {
    pub step_id: i64,
    pub course_id: i64,
    pub lesson_id: i64,
    pub answers: String,
    pub current_question_index: usize,
    pub time_spent_seconds: u64,
    pub quiz_content_hash: String,
}

/// Partial update of an attempt row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_graded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<u32>,
}

/// Lesson step payload owning the serialized quiz definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub content_text: String,
}

/// Attempt store operations the player consumes.
#[async_trait]
pub trait AttemptApi: Send + Sync {
    /// List attempts for a step, most recent first.
    async fn list_attempts(&self, step_id: i64) -> Result<Vec<QuizAttempt>, ApiError>;

    /// Create exactly one draft row and return it with its assigned id.
    async fn create_draft(&self, draft: &AttemptDraft) -> Result<QuizAttempt, ApiError>;

    /// Partially update an existing attempt row.
    async fn update_attempt(&self, id: Uuid, update: &AttemptUpdate)
        -> Result<QuizAttempt, ApiError>;

    /// Fetch the step owning the serialized quiz definition.
    async fn get_step_definition(&self, step_id: i64) -> Result<StepDefinition, ApiError>;
}

/// HTTP implementation of the attempt store.
pub struct HttpAttemptApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpAttemptApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Backend { status, message });
        }
        resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AttemptApi for HttpAttemptApi {
    async fn list_attempts(&self, step_id: i64) -> Result<Vec<QuizAttempt>, ApiError> {
        let url = format!("{}/api/steps/{}/attempts", self.base_url, step_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::parse(resp).await
    }

    async fn create_draft(&self, draft: &AttemptDraft) -> Result<QuizAttempt, ApiError> {
        let url = format!("{}/api/attempts", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::parse(resp).await
    }

    async fn update_attempt(
        &self,
        id: Uuid,
        update: &AttemptUpdate,
    ) -> Result<QuizAttempt, ApiError> {
        let url = format!("{}/api/attempts/{}", self.base_url, id);
        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(update)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::parse(resp).await
    }

    async fn get_step_definition(&self, step_id: i64) -> Result<StepDefinition, ApiError> {
        let url = format!("{}/api/steps/{}", self.base_url, step_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::parse(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let api = HttpAttemptApi::new("https://lms.example.com/", "token");
        assert_eq!(api.base_url, "https://lms.example.com");
    }

    #[test]
    fn partial_update_serializes_only_set_fields() {
        let update = AttemptUpdate {
            time_spent_seconds: Some(42),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"time_spent_seconds": 42}));
    }
}
