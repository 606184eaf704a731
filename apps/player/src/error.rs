//! Player error types.

use quiz_core::StateError;
use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by a quiz session.
///
/// Autosave failures never appear here: they are logged and retried on the
/// next debounce cycle. Finalize failures do, because silently losing a
/// completed score would misreport progress.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("attempt store error: {0}")]
    Api(#[from] ApiError),

    #[error("quiz definition is not valid JSON: {0}")]
    Definition(#[from] serde_json::Error),

    #[error(transparent)]
    Flow(#[from] StateError),

    #[error("no quiz loaded for step {0}")]
    NotLoaded(i64),
}
