use serde::Serialize;

use crate::db::DbError;
use crate::llm::LlmError;

/// Errors surfaced by the request-scoped operations in [`crate::commands`].
///
/// Extraction and retrieval problems are absorbed inside the pipeline, so
/// the variants here are the ones a caller is expected to show to a user.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("Storage error: {0}")]
    Persistence(#[from] DbError),
    #[error("Extraction error: {0}")]
    Extraction(String),
}

impl AppError {
    /// HTTP-equivalent status for the error.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::Generation(_) | AppError::Persistence(_) | AppError::Extraction(_) => 500,
        }
    }

    /// Caller-facing message. Internal details of 500-class errors stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::Validation(msg) => msg.clone(),
            AppError::Generation(_) => "Failed to generate response".to_string(),
            AppError::Persistence(_) => "Failed to access storage".to_string(),
            AppError::Extraction(_) => "Failed to process document".to_string(),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Generation(err.to_string())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.public_message())
    }
}

pub type AppResult<T> = Result<T, AppError>;
