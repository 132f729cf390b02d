//! Request-scoped operations behind the outer surface. Each one validates
//! its input, runs one pipeline and maps failures onto [`AppError`].

pub mod chat;
pub mod knowledge;
pub mod settings;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::config::PipelineOptions;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::llm::LlmError;
use crate::retrieval::{ContextRetriever, SubstringRetriever};

pub struct AppState {
    pub db: Arc<dyn Store>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub options: PipelineOptions,
}

impl AppState {
    pub fn new(db: Arc<dyn Store>, options: PipelineOptions) -> Self {
        Self {
            db,
            retriever: Arc::new(SubstringRetriever),
            options,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retriever = retriever;
        self
    }

    fn require_document(&self, id: &str) -> AppResult<crate::db::models::Document> {
        self.db
            .get_document(id)?
            .ok_or_else(|| AppError::NotFound("Document not found".into()))
    }
}

/// Run a provider call under the request timeout. Timeouts count as generation failures.
async fn generate<T, F>(timeout: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AppError::from(e)),
        Err(_) => {
            error!(timeout_secs = timeout.as_secs_f32(), "LLM request timed out");
            Err(AppError::Generation(format!(
                "request timed out after {:?}",
                timeout
            )))
        }
    }
}
