use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{generate, AppState};
use crate::db::models::Document;
use crate::doc_processor::{self, Extractor, SourceFormat, Upload};
use crate::error::{AppError, AppResult};
use crate::llm::CompletionProvider;
use crate::orchestrator::ChatOrchestrator;
use crate::sample::{SAMPLE_CONTENT, SAMPLE_FILENAME, SAMPLE_ORIGINAL_NAME};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub page_count: u32,
    pub uploaded_at: String,
    pub degraded: bool,
    pub chunk_count: usize,
}

fn stored_name(format: SourceFormat) -> String {
    let ext = match format {
        SourceFormat::Pdf => "pdf",
        SourceFormat::PlainText => "txt",
    };
    format!("uploaded_{}.{}", uuid::Uuid::new_v4().simple(), ext)
}

/// Ingest an uploaded file. Decoding runs on the blocking pool.
pub async fn upload_document(
    state: &AppState,
    bytes: Vec<u8>,
    original_name: &str,
    format: SourceFormat,
) -> AppResult<UploadedDocument> {
    if bytes.is_empty() {
        return Err(AppError::Validation("No PDF file provided".into()));
    }
    if bytes.len() > state.options.max_upload_bytes {
        return Err(AppError::Validation(format!(
            "File too large: {} bytes (limit {} bytes)",
            bytes.len(),
            state.options.max_upload_bytes
        )));
    }

    let original_name = match original_name.trim() {
        "" => "document.pdf".to_string(),
        name => name.to_string(),
    };
    info!(name = %original_name, bytes = bytes.len(), "processing upload");

    let upload = Upload {
        bytes,
        filename: stored_name(format),
        original_name,
        format,
    };
    ingest(state, upload).await
}

/// Ingest the built-in demo document through the plain-text path.
pub async fn create_sample_document(state: &AppState) -> AppResult<UploadedDocument> {
    info!("creating sample document");
    let upload = Upload {
        bytes: SAMPLE_CONTENT.as_bytes().to_vec(),
        filename: SAMPLE_FILENAME.to_string(),
        original_name: SAMPLE_ORIGINAL_NAME.to_string(),
        format: SourceFormat::PlainText,
    };
    ingest(state, upload).await
}

async fn ingest(state: &AppState, upload: Upload) -> AppResult<UploadedDocument> {
    let db = Arc::clone(&state.db);
    let extractor = Extractor::new(state.options.fast_extraction);
    let processed = tokio::task::spawn_blocking(move || {
        doc_processor::process_upload(db.as_ref(), &extractor, upload)
    })
    .await
    .map_err(|e| AppError::Extraction(format!("document processing task failed: {}", e)))??;

    if processed.document.degraded {
        warn!(document_id = %processed.document.id, "document stored with degraded text");
    }

    let doc = processed.document;
    Ok(UploadedDocument {
        id: doc.id,
        filename: doc.filename,
        original_name: doc.original_name,
        page_count: doc.page_count,
        uploaded_at: doc.uploaded_at,
        degraded: doc.degraded,
        chunk_count: processed.chunks.len(),
    })
}

pub fn list_documents(state: &AppState) -> AppResult<Vec<Document>> {
    Ok(state.db.list_documents()?)
}

pub fn get_document(state: &AppState, id: &str) -> AppResult<Document> {
    state.require_document(id)
}

/// Original bytes of an uploaded document.
pub fn get_document_data(state: &AppState, id: &str) -> AppResult<Vec<u8>> {
    state
        .db
        .get_document_data(id)?
        .ok_or_else(|| AppError::NotFound("PDF file not found".into()))
}

/// Delete a document with its chunks and messages. Deleting twice is not an error.
pub fn delete_document(state: &AppState, id: &str) -> AppResult<()> {
    if state.db.delete_document(id)? {
        info!(document_id = id, "deleted document");
    } else {
        info!(document_id = id, "delete requested for unknown document");
    }
    Ok(())
}

pub async fn generate_summary(
    state: &AppState,
    llm: Arc<dyn CompletionProvider>,
    id: &str,
) -> AppResult<String> {
    let document = state.require_document(id)?;
    let orchestrator = ChatOrchestrator::new(llm);
    generate(
        state.options.request_timeout,
        orchestrator.summarize(&document.text_content),
    )
    .await
}
