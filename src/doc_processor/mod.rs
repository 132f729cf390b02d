//! Document ingestion: bytes -> text -> chunks -> store.

pub mod chunker;
pub mod extract;

pub use chunker::{chunk_text, Chunk, CHUNK_OVERLAP, CHUNK_SIZE};
pub use extract::{Extraction, Extractor, SourceFormat};

use crate::db::models::{Document, NewDocument, NewTextChunk, TextChunk};
use crate::db::{DbResult, Store};
use tracing::info;

/// An uploaded file as handed over by the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub original_name: String,
    pub format: SourceFormat,
}

#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub document: Document,
    pub chunks: Vec<TextChunk>,
}

/// Extract, persist and chunk one upload. Blocking: decoding and the
/// store writes both run on the calling thread.
pub fn process_upload(
    store: &dyn Store,
    extractor: &Extractor,
    upload: Upload,
) -> DbResult<ProcessedDocument> {
    let extraction = extractor.extract(&upload.bytes, upload.format, &upload.original_name);
    store_extraction(store, upload, extraction)
}

/// Persist a document and its chunks from an already computed extraction.
pub fn store_extraction(
    store: &dyn Store,
    upload: Upload,
    extraction: Extraction,
) -> DbResult<ProcessedDocument> {
    let chunks: Vec<NewTextChunk> = chunk_text(&extraction.text, extraction.page_count)
        .into_iter()
        .map(NewTextChunk::from)
        .collect();

    let (document, chunks) = store.create_document_with_chunks(
        NewDocument {
            filename: upload.filename,
            original_name: upload.original_name,
            text_content: extraction.text,
            page_count: extraction.page_count,
            degraded: extraction.degraded,
            data: Some(upload.bytes),
        },
        &chunks,
    )?;

    info!(
        document_id = %document.id,
        page_count = document.page_count,
        chunks = chunks.len(),
        degraded = document.degraded,
        "stored document"
    );
    Ok(ProcessedDocument { document, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ChatMessage, NewChatMessage};
    use crate::db::{Database, DbError};

    #[test]
    fn test_process_plain_text_upload() {
        let db = Database::open_in_memory().unwrap();
        let upload = Upload {
            bytes: b"Para one.\n\nPara two.\n\nPara three.".to_vec(),
            filename: "notes.txt".into(),
            original_name: "Notes".into(),
            format: SourceFormat::PlainText,
        };
        let processed = process_upload(&db, &Extractor::default(), upload).unwrap();

        assert_eq!(processed.document.page_count, 1);
        assert!(!processed.document.degraded);
        assert_eq!(processed.chunks.len(), 1);
        assert_eq!(processed.chunks[0].content, "Para one. Para two. Para three.");

        let stored = db.get_text_chunks(&processed.document.id).unwrap();
        assert_eq!(stored, processed.chunks);
        assert_eq!(
            db.get_document_data(&processed.document.id).unwrap().unwrap(),
            b"Para one.\n\nPara two.\n\nPara three.".to_vec()
        );
    }

    #[test]
    fn test_degraded_pdf_still_stored_with_chunks() {
        let db = Database::open_in_memory().unwrap();
        let upload = Upload {
            bytes: b"garbage".to_vec(),
            filename: "uploaded_1.pdf".into(),
            original_name: "broken.pdf".into(),
            format: SourceFormat::Pdf,
        };
        let processed = process_upload(&db, &Extractor::default(), upload).unwrap();
        assert!(processed.document.degraded);
        assert_eq!(processed.document.page_count, 1);
        assert!(!processed.document.text_content.is_empty());
        assert!(!processed.chunks.is_empty());
    }

    /// Store that accepts documents but rejects every chunk batch.
    struct ChunkWritesFail {
        inner: Database,
    }

    impl Store for ChunkWritesFail {
        fn create_document(&self, doc: NewDocument) -> DbResult<Document> {
            self.inner.create_document(doc)
        }
        fn get_document(&self, id: &str) -> DbResult<Option<Document>> {
            self.inner.get_document(id)
        }
        fn list_documents(&self) -> DbResult<Vec<Document>> {
            self.inner.list_documents()
        }
        fn delete_document(&self, id: &str) -> DbResult<bool> {
            self.inner.delete_document(id)
        }
        fn get_document_data(&self, id: &str) -> DbResult<Option<Vec<u8>>> {
            self.inner.get_document_data(id)
        }
        fn create_text_chunks(&self, _: &str, _: &[NewTextChunk]) -> DbResult<Vec<TextChunk>> {
            Err(DbError::Unavailable("disk full".into()))
        }
        fn get_text_chunks(&self, id: &str) -> DbResult<Vec<TextChunk>> {
            self.inner.get_text_chunks(id)
        }
        fn get_text_chunk(&self, id: &str) -> DbResult<Option<TextChunk>> {
            self.inner.get_text_chunk(id)
        }
        fn create_chat_message(&self, msg: NewChatMessage) -> DbResult<ChatMessage> {
            self.inner.create_chat_message(msg)
        }
        fn get_chat_messages(&self, id: &str) -> DbResult<Vec<ChatMessage>> {
            self.inner.get_chat_messages(id)
        }
        fn get_chat_message(&self, id: &str) -> DbResult<Option<ChatMessage>> {
            self.inner.get_chat_message(id)
        }
        fn get_setting(&self, key: &str) -> DbResult<Option<String>> {
            self.inner.get_setting(key)
        }
        fn set_setting(&self, key: &str, value: &str) -> DbResult<()> {
            self.inner.set_setting(key, value)
        }
        fn delete_setting(&self, key: &str) -> DbResult<()> {
            self.inner.delete_setting(key)
        }
    }

    #[test]
    fn test_failed_chunk_write_leaves_no_document() {
        let store = ChunkWritesFail {
            inner: Database::open_in_memory().unwrap(),
        };
        let upload = Upload {
            bytes: b"Para one.\n\nPara two.".to_vec(),
            filename: "notes.txt".into(),
            original_name: "Notes".into(),
            format: SourceFormat::PlainText,
        };

        let err = process_upload(&store, &Extractor::default(), upload).unwrap_err();
        assert!(matches!(err, DbError::Unavailable(_)));
        assert!(store.list_documents().unwrap().is_empty());
    }
}
