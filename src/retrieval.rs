use tracing::{debug, warn};

use crate::db::models::TextChunk;
use crate::db::{DbResult, Store};
use crate::text::truncate_chars;

pub const DEFAULT_MAX_CHUNKS: usize = 3;

pub const FALLBACK_CONTEXT_CHARS: usize = 3000;

/// Never fails; an empty string means no context.
pub trait ContextRetriever: Send + Sync {
    fn get_context(
        &self,
        store: &dyn Store,
        document_id: &str,
        query: &str,
        max_chunks: usize,
    ) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringRetriever;

impl SubstringRetriever {
    fn select_chunks(
        store: &dyn Store,
        document_id: &str,
        query: &str,
        max_chunks: usize,
    ) -> DbResult<Vec<TextChunk>> {
        let mut chunks = store.search_text_chunks(document_id, query)?;
        if chunks.is_empty() {
            debug!(document_id, "no query-specific chunks, using leading chunks");
            chunks = store.get_text_chunks(document_id)?;
        }
        chunks.truncate(max_chunks);
        Ok(chunks)
    }
}

impl ContextRetriever for SubstringRetriever {
    fn get_context(
        &self,
        store: &dyn Store,
        document_id: &str,
        query: &str,
        max_chunks: usize,
    ) -> String {
        if max_chunks == 0 {
            return String::new();
        }

        match Self::select_chunks(store, document_id, query, max_chunks) {
            Ok(chunks) if !chunks.is_empty() => {
                let context = chunks
                    .iter()
                    .map(|c| c.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                debug!(document_id, chunks = chunks.len(), chars = context.len(), "selected context");
                context
            }
            Ok(_) => {
                debug!(document_id, "document has no chunks, using raw text");
                document_text_fallback(store, document_id)
            }
            Err(e) => {
                warn!(document_id, error = %e, "chunk lookup failed, using raw text");
                document_text_fallback(store, document_id)
            }
        }
    }
}

fn document_text_fallback(store: &dyn Store, document_id: &str) -> String {
    match store.get_document(document_id) {
        Ok(Some(doc)) => truncate_chars(&doc.text_content, FALLBACK_CONTEXT_CHARS).to_string(),
        Ok(None) => String::new(),
        Err(e) => {
            warn!(document_id, error = %e, "document lookup failed, answering without context");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ChatMessage, Document, NewChatMessage, NewDocument, NewTextChunk};
    use crate::db::{Database, DbError};

    fn seeded(chunks: &[&str], text: &str) -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let doc = db
            .create_document(NewDocument {
                filename: "doc.pdf".into(),
                original_name: "doc.pdf".into(),
                text_content: text.into(),
                page_count: 1,
                degraded: false,
                data: None,
            })
            .unwrap();
        let chunks: Vec<NewTextChunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| NewTextChunk {
                content: c.to_string(),
                page_number: 1,
                chunk_index: i as u32,
                embedding: None,
            })
            .collect();
        db.create_text_chunks(&doc.id, &chunks).unwrap();
        (db, doc.id)
    }

    #[test]
    fn test_matching_chunks_joined_in_index_order() {
        let (db, id) = seeded(&["Budget for 2025", "Staffing", "The BUDGET grows", "Misc"], "x");
        let context = SubstringRetriever.get_context(&db, &id, "budget", 3);
        assert_eq!(context, "Budget for 2025\n\nThe BUDGET grows");
    }

    #[test]
    fn test_no_match_falls_back_to_leading_chunks() {
        let (db, id) = seeded(&["a1", "a2", "a3", "a4", "a5"], "x");
        let context = SubstringRetriever.get_context(&db, &id, "zebra", 3);
        assert_eq!(context, "a1\n\na2\n\na3");
    }

    #[test]
    fn test_matches_capped_at_max_chunks() {
        let (db, id) = seeded(&["road 1", "road 2", "road 3", "road 4"], "x");
        let context = SubstringRetriever.get_context(&db, &id, "ROAD", 2);
        assert_eq!(context, "road 1\n\nroad 2");
        assert_eq!(SubstringRetriever.get_context(&db, &id, "road", 0), "");
    }

    #[test]
    fn test_zero_chunks_falls_back_to_document_text() {
        let text = "z".repeat(5000);
        let (db, id) = seeded(&[], &text);
        let context = SubstringRetriever.get_context(&db, &id, "anything", 3);
        assert_eq!(context.chars().count(), FALLBACK_CONTEXT_CHARS);
    }

    #[test]
    fn test_missing_document_yields_empty_context() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(SubstringRetriever.get_context(&db, "nope", "q", 3), "");
    }

    /// Store whose chunk table is unreachable.
    struct BrokenChunks {
        inner: Database,
    }

    impl Store for BrokenChunks {
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
            Err(DbError::Unavailable("chunks offline".into()))
        }
        fn get_text_chunks(&self, _: &str) -> DbResult<Vec<TextChunk>> {
            Err(DbError::Unavailable("chunks offline".into()))
        }
        fn get_text_chunk(&self, _: &str) -> DbResult<Option<TextChunk>> {
            Err(DbError::Unavailable("chunks offline".into()))
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
    fn test_chunk_lookup_failure_uses_document_text() {
        let (db, id) = seeded(&["chunk"], "Full document text.");
        let broken = BrokenChunks { inner: db };
        let context = SubstringRetriever.get_context(&broken, &id, "chunk", 3);
        assert_eq!(context, "Full document text.");
    }
}
