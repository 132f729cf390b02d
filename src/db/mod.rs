pub mod models;

use models::{
    ChatMessage, Citation, Document, NewChatMessage, NewDocument, NewTextChunk, TextChunk,
};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Repository the pipeline depends on. Deleting a document removes its
/// chunks and chat messages with it.
pub trait Store: Send + Sync {
    // ── Documents ──
    fn create_document(&self, doc: NewDocument) -> DbResult<Document>;
    fn get_document(&self, id: &str) -> DbResult<Option<Document>>;
    fn list_documents(&self) -> DbResult<Vec<Document>>;
    /// Returns `false` when no document had this id.
    fn delete_document(&self, id: &str) -> DbResult<bool>;
    fn get_document_data(&self, id: &str) -> DbResult<Option<Vec<u8>>>;

    // ── Chunks ──
    fn create_text_chunks(
        &self,
        document_id: &str,
        chunks: &[NewTextChunk],
    ) -> DbResult<Vec<TextChunk>>;

    /// Store a document together with its chunks; on error neither is kept.
    fn create_document_with_chunks(
        &self,
        doc: NewDocument,
        chunks: &[NewTextChunk],
    ) -> DbResult<(Document, Vec<TextChunk>)> {
        let document = self.create_document(doc)?;
        match self.create_text_chunks(&document.id, chunks) {
            Ok(saved) => Ok((document, saved)),
            Err(e) => {
                if let Err(cleanup) = self.delete_document(&document.id) {
                    warn!(document_id = %document.id, error = %cleanup, "failed to remove partial document");
                }
                Err(e)
            }
        }
    }

    /// Chunks of a document ordered by `chunk_index`.
    fn get_text_chunks(&self, document_id: &str) -> DbResult<Vec<TextChunk>>;
    fn get_text_chunk(&self, id: &str) -> DbResult<Option<TextChunk>>;

    /// Case-insensitive substring match over a document's chunks, in index order.
    fn search_text_chunks(&self, document_id: &str, query: &str) -> DbResult<Vec<TextChunk>> {
        let needle = query.to_lowercase();
        Ok(self
            .get_text_chunks(document_id)?
            .into_iter()
            .filter(|chunk| chunk.content.to_lowercase().contains(&needle))
            .collect())
    }

    // ── Messages ──
    fn create_chat_message(&self, msg: NewChatMessage) -> DbResult<ChatMessage>;
    /// Messages of a document, oldest first.
    fn get_chat_messages(&self, document_id: &str) -> DbResult<Vec<ChatMessage>>;
    fn get_chat_message(&self, id: &str) -> DbResult<Option<ChatMessage>>;

    // ── Settings ──
    fn get_setting(&self, key: &str) -> DbResult<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> DbResult<()>;
    fn delete_setting(&self, key: &str) -> DbResult<()>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const DOCUMENT_COLUMNS: &str =
    "id, filename, original_name, text_content, page_count, degraded, uploaded_at";
const CHUNK_COLUMNS: &str = "id, document_id, content, page_number, chunk_index, embedding";
const MESSAGE_COLUMNS: &str = "id, document_id, message, response, citations, timestamp";

impl Database {
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::Unavailable(format!("{}: {}", parent.display(), e)))?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> DbResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(&format!(
            "
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                original_name TEXT NOT NULL,
                text_content TEXT NOT NULL,
                page_count INTEGER NOT NULL CHECK (page_count >= 1),
                degraded INTEGER NOT NULL DEFAULT 0,
                pdf_data BLOB,
                uploaded_at TEXT NOT NULL DEFAULT ({NOW})
            );

            CREATE TABLE IF NOT EXISTS text_chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                content TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding BLOB,
                UNIQUE (document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                message TEXT NOT NULL,
                response TEXT NOT NULL,
                citations TEXT NOT NULL DEFAULT '[]',
                timestamp TEXT NOT NULL DEFAULT ({NOW}),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "
        ))?;
        Ok(())
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_name: row.get(2)?,
        text_content: row.get(3)?,
        page_count: row.get(4)?,
        degraded: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<TextChunk> {
    let embedding: Option<Vec<u8>> = row.get(5)?;
    Ok(TextChunk {
        id: row.get(0)?,
        document_id: row.get(1)?,
        content: row.get(2)?,
        page_number: row.get(3)?,
        chunk_index: row.get(4)?,
        embedding: embedding.as_deref().map(bytes_to_embedding),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let citations: String = row.get(4)?;
    let citations: Vec<Citation> = serde_json::from_str(&citations)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(ChatMessage {
        id: row.get(0)?,
        document_id: row.get(1)?,
        message: row.get(2)?,
        response: row.get(3)?,
        citations,
        timestamp: row.get(5)?,
    })
}

fn insert_document(conn: &Connection, doc: NewDocument) -> DbResult<Document> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO documents (id, filename, original_name, text_content, page_count, degraded, pdf_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            doc.filename,
            doc.original_name,
            doc.text_content,
            doc.page_count,
            doc.degraded,
            doc.data
        ],
    )?;
    let document = conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        params![id],
        document_from_row,
    )?;
    Ok(document)
}

fn insert_chunks(
    conn: &Connection,
    document_id: &str,
    chunks: &[NewTextChunk],
) -> DbResult<Vec<TextChunk>> {
    let mut stmt = conn.prepare(
        "INSERT INTO text_chunks (id, document_id, content, page_number, chunk_index, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut saved = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let id = uuid::Uuid::new_v4().to_string();
        let embedding = chunk.embedding.as_deref().map(embedding_to_bytes);
        stmt.execute(params![
            id,
            document_id,
            chunk.content,
            chunk.page_number,
            chunk.chunk_index,
            embedding
        ])?;
        saved.push(TextChunk {
            id,
            document_id: document_id.to_string(),
            content: chunk.content.clone(),
            page_number: chunk.page_number,
            chunk_index: chunk.chunk_index,
            embedding: chunk.embedding.clone(),
        });
    }
    Ok(saved)
}

impl Store for Database {
    fn create_document(&self, doc: NewDocument) -> DbResult<Document> {
        let conn = self.conn.lock();
        insert_document(&conn, doc)
    }

    fn get_document(&self, id: &str) -> DbResult<Option<Document>> {
        let conn = self.conn.lock();
        let document = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                params![id],
                document_from_row,
            )
            .optional()?;
        Ok(document)
    }

    fn list_documents(&self) -> DbResult<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY uploaded_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], document_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete_document(&self, id: &str) -> DbResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn get_document_data(&self, id: &str) -> DbResult<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let data: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT pdf_data FROM documents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data.flatten())
    }

    fn create_text_chunks(
        &self,
        document_id: &str,
        chunks: &[NewTextChunk],
    ) -> DbResult<Vec<TextChunk>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let saved = insert_chunks(&tx, document_id, chunks)?;
        tx.commit()?;
        Ok(saved)
    }

    fn create_document_with_chunks(
        &self,
        doc: NewDocument,
        chunks: &[NewTextChunk],
    ) -> DbResult<(Document, Vec<TextChunk>)> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let document = insert_document(&tx, doc)?;
        let saved = insert_chunks(&tx, &document.id, chunks)?;
        tx.commit()?;
        Ok((document, saved))
    }

    fn get_text_chunks(&self, document_id: &str) -> DbResult<Vec<TextChunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM text_chunks WHERE document_id = ?1 ORDER BY chunk_index ASC"
        ))?;
        let rows = stmt.query_map(params![document_id], chunk_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_text_chunk(&self, id: &str) -> DbResult<Option<TextChunk>> {
        let conn = self.conn.lock();
        let chunk = conn
            .query_row(
                &format!("SELECT {CHUNK_COLUMNS} FROM text_chunks WHERE id = ?1"),
                params![id],
                chunk_from_row,
            )
            .optional()?;
        Ok(chunk)
    }

    fn create_chat_message(&self, msg: NewChatMessage) -> DbResult<ChatMessage> {
        let citations = serde_json::to_string(&msg.citations)?;
        let conn = self.conn.lock();
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO chat_messages (id, document_id, message, response, citations)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, msg.document_id, msg.message, msg.response, citations],
        )?;
        let message = conn.query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?1"),
            params![id],
            message_from_row,
        )?;
        Ok(message)
    }

    fn get_chat_messages(&self, document_id: &str) -> DbResult<Vec<ChatMessage>> {
        let conn = self.conn.lock();
        // rowid breaks ties between turns stored within the same millisecond
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE document_id = ?1
             ORDER BY timestamp ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![document_id], message_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_chat_message(&self, id: &str) -> DbResult<Option<ChatMessage>> {
        let conn = self.conn.lock();
        let message = conn
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?1"),
                params![id],
                message_from_row,
            )
            .optional()?;
        Ok(message)
    }

    fn get_setting(&self, key: &str) -> DbResult<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> DbResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_setting(&self, key: &str) -> DbResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Serialize embedding to bytes for SQLite BLOB storage
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from SQLite BLOB bytes
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
