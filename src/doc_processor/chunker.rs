//! Paragraph-aware chunking of extracted document text.
//!
//! Paragraphs are packed into chunks of roughly [`CHUNK_SIZE`] characters.
//! Each new chunk is seeded with the last [`CHUNK_OVERLAP`] characters of the
//! previous one, and every chunk is tagged with a page number estimated from
//! the byte offset of its closing paragraph.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::models::NewTextChunk;
use crate::text::last_chars;

/// Characters per chunk before a new chunk is started.
pub const CHUNK_SIZE: usize = 1000;

/// Characters carried over from the end of one chunk into the next.
pub const CHUNK_OVERLAP: usize = 100;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub page_number: u32,
    pub chunk_index: u32,
}

impl From<Chunk> for NewTextChunk {
    fn from(chunk: Chunk) -> Self {
        NewTextChunk {
            content: chunk.content,
            page_number: chunk.page_number,
            chunk_index: chunk.chunk_index,
            embedding: None,
        }
    }
}

/// Non-blank paragraphs of `text` with their byte offsets.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    for sep in PARAGRAPH_BREAK.find_iter(text) {
        out.push((start, &text[start..sep.start()]));
        start = sep.end();
    }
    out.push((start, &text[start..]));
    out.retain(|(_, p)| !p.trim().is_empty());
    out
}

struct PageEstimator {
    chars_per_page: f64,
    page_count: u32,
}

impl PageEstimator {
    fn new(text: &str, page_count: u32) -> Self {
        Self {
            chars_per_page: text.len() as f64 / page_count as f64,
            page_count,
        }
    }

    fn page_at(&self, offset: usize) -> u32 {
        if self.chars_per_page <= 0.0 {
            return 1;
        }
        let page = (offset as f64 / self.chars_per_page).ceil() as u32;
        page.clamp(1, self.page_count)
    }
}

/// Split `text` into ordered, overlapping chunks.
///
/// `page_count` below 1 is treated as 1.
pub fn chunk_text(text: &str, page_count: u32) -> Vec<Chunk> {
    let estimator = PageEstimator::new(text, page_count.max(1));
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;
    let mut page = 1;

    for (offset, paragraph) in paragraphs(text) {
        page = estimator.page_at(offset);
        let paragraph_chars = paragraph.chars().count();

        if buffer_chars + paragraph_chars > CHUNK_SIZE && buffer_chars > 0 {
            let content = buffer.trim().to_string();
            let overlap = last_chars(&content, CHUNK_OVERLAP).to_string();
            chunks.push(Chunk {
                content,
                page_number: page,
                chunk_index: chunks.len() as u32,
            });

            buffer = format!("{overlap} {paragraph}");
            buffer_chars = buffer.chars().count();
        } else {
            if buffer_chars > 0 {
                buffer.push(' ');
                buffer_chars += 1;
            }
            buffer.push_str(paragraph);
            buffer_chars += paragraph_chars;
        }
    }

    if !buffer.trim().is_empty() {
        chunks.push(Chunk {
            content: buffer.trim().to_string(),
            page_number: page,
            chunk_index: chunks.len() as u32,
        });
    }

    chunks
}
