use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub text_content: String,
    pub page_count: u32,
    /// Set when `text_content` is a substituted placeholder rather than decoded text.
    pub degraded: bool,
    pub uploaded_at: String,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub original_name: String,
    pub text_content: String,
    pub page_count: u32,
    pub degraded: bool,
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextChunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub page_number: u32,
    pub chunk_index: u32,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTextChunk {
    pub content: String,
    pub page_number: u32,
    pub chunk_index: u32,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub page_number: u32,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub document_id: String,
    pub message: String,
    pub response: String,
    pub citations: Vec<Citation>,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub document_id: String,
    pub message: String,
    pub response: String,
    pub citations: Vec<Citation>,
}
