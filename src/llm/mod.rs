pub mod claude;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    pub content: String,
}

/// Unified LLM provider enum — dispatches to OpenAI-compatible or Claude backends.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiConfig),
    HuggingFace(openai::OpenAiConfig),
    Claude(claude::ClaudeConfig),
    Ollama(openai::OpenAiConfig),
}

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const HUGGINGFACE_BASE_URL: &str = "https://router.huggingface.co/v1";
pub const CLAUDE_BASE_URL: &str = "https://api.anthropic.com";
pub const OLLAMA_HOST: &str = "http://localhost:11434";

impl Provider {
    pub fn ollama(host: String) -> Self {
        Provider::Ollama(openai::OpenAiConfig {
            api_key: String::new(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi(_) => "openai",
            Provider::HuggingFace(_) => "huggingface",
            Provider::Claude(_) => "claude",
            Provider::Ollama(_) => "ollama",
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            Provider::OpenAi(config) | Provider::HuggingFace(config) | Provider::Ollama(config) => {
                openai::chat(config, request).await
            }
            Provider::Claude(config) => claude::chat(config, request).await,
        }
    }
}

/// Text-completion seam the chat pipeline calls into.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;
}

/// A provider bound to one model id.
#[derive(Debug, Clone)]
pub struct ModelClient {
    provider: Provider,
    model: String,
}

impl ModelClient {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl CompletionProvider for ModelClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            messages,
            model: self.model.clone(),
            max_tokens,
            temperature,
        };
        let response = self.provider.chat(&request).await?;
        Ok(response.content)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}
