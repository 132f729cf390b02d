use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::db::models::{ChatMessage as ChatTurn, Citation};
use crate::llm::{ChatMessage, CompletionProvider, LlmError};
use crate::text::truncate_chars;

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that answers questions about documents. \
Use the provided document context to answer accurately and cite relevant information.";

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant that provides concise document summaries.";

pub const NO_RESPONSE_FALLBACK: &str = "I apologize, but I couldn't generate a response.";
pub const NO_SUMMARY_FALLBACK: &str = "Unable to generate summary.";

pub const PROMPT_CONTEXT_CHARS: usize = 1500;
pub const SUMMARY_INPUT_CHARS: usize = 2000;

pub const CHAT_MAX_TOKENS: u32 = 500;
pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const SUMMARY_MAX_TOKENS: u32 = 200;
pub const SUMMARY_TEMPERATURE: f32 = 0.5;

pub const MAX_CITATIONS: usize = 3;
const MIN_SENTENCE_CHARS: usize = 20;
const CITATION_KEY_CHARS: usize = 30;
const CITATION_EXCERPT_CHARS: usize = 100;
const SENTENCES_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroundedAnswer {
    pub response: String,
    pub citations: Vec<Citation>,
}

pub struct ChatOrchestrator {
    provider: Arc<dyn CompletionProvider>,
}

impl ChatOrchestrator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Answer `user_message` from `document_context`. Provider errors are returned as-is.
    pub async fn respond(
        &self,
        user_message: &str,
        document_context: &str,
        history: &[ChatMessage],
    ) -> Result<GroundedAnswer, LlmError> {
        let messages = build_messages(user_message, document_context, history);
        debug!(
            model = self.provider.model(),
            messages = messages.len(),
            context_chars = document_context.len(),
            "requesting chat completion"
        );

        let raw = self
            .provider
            .complete(messages, CHAT_MAX_TOKENS, CHAT_TEMPERATURE)
            .await
            .map_err(|e| {
                error!(model = self.provider.model(), error = %e, "chat completion failed");
                e
            })?;

        let response = match raw.trim() {
            "" => NO_RESPONSE_FALLBACK.to_string(),
            text => text.to_string(),
        };
        let citations = extract_citations(&response, document_context);
        Ok(GroundedAnswer {
            response,
            citations,
        })
    }

    pub async fn summarize(&self, document_text: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Please provide a concise summary of the following document:\n\n{}...\n\nSummary:",
            truncate_chars(document_text, SUMMARY_INPUT_CHARS)
        );
        let messages = vec![
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let raw = self
            .provider
            .complete(messages, SUMMARY_MAX_TOKENS, SUMMARY_TEMPERATURE)
            .await
            .map_err(|e| {
                error!(model = self.provider.model(), error = %e, "summary completion failed");
                e
            })?;

        Ok(match raw.trim() {
            "" => NO_SUMMARY_FALLBACK.to_string(),
            text => text.to_string(),
        })
    }
}

pub fn build_messages(
    user_message: &str,
    document_context: &str,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(format!(
        "Document Context:\n{}\n\nUser Question: {}",
        truncate_chars(document_context, PROMPT_CONTEXT_CHARS),
        user_message
    )));
    messages
}

pub fn history_from_turns(turns: &[ChatTurn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .flat_map(|turn| {
            [
                ChatMessage::user(turn.message.clone()),
                ChatMessage::assistant(turn.response.clone()),
            ]
        })
        .collect()
}

// Page is approximated as ten sentences per page.
pub fn extract_citations(response: &str, document_context: &str) -> Vec<Citation> {
    let response_lower = response.to_lowercase();

    document_context
        .split('.')
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .enumerate()
        .filter(|(_, sentence)| {
            let key = truncate_chars(sentence, CITATION_KEY_CHARS).to_lowercase();
            response_lower.contains(&key)
        })
        .take(MAX_CITATIONS)
        .map(|(index, sentence)| Citation {
            page_number: (index / SENTENCES_PER_PAGE) as u32 + 1,
            content: format!("{}...", truncate_chars(sentence, CITATION_EXCERPT_CHARS)),
        })
        .collect()
}
