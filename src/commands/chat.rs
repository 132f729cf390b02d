use std::sync::Arc;
use tracing::info;

use super::{generate, AppState};
use crate::db::models::{ChatMessage, NewChatMessage};
use crate::error::{AppError, AppResult};
use crate::llm::CompletionProvider;
use crate::orchestrator::{history_from_turns, ChatOrchestrator};
use crate::retrieval::DEFAULT_MAX_CHUNKS;

pub fn get_messages(state: &AppState, document_id: &str) -> AppResult<Vec<ChatMessage>> {
    state.require_document(document_id)?;
    Ok(state.db.get_chat_messages(document_id)?)
}

/// One chat turn: retrieve context, generate a cited answer, store the turn.
pub async fn send_message(
    state: &AppState,
    llm: Arc<dyn CompletionProvider>,
    document_id: &str,
    message: &str,
) -> AppResult<ChatMessage> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".into()));
    }
    state.require_document(document_id)?;

    info!(document_id, chars = message.len(), "processing chat message");

    // 1. Context for the question
    let context = state.retriever.get_context(
        state.db.as_ref(),
        document_id,
        message,
        DEFAULT_MAX_CHUNKS,
    );

    // 2. Earlier turns of this document's conversation
    let history = history_from_turns(&state.db.get_chat_messages(document_id)?);

    // 3. Generate
    let orchestrator = ChatOrchestrator::new(llm);
    let answer = generate(
        state.options.request_timeout,
        orchestrator.respond(message, &context, &history),
    )
    .await?;

    // 4. Save the turn
    let saved = state.db.create_chat_message(NewChatMessage {
        document_id: document_id.to_string(),
        message: message.to_string(),
        response: answer.response,
        citations: answer.citations,
    })?;

    info!(
        document_id,
        message_id = %saved.id,
        citations = saved.citations.len(),
        "stored chat turn"
    );
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::knowledge::{create_sample_document, upload_document};
    use crate::config::PipelineOptions;
    use crate::db::Database;
    use crate::doc_processor::SourceFormat;
    use crate::llm::{ChatMessage as LlmMessage, LlmError};
    use crate::orchestrator::tests::ScriptedProvider;
    use async_trait::async_trait;
    use std::time::Duration;

    fn state() -> AppState {
        AppState::new(
            Arc::new(Database::open_in_memory().unwrap()),
            PipelineOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_validation_and_not_found() {
        let state = state();
        let llm = Arc::new(ScriptedProvider::replying("unused"));

        let err = send_message(&state, llm.clone(), "missing", "   ").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = send_message(&state, llm.clone(), "missing", "hello").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert!(llm.calls.lock().is_empty());

        assert!(matches!(get_messages(&state, "missing"), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_turns_feed_history() {
        let state = state();
        let doc = create_sample_document(&state).await.unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![
            Ok("It lets you chat with documents.".into()),
            Ok("Research paper analysis is one.".into()),
        ]));

        let first = send_message(&state, llm.clone(), &doc.id, "What is ChatPDF?")
            .await
            .unwrap();
        assert_eq!(first.response, "It lets you chat with documents.");
        send_message(&state, llm.clone(), &doc.id, "use cases")
            .await
            .unwrap();

        let calls = llm.calls.lock();
        let second_prompt = &calls[1].0;
        assert_eq!(second_prompt.len(), 4);
        assert_eq!(second_prompt[1], LlmMessage::user("What is ChatPDF?"));
        assert_eq!(
            second_prompt[2],
            LlmMessage::assistant("It lets you chat with documents.")
        );
        assert!(second_prompt[3].content.contains("Use Cases:"));
        assert!(second_prompt[3].content.ends_with("User Question: use cases"));

        let history = get_messages(&state, &doc.id).unwrap();
        let questions: Vec<_> = history.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(questions, vec!["What is ChatPDF?", "use cases"]);
    }

    #[tokio::test]
    async fn test_answer_citations_stored() {
        let state = state();
        let text = "The expressway project covers four hundred kilometres of new road. \
            Funding for the project is approved for the financial year 2025.";
        let doc = upload_document(&state, text.as_bytes().to_vec(), "roads.txt", SourceFormat::PlainText)
            .await
            .unwrap();
        let llm = Arc::new(ScriptedProvider::replying(
            "Funding for the project is approved for 2025.",
        ));

        let saved = send_message(&state, llm, &doc.id, "funding").await.unwrap();
        assert_eq!(saved.citations.len(), 1);
        assert_eq!(saved.citations[0].page_number, 1);
        assert!(saved.citations[0].content.starts_with("Funding for the project"));

        let fetched = get_messages(&state, &doc.id).unwrap();
        assert_eq!(fetched[0].citations, saved.citations);
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces_and_stores_nothing() {
        let state = state();
        let doc = create_sample_document(&state).await.unwrap();
        let llm = Arc::new(ScriptedProvider::new(vec![Err(LlmError::Api {
            status: 401,
            message: "bad token".into(),
        })]));

        let err = send_message(&state, llm, &doc.id, "hi").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Failed to generate response");
        assert!(get_messages(&state, &doc.id).unwrap().is_empty());
    }

    struct StalledProvider;

    #[async_trait]
    impl CompletionProvider for StalledProvider {
        fn model(&self) -> &str {
            "stalled"
        }

        async fn complete(
            &self,
            _messages: Vec<LlmMessage>,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_generation_failure() {
        let mut state = state();
        state.options.request_timeout = Duration::from_millis(20);
        let doc = create_sample_document(&state).await.unwrap();

        let err = send_message(&state, Arc::new(StalledProvider), &doc.id, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
    }
}
