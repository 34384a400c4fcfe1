//! Upstream completion service client.
//!
//! Wraps the genai streaming chat API behind a small trait so the handler
//! can be exercised without network access. The effective credential is
//! passed per call and scoped to one client instance; nothing shared is
//! mutated when a request overrides the key.

use async_trait::async_trait;
use futures::stream::Stream;
use futures_util::StreamExt;
use genai::ModelIden;
use genai::chat::{ChatOptions, ChatStreamEvent};
use genai::resolver::{AuthData, AuthResolver};
use std::pin::Pin;

use crate::chat::{ChatMessage, ChatRole};

/// Model requested from the completion service.
pub const COMPLETION_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature, fixed across requests.
pub const COMPLETION_TEMPERATURE: f64 = 0.7;

/// Incremental completion text, one item per upstream chunk.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The call failed before any chunk was produced.
    #[error("completion invocation failed: {0}")]
    Invocation(String),
    /// The stream broke after it had started.
    #[error("completion stream failed: {0}")]
    Stream(String),
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Starts a streaming completion for the given conversation.
    ///
    /// An `Err` here means the invocation itself failed and no response
    /// body has been committed yet; errors after this point arrive as
    /// items on the returned stream.
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        credential: &str,
    ) -> Result<CompletionStream, CompletionError>;
}

/// Production backend speaking to the completion service through genai.
pub struct GenAiBackend;

#[async_trait]
impl CompletionBackend for GenAiBackend {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        credential: &str,
    ) -> Result<CompletionStream, CompletionError> {
        let key = credential.to_string();
        let auth_resolver = AuthResolver::from_resolver_fn(
            move |_model_iden: ModelIden| -> Result<Option<AuthData>, genai::resolver::Error> {
                Ok(Some(AuthData::from_single(key.clone())))
            },
        );
        let client = genai::Client::builder()
            .with_auth_resolver(auth_resolver)
            .build();

        let chat_req = to_genai_request(messages);
        let options = ChatOptions::default().with_temperature(COMPLETION_TEMPERATURE);

        let chat_response = client
            .exec_chat_stream(COMPLETION_MODEL, chat_req, Some(&options))
            .await
            .map_err(|e| CompletionError::Invocation(e.to_string()))?;

        Ok(chunk_stream(chat_response.stream))
    }
}

/// Narrows the upstream event stream to response text: `Chunk` content is
/// passed through, `End` terminates, every other event kind (start,
/// reasoning, tool-call, signature) carries no answer text and is skipped.
fn chunk_stream(
    events: impl Stream<Item = Result<ChatStreamEvent, genai::Error>> + Send + 'static,
) -> CompletionStream {
    let mut events = Box::pin(events);
    Box::pin(async_stream::stream! {
        while let Some(event) = events.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => yield Ok(chunk.content),
                Ok(ChatStreamEvent::End(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    yield Err(CompletionError::Stream(e.to_string()));
                    break;
                }
            }
        }
    })
}

fn to_genai_request(messages: &[ChatMessage]) -> genai::chat::ChatRequest {
    let mut chat_req = genai::chat::ChatRequest::default();
    for message in messages {
        let genai_message = match message.role {
            ChatRole::User => genai::chat::ChatMessage::user(message.content.clone()),
            ChatRole::Assistant => genai::chat::ChatMessage::assistant(message.content.clone()),
            ChatRole::System => genai::chat::ChatMessage::system(message.content.clone()),
        };
        chat_req = chat_req.append_message(genai_message);
    }
    chat_req
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_genai_request_preserves_message_count() {
        let messages = vec![
            ChatMessage::system("reply in french"),
            ChatMessage {
                role: ChatRole::User,
                content: "Hello".to_string(),
            },
            ChatMessage::assistant("Bonjour"),
        ];

        let req = to_genai_request(&messages);
        assert_eq!(req.messages.len(), 3);
    }

    #[test]
    fn test_temperature_is_fixed() {
        assert!((COMPLETION_TEMPERATURE - 0.7).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_chunk_stream_keeps_only_chunk_content() {
        use genai::chat::StreamChunk;

        let events: Vec<Result<ChatStreamEvent, genai::Error>> = vec![
            Ok(ChatStreamEvent::Start),
            Ok(ChatStreamEvent::Chunk(StreamChunk {
                content: "I'm ".to_string(),
            })),
            Ok(ChatStreamEvent::ReasoningChunk(StreamChunk {
                content: "thinking...".to_string(),
            })),
            Ok(ChatStreamEvent::Chunk(StreamChunk {
                content: "fine".to_string(),
            })),
        ];

        let chunks: Vec<String> = chunk_stream(futures::stream::iter(events))
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec!["I'm ", "fine"]);
    }
}
