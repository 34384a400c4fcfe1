use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of characters of the first message used for the chat title.
const TITLE_MAX_CHARS: usize = 100;

/// Title used when the first message carries no content.
const UNTITLED: &str = "Untitled Chat";

/// Length of generated chat identifiers.
const CHAT_ID_LEN: usize = 10;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "system")]
    System,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// Untrusted request body for the chat endpoint.
///
/// `messages` is shape-checked by the handler before this type is
/// deserialized, so a populated `ChatRequest` always holds at least one
/// message.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "previewToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub preview_token: Option<String>,
}

/// Caller identity resolved from session state, never from the body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// The durable transcript written once per completed stream.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub path: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRecord {
    /// Builds the record for a finished completion.
    ///
    /// `messages` are the original client messages (the server-side system
    /// directive is never persisted); the full completion text is appended
    /// as one assistant message.
    pub fn assemble(
        request_id: Option<String>,
        user_id: &str,
        mut messages: Vec<ChatMessage>,
        completion: String,
    ) -> Self {
        let title = derive_title(&messages);
        let id = request_id.unwrap_or_else(generate_chat_id);
        let path = format!("/chat/{id}");
        messages.push(ChatMessage::assistant(completion));

        Self {
            id,
            title,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            path,
            messages,
        }
    }
}

/// First 100 characters of the first message, or a fixed fallback.
fn derive_title(messages: &[ChatMessage]) -> String {
    match messages.first() {
        Some(msg) if !msg.content.is_empty() => msg.content.chars().take(TITLE_MAX_CHARS).collect(),
        _ => UNTITLED.to_string(),
    }
}

/// Short collision-resistant identifier for chats created without one.
pub fn generate_chat_id() -> String {
    nanoid::nanoid!(CHAT_ID_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_msg(content: &str) -> ChatMessage {
        ChatMessage {
            role: ChatRole::User,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_chat_role_serialization() {
        assert_eq!(serde_json::to_string(&ChatRole::User).unwrap(), r#""user""#);
        assert_eq!(
            serde_json::to_string(&ChatRole::Assistant).unwrap(),
            r#""assistant""#
        );
        assert_eq!(
            serde_json::to_string(&ChatRole::System).unwrap(),
            r#""system""#
        );
    }

    #[test]
    fn test_chat_request_deserialization() {
        let json = r#"{"messages":[{"role":"user","content":"Hello"}],"id":"abc","previewToken":"sk-test"}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, ChatRole::User);
        assert_eq!(request.id.as_deref(), Some("abc"));
        assert_eq!(request.preview_token.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_chat_request_optional_fields_default() {
        let json = r#"{"messages":[{"role":"user","content":"Hello"}]}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();

        assert!(request.id.is_none());
        assert!(request.preview_token.is_none());
    }

    #[test]
    fn test_title_truncates_to_100_chars() {
        let long = "x".repeat(250);
        let title = derive_title(&[user_msg(&long)]);
        assert_eq!(title.len(), 100);
        assert_eq!(title, "x".repeat(100));
    }

    #[test]
    fn test_title_short_content_kept_whole() {
        let title = derive_title(&[user_msg("Hello there, how are you today my friend")]);
        assert_eq!(title, "Hello there, how are you today my friend");
    }

    #[test]
    fn test_title_truncation_respects_char_boundaries() {
        let long = "é".repeat(150);
        let title = derive_title(&[user_msg(&long)]);
        assert_eq!(title.chars().count(), 100);
    }

    #[test]
    fn test_title_fallback_on_empty_content() {
        assert_eq!(derive_title(&[user_msg("")]), "Untitled Chat");
        assert_eq!(derive_title(&[]), "Untitled Chat");
    }

    #[test]
    fn test_assemble_uses_caller_supplied_id() {
        let record = ChatRecord::assemble(
            Some("chat-42".to_string()),
            "user-1",
            vec![user_msg("Hi")],
            "Hello!".to_string(),
        );

        assert_eq!(record.id, "chat-42");
        assert_eq!(record.path, "/chat/chat-42");
    }

    #[test]
    fn test_assemble_generates_id_when_absent() {
        let record =
            ChatRecord::assemble(None, "user-1", vec![user_msg("Hi")], "Hello!".to_string());

        assert_eq!(record.id.len(), 10);
        assert_eq!(record.path, format!("/chat/{}", record.id));
    }

    #[test]
    fn test_assemble_appends_single_assistant_message() {
        let original = vec![user_msg("Hi"), ChatMessage::assistant("Hello")];
        let record = ChatRecord::assemble(
            None,
            "user-1",
            original.clone(),
            "How can I help?".to_string(),
        );

        assert_eq!(record.messages.len(), 3);
        assert_eq!(record.messages[..2], original[..]);
        assert_eq!(record.messages[2].role, ChatRole::Assistant);
        assert_eq!(record.messages[2].content, "How can I help?");
    }

    #[test]
    fn test_assemble_sets_user_id_from_authorizer() {
        let record =
            ChatRecord::assemble(None, "user-7", vec![user_msg("Hi")], String::new());
        assert_eq!(record.user_id, "user-7");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_chat_id();
        let b = generate_chat_id();
        assert_ne!(a, b);
    }
}
