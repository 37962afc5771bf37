//! Chat client abstraction and request/response types.
//!
//! This module defines the core abstractions for streaming a generative
//! model's answer to an ordered conversation.

use futures::{Stream, StreamExt};
use rmp_core::AppResult;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Streaming chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier (e.g., "gpt-4", "llama3.2")
    pub model: String,

    /// Conversation in turn order
    pub messages: Vec<ChatMessage>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Create a new chat request with required fields.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A chunk from a streaming chat response.
///
/// Chunks carry no structural guarantees: a word may be split across two
/// chunks. Concatenating `content` in delivery order yields the full answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Incremental text content (may be empty)
    pub content: String,

    /// Model generating the stream
    pub model: String,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

impl ChatChunk {
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            done: false,
        }
    }

    /// Completion marker carrying no text.
    pub fn finished(model: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            model: model.into(),
            done: true,
        }
    }
}

/// Stream of chat chunks.
///
/// Finite and consumed once. A transport failure surfaces as a terminal
/// `Err` item; nothing is yielded after it.
pub type ChatStream = Pin<Box<dyn Stream<Item = AppResult<ChatChunk>> + Send>>;

/// Trait for generative chat providers.
///
/// This trait abstracts the underlying provider (OpenAI, Ollama, ...)
/// behind a streaming-first interface.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "openai").
    fn provider_name(&self) -> &str;

    /// Start a streaming completion.
    ///
    /// Resolves once the provider has accepted the request; failures before
    /// that point are returned here rather than inside the stream.
    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream>;

    /// Perform a completion and collect the full answer.
    async fn complete(&self, request: &ChatRequest) -> AppResult<String> {
        let mut stream = self.stream(request).await?;
        let mut content = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            content.push_str(&chunk.content);
            if chunk.done {
                break;
            }
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmp_core::AppError;

    struct ScriptedClient {
        items: Vec<&'static str>,
        fail_after: bool,
    }

    #[async_trait::async_trait]
    impl ChatClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn stream(&self, _request: &ChatRequest) -> AppResult<ChatStream> {
            let mut items: Vec<AppResult<ChatChunk>> = self
                .items
                .iter()
                .map(|text| Ok(ChatChunk::text(*text, "test")))
                .collect();
            if self.fail_after {
                items.push(Err(AppError::MidStream("reset".to_string())));
            } else {
                items.push(Ok(ChatChunk::finished("test")));
            }
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let parsed: Vec<ChatMessage> =
            serde_json::from_str(r#"[{"role":"system","content":"a"},{"role":"user","content":"b"}]"#)
                .unwrap();
        assert_eq!(parsed[0].role, Role::System);
        assert_eq!(parsed[1], ChatMessage::user("b"));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let parsed = serde_json::from_str::<ChatMessage>(r#"{"role":"tool","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_request_builder() {
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("hello")])
            .with_temperature(0.2)
            .with_max_tokens(256);

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(256));
    }

    #[tokio::test]
    async fn test_complete_collects_stream() {
        let client = ScriptedClient {
            items: vec!["Dr. ", "Smith ", "is great"],
            fail_after: false,
        };
        let request = ChatRequest::new("test", vec![ChatMessage::user("who?")]);

        let answer = client.complete(&request).await.unwrap();
        assert_eq!(answer, "Dr. Smith is great");
    }

    #[tokio::test]
    async fn test_complete_propagates_stream_failure() {
        let client = ScriptedClient {
            items: vec!["partial"],
            fail_after: true,
        };
        let request = ChatRequest::new("test", vec![ChatMessage::user("who?")]);

        let result = client.complete(&request).await;
        assert!(matches!(result, Err(AppError::MidStream(_))));
    }
}
