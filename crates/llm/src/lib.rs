//! Streaming chat integration crate for RMP.
//!
//! This crate provides a provider-agnostic abstraction for streaming a
//! generative model's answer to an ordered conversation.
//!
//! # Providers
//! - **OpenAI**: chat completions over server-sent events (default)
//! - **Ollama**: local runtime, newline-delimited JSON
//!
//! # Example
//! ```no_run
//! use futures::StreamExt;
//! use rmp_core::config::UpstreamSettings;
//! use rmp_llm::{ChatClient, ChatMessage, ChatRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new(UpstreamSettings::default().streaming_timeouts())?;
//! let request = ChatRequest::new("llama3.2", vec![ChatMessage::user("Hello, world!")]);
//! let mut stream = client.stream(&request).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use client::{ChatChunk, ChatClient, ChatMessage, ChatRequest, ChatStream, Role};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
