//! Embedding clients: text in, fixed-length vector out.
//!
//! Provides a provider-agnostic [`EmbeddingProvider`] with OpenAI, Ollama
//! and an offline hashing implementation.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
