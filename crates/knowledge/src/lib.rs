//! Retrieval-augmented generation for the RMP chat service.
//!
//! Provides the embedding clients, the vector index clients and the request
//! orchestrator that streams an augmented answer back to the caller.

pub mod embeddings;
pub mod index;
pub mod rag;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::{create_index, RetrievedMatch, VectorIndexClient};
pub use rag::{RagOptions, RagOrchestrator, RequestState, ResponseStream};
