//! Types for the RAG request pipeline.

use bytes::Bytes;
use futures::Stream;
use rmp_core::AppResult;
use std::fmt;
use std::pin::Pin;

/// Caller-facing body: UTF-8 text chunks in production order.
///
/// A failure after the first chunk appears as one terminal `Err` item.
pub type ResponseStream = Pin<Box<dyn Stream<Item = AppResult<Bytes>> + Send>>;

/// Per-request tuning for [`RagOrchestrator`](crate::rag::RagOrchestrator).
#[derive(Debug, Clone)]
pub struct RagOptions {
    /// Rendered system instruction, prepended to every conversation
    pub system_prompt: String,

    /// Matches retrieved per request
    pub top_k: usize,

    /// Generative model identifier
    pub model: String,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,
}

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Validating,
    Embedding,
    Retrieving,
    Augmenting,
    Streaming,
    Completed,
    FailedPreStream,
    FailedMidStream,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Embedding => "embedding",
            Self::Retrieving => "retrieving",
            Self::Augmenting => "augmenting",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::FailedPreStream => "failed_pre_stream",
            Self::FailedMidStream => "failed_mid_stream",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::FailedPreStream | Self::FailedMidStream
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
