//! Retrieval-augmented answering.
//!
//! - `augment`: renders retrieved matches into the last user turn
//! - `orchestrator`: runs one request end to end as a byte stream
//! - `types`: request lifecycle and stream types

pub mod augment;
pub mod orchestrator;
pub mod types;

pub use augment::{augment, render_match};
pub use orchestrator::{build_conversation, validate_history, RagOrchestrator};
pub use types::{RagOptions, RequestState, ResponseStream};
