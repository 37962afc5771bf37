//! Vector index clients: vector in, nearest stored items out.

pub mod client;
pub mod memory;
pub mod pinecone;

pub use client::{RetrievedMatch, VectorIndexClient};
pub use memory::{IndexRecord, MemoryIndex};
pub use pinecone::PineconeIndex;

use rmp_core::config::{IndexSettings, UpstreamSettings};
use rmp_core::{AppError, AppResult};
use std::sync::Arc;

/// Create the configured index client.
///
/// Pinecone may need one control-plane call to resolve its host, so this is
/// async and belongs at startup.
pub async fn create_index(
    settings: &IndexSettings,
    upstream: &UpstreamSettings,
) -> AppResult<Arc<dyn VectorIndexClient>> {
    match settings.provider.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::connect(settings, upstream).await?)),
        "memory" => {
            let path = settings.path.as_deref().ok_or_else(|| {
                AppError::Config("index.path is required for the memory index".to_string())
            })?;
            Ok(Arc::new(MemoryIndex::load(path)?))
        }
        other => Err(AppError::Config(format!(
            "Unknown index provider: '{}'. Supported providers: pinecone, memory",
            other
        ))),
    }
}
