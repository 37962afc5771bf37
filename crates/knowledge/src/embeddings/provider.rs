//! Embedding provider trait and factory.

use crate::embeddings::providers::{MockProvider, OllamaProvider, OpenAiProvider};
use rmp_core::config::{EmbeddingSettings, UpstreamSettings};
use rmp_core::{AppError, AppResult};
use std::sync::Arc;

const SERVICE: &str = "embedding";

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Expected embedding dimensions, when known up front
    fn dimensions(&self) -> Option<usize>;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    ///
    /// Blank input is rejected before any upstream call.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "Cannot embed empty text".to_string(),
            ));
        }

        let mut results = self.embed_batch(&[text.to_string()]).await?;
        match (results.pop(), results.is_empty()) {
            (Some(embedding), true) => Ok(embedding),
            (None, _) => Err(AppError::upstream(SERVICE, "No embedding returned")),
            (Some(_), false) => Err(AppError::upstream(
                SERVICE,
                format!("Expected 1 embedding, got {}", results.len() + 1),
            )),
        }
    }
}

/// Reject a vector whose length differs from the configured dimensionality.
pub(crate) fn check_dimensions(
    service: &'static str,
    expected: Option<usize>,
    embedding: &[f32],
) -> AppResult<()> {
    match expected {
        Some(dimensions) if embedding.len() != dimensions => Err(AppError::upstream(
            service,
            format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                embedding.len(),
                dimensions
            ),
        )),
        _ => Ok(()),
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(
    settings: &EmbeddingSettings,
    upstream: &UpstreamSettings,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let timeouts = upstream.unary_timeouts();

    tracing::debug!(
        provider = %settings.provider,
        model = %settings.model,
        dimensions = ?settings.dimensions,
        "Creating embedding provider"
    );

    match settings.provider.as_str() {
        "mock" => {
            let provider = MockProvider::new(settings.dimensions.unwrap_or(MockProvider::DEFAULT_DIMENSIONS))
                .with_model(&settings.model);
            Ok(Arc::new(provider))
        }

        "openai" => {
            let api_key = settings.api_key.as_deref().ok_or_else(|| {
                AppError::Config(format!(
                    "OpenAI embeddings require an API key (set {})",
                    settings.api_key_env
                ))
            })?;
            let mut provider = OpenAiProvider::new(api_key, &settings.model, timeouts)?;
            if let Some(endpoint) = settings.endpoint.as_deref() {
                provider = provider.with_base_url(endpoint);
            }
            if let Some(dimensions) = settings.dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let mut provider = OllamaProvider::new(&settings.model, timeouts)?;
            if let Some(endpoint) = settings.endpoint.as_deref() {
                provider = provider.with_base_url(endpoint);
            }
            if let Some(dimensions) = settings.dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: openai, ollama, mock",
            settings.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: provider.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_mock_provider() {
        let mut settings = settings("mock");
        settings.model = "hash-v1".to_string();
        settings.dimensions = Some(64);

        let provider = create_provider(&settings, &UpstreamSettings::default()).unwrap();
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.model_name(), "hash-v1");
        assert_eq!(provider.dimensions(), Some(64));
    }

    #[test]
    fn test_openai_requires_api_key() {
        let err = create_provider(&settings("openai"), &UpstreamSettings::default()).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_create_unknown_provider() {
        let err = create_provider(&settings("gguf"), &UpstreamSettings::default()).unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_embed_rejects_blank_text() {
        let provider = create_provider(&settings("mock"), &UpstreamSettings::default()).unwrap();

        let result = provider.embed("  \n\t ").await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions("test", None, &[0.0; 3]).is_ok());
        assert!(check_dimensions("test", Some(3), &[0.0; 3]).is_ok());
        assert!(matches!(
            check_dimensions("test", Some(4), &[0.0; 3]),
            Err(AppError::Upstream { .. })
        ));
    }
}
