//! Chat provider factory.
//!
//! This module creates the configured chat client from the generation
//! section of `AppConfig`.

use crate::client::ChatClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use rmp_core::config::{GenerationSettings, UpstreamSettings};
use rmp_core::{AppError, AppResult};
use std::sync::Arc;

/// Create a chat client from configuration.
///
/// # Errors
/// Returns `AppError::Config` if:
/// - Provider is unknown
/// - Required API key is missing
/// - HTTP client initialization fails
pub fn create_client(
    settings: &GenerationSettings,
    upstream: &UpstreamSettings,
) -> AppResult<Arc<dyn ChatClient>> {
    let provider = ProviderType::parse(&settings.provider).ok_or_else(|| {
        AppError::Config(format!("Unknown generation provider: {}", settings.provider))
    })?;
    let timeouts = upstream.streaming_timeouts();

    tracing::debug!(
        provider = provider.as_str(),
        model = %settings.model,
        "Creating chat client"
    );

    match provider {
        ProviderType::Ollama => {
            let client = match settings.endpoint.as_deref() {
                Some(endpoint) => OllamaClient::with_base_url(endpoint, timeouts)?,
                None => OllamaClient::new(timeouts)?,
            };
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let api_key = settings.api_key.as_deref().ok_or_else(|| {
                AppError::Config(format!(
                    "OpenAI provider requires API key (set {})",
                    settings.api_key_env
                ))
            })?;
            let client = match settings.endpoint.as_deref() {
                Some(endpoint) => OpenAiClient::with_base_url(endpoint, api_key, timeouts)?,
                None => OpenAiClient::new(api_key, timeouts)?,
            };
            Ok(Arc::new(client))
        }
    }
}
