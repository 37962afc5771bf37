//! OpenAI embedding provider.
//!
//! Calls the `/v1/embeddings` endpoint directly with `reqwest`. The model is
//! always taken from configuration.

use crate::embeddings::provider::{check_dimensions, EmbeddingProvider};
use async_trait::async_trait;
use rmp_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use rmp_core::config::HttpTimeouts;
use tracing::{debug, instrument};

/// Default OpenAI API base URL.
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const EMBEDDING_ENDPOINT: &str = "/embeddings";
const SERVICE: &str = "openai embeddings";

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    /// If set, passed to the API and enforced on every response.
    dimensions: Option<usize>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiProvider {
    /// Create a new provider for `model`.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeouts: HttpTimeouts,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AppError::Config(
                "OpenAI API key must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.response)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key,
            model: model.into(),
            dimensions: None,
        })
    }

    /// Point the provider at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Request truncated embeddings of `dimensions` length.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };

        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::unavailable(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AppError::upstream(
                SERVICE,
                format!("API error ({}): {}", status, message),
            ));
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("Failed to parse response: {}", e)))?;

        if body.data.len() != texts.len() {
            return Err(AppError::upstream(
                SERVICE,
                format!("Expected {} embeddings, got {}", texts.len(), body.data.len()),
            ));
        }

        body.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();

        for embedding in &embeddings {
            check_dimensions(SERVICE, self.dimensions, embedding)?;
        }

        debug!(
            "Generated {} embeddings of dimension {}",
            embeddings.len(),
            embeddings.first().map_or(0, Vec::len)
        );

        Ok(embeddings)
    }
}
