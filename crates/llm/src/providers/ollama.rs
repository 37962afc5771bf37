//! Ollama chat provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{ChatChunk, ChatClient, ChatMessage, ChatRequest, ChatStream};
use crate::providers::framing::LineBuffer;
use async_stream::try_stream;
use futures::StreamExt;
use rmp_core::{AppError, AppResult};
use rmp_core::config::HttpTimeouts;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const SERVICE: &str = "ollama";

/// Ollama `/api/chat` request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// One NDJSON line of an `/api/chat` stream.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Decode one NDJSON line into a chunk.
fn parse_line(line: &str) -> AppResult<Option<ChatChunk>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let response: OllamaResponse = serde_json::from_str(line)
        .map_err(|e| AppError::MidStream(format!("Failed to parse ollama chunk: {}", e)))?;

    if let Some(error) = response.error {
        return Err(AppError::MidStream(format!("ollama reported: {}", error)));
    }

    Ok(Some(ChatChunk {
        content: response.message.map(|m| m.content).unwrap_or_default(),
        model: response.model,
        done: response.done,
    }))
}

/// Ollama chat client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new(timeouts: HttpTimeouts) -> AppResult<Self> {
        Self::with_base_url(DEFAULT_OLLAMA_URL, timeouts)
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>, timeouts: HttpTimeouts) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.response)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Convert ChatRequest to Ollama format.
    fn to_ollama_request<'a>(&self, request: &'a ChatRequest) -> OllamaRequest<'a> {
        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }
        });

        OllamaRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            options,
        }
    }
}

#[async_trait::async_trait]
impl ChatClient for OllamaClient {
    fn provider_name(&self) -> &str {
        SERVICE
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        tracing::info!("Starting streaming request to Ollama");
        tracing::debug!(model = %request.model, messages = request.messages.len(), "Chat request");

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&self.to_ollama_request(request))
            .send()
            .await
            .map_err(|e| AppError::unavailable(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::upstream(
                SERVICE,
                format!("API error ({}): {}", status, error_text),
            ));
        }

        let mut body = Box::pin(response.bytes_stream());

        // Ollama sends newline-delimited JSON, terminated by a `done: true` object
        let stream = try_stream! {
            let mut lines = LineBuffer::default();
            let mut finished = false;

            while let Some(next) = body.next().await {
                let bytes = next
                    .map_err(|e| AppError::MidStream(format!("ollama stream error: {}", e)))?;

                for line in lines.push(&bytes) {
                    if let Some(chunk) = parse_line(&line)? {
                        finished = chunk.done;
                        yield chunk;
                        if finished {
                            break;
                        }
                    }
                }

                if finished {
                    break;
                }
            }

            if !finished {
                if let Some(line) = lines.finish() {
                    if let Some(chunk) = parse_line(&line)? {
                        finished = chunk.done;
                        yield chunk;
                    }
                }
            }

            if !finished {
                Err::<(), _>(AppError::MidStream(
                    "ollama stream ended before done".to_string(),
                ))?;
            }
        };

        Ok(Box::pin(stream))
    }
}
