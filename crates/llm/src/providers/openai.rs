//! OpenAI chat completions provider.
//!
//! Streams `/v1/chat/completions` responses, which arrive as server-sent
//! events: one `data: {json}` line per delta and a final `data: [DONE]`.
//! Any OpenAI-compatible endpoint works through `with_base_url`.

use crate::client::{ChatChunk, ChatClient, ChatMessage, ChatRequest, ChatStream};
use async_stream::try_stream;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use rmp_core::config::HttpTimeouts;
use rmp_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const CHAT_ENDPOINT: &str = "/chat/completions";
const SERVICE: &str = "openai";

/// OpenAI API request format.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// One streamed `chat.completion.chunk` object.
#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// What one server-sent event carries.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(ChatChunk),
    Done,
    Skip,
}

/// Decode the `data` of one event from a chat completions stream.
fn parse_event_data(data: &str) -> AppResult<SseEvent> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseEvent::Skip);
    }

    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(data)
        .map_err(|e| AppError::MidStream(format!("Failed to parse openai chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(AppError::MidStream(format!(
            "openai reported: {}",
            error.message
        )));
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    Ok(SseEvent::Chunk(ChatChunk::text(content, chunk.model)))
}

/// OpenAI chat client.
pub struct OpenAiClient {
    /// Base URL for the API (without the endpoint path)
    base_url: String,

    /// Bearer token
    api_key: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for the public OpenAI API.
    pub fn new(api_key: impl Into<String>, timeouts: HttpTimeouts) -> AppResult<Self> {
        Self::with_base_url(DEFAULT_OPENAI_URL, api_key, timeouts)
    }

    /// Create a client for an OpenAI-compatible endpoint.
    ///
    /// `timeouts.response` bounds the silence between reads of the stream.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeouts: HttpTimeouts,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "OpenAI provider requires API key".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.response)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Convert ChatRequest to the OpenAI wire format.
    fn to_openai_request<'a>(&self, request: &'a ChatRequest) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl ChatClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        SERVICE
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        tracing::info!("Starting streaming request to OpenAI");

        let url = format!("{}{}", self.base_url, CHAT_ENDPOINT);
        let body = self.to_openai_request(request);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::unavailable(SERVICE, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(AppError::upstream(
                SERVICE,
                format!("API error ({}): {}", status, detail),
            ));
        }

        let model = request.model.clone();
        let mut events = Box::pin(response.bytes_stream().eventsource());

        let stream = try_stream! {
            let mut finished = false;

            while let Some(next) = events.next().await {
                let event = next
                    .map_err(|e| AppError::MidStream(format!("openai stream error: {}", e)))?;

                match parse_event_data(&event.data)? {
                    SseEvent::Chunk(chunk) => {
                        yield chunk;
                    }
                    SseEvent::Done => {
                        finished = true;
                        break;
                    }
                    SseEvent::Skip => {}
                }
            }

            if !finished {
                Err::<(), _>(AppError::MidStream(
                    "openai stream ended before [DONE]".to_string(),
                ))?;
            }

            tracing::debug!("OpenAI stream completed");
            yield ChatChunk::finished(model);
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{paced_body, serve, stalled_body};
    use axum::{http::StatusCode, response::IntoResponse, routing::post, Router};
    use std::time::Duration;

    fn timeouts(read_secs: u64) -> HttpTimeouts {
        HttpTimeouts::new(Duration::from_secs(2), Duration::from_secs(read_secs))
    }

    fn client_for(base_url: &str) -> OpenAiClient {
        OpenAiClient::with_base_url(base_url, "sk-test", timeouts(5)).unwrap()
    }

    fn delta(content: &str) -> String {
        format!(
            "data: {{\"model\":\"gpt-4\",\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n",
            content
        )
    }

    fn completions(parts: Vec<String>) -> Router {
        Router::new().route(
            "/chat/completions",
            post(move || {
                let parts = parts.clone();
                async move { paced_body(parts) }
            }),
        )
    }

    async fn collect(mut stream: ChatStream) -> Vec<AppResult<ChatChunk>> {
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_parse_event_data_variants() {
        assert_eq!(parse_event_data("").unwrap(), SseEvent::Skip);
        assert_eq!(parse_event_data("[DONE]").unwrap(), SseEvent::Done);

        let data = r#"{"model":"gpt-4","choices":[{"delta":{"content":"Dr. "}}]}"#;
        assert_eq!(
            parse_event_data(data).unwrap(),
            SseEvent::Chunk(ChatChunk::text("Dr. ", "gpt-4"))
        );
    }

    #[test]
    fn test_role_only_delta_is_empty_chunk() {
        let data = r#"{"model":"gpt-4","choices":[{"delta":{"role":"assistant"}}]}"#;
        match parse_event_data(data).unwrap() {
            SseEvent::Chunk(chunk) => assert!(chunk.content.is_empty()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_error_payload() {
        let err = parse_event_data(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(matches!(err, AppError::MidStream(ref m) if m.contains("overloaded")));
    }

    #[test]
    fn test_request_conversion_forces_streaming() {
        let client = client_for("http://localhost:1");
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("hi")]).with_temperature(0.5);

        let body = serde_json::to_value(client.to_openai_request(&request)).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["temperature"], 0.5);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiClient::new("  ", timeouts(1));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_stream_reassembles_split_events() {
        let second = delta("Smith ");
        let (head, tail) = second.split_at(17);
        let parts = vec![
            ": keep-alive\n\n".to_string(),
            delta("Dr. "),
            head.to_string(),
            tail.to_string(),
            delta("is great"),
            "data: [DONE]\n\n".to_string(),
        ];
        let base_url = serve(completions(parts)).await;

        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("best prof?")]);
        let stream = client_for(&base_url).stream(&request).await.unwrap();
        let items = collect(stream).await;

        let chunks: Vec<ChatChunk> = items.into_iter().map(Result::unwrap).collect();
        let text: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(text, "Dr. Smith is great");
        assert!(chunks.last().unwrap().done);
    }

    #[tokio::test]
    async fn test_multi_line_data_is_one_event() {
        let parts = vec![
            "data: {\"model\":\"gpt-4\",\ndata: \"choices\":[{\"delta\":{\"content\":\"joined\"}}]}\n\n"
                .to_string(),
            "data: [DONE]\n\n".to_string(),
        ];
        let base_url = serve(completions(parts)).await;

        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("q")]);
        let answer = client_for(&base_url).complete(&request).await.unwrap();
        assert_eq!(answer, "joined");
    }

    #[tokio::test]
    async fn test_stream_without_done_is_error() {
        let base_url = serve(completions(vec![delta("partial")])).await;

        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("q")]);
        let stream = client_for(&base_url).stream(&request).await.unwrap();
        let items = collect(stream).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content, "partial");
        assert!(matches!(items[1], Err(AppError::MidStream(_))));
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { stalled_body(vec![delta("Dr. ")]) }),
        );
        let base_url = serve(router).await;

        let client = OpenAiClient::with_base_url(&base_url, "sk-test", timeouts(1)).unwrap();
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("q")]);
        let stream = client.stream(&request).await.unwrap();

        let items = tokio::time::timeout(Duration::from_secs(10), collect(stream))
            .await
            .expect("stalled stream was never cut off");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content, "Dr. ");
        assert!(matches!(items[1], Err(AppError::MidStream(_))));
    }

    #[tokio::test]
    async fn test_http_error_is_pre_stream_failure() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    r#"{"error":{"message":"Incorrect API key"}}"#,
                )
                    .into_response()
            }),
        );
        let base_url = serve(router).await;

        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("q")]);
        let result = client_for(&base_url).stream(&request).await;

        match result {
            Err(AppError::Upstream { service, message }) => {
                assert_eq!(service, "openai");
                assert!(message.contains("Incorrect API key"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected upstream error"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("q")]);
        let result = client_for(&format!("http://{}", addr)).stream(&request).await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable { .. })));
    }
}
