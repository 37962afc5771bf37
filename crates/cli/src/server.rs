//! HTTP surface for the chat pipeline.
//!
//! `POST /api/chat` takes a JSON array of `{role, content}` turns and
//! answers with the generated text as a streamed `text/plain` body.
//! Failures before streaming starts become a bare status line body; details
//! are logged, never sent.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmp_core::AppError;
use rmp_knowledge::RagOrchestrator;
use rmp_llm::ChatMessage;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared state for all handlers
pub struct AppState {
    pub rag: RagOrchestrator,
}

impl AppState {
    pub fn new(rag: RagOrchestrator) -> Arc<Self> {
        Arc::new(Self { rag })
    }
}

/// API-layer error: caller mistakes are 400, everything else 500.
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .with_state(state)
}

/// POST /api/chat - stream an answer to a conversation
async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let history: Vec<ChatMessage> = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected malformed conversation");
        AppError::InvalidRequest(format!("Malformed conversation: {}", e))
    })?;

    let stream = state.rag.handle(history).await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /health - Health check
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
