//! Shared fixtures: local HTTP stubs and scripted pipeline collaborators.

use crate::embeddings::EmbeddingProvider;
use crate::index::{RetrievedMatch, VectorIndexClient};
use crate::rag::{RagOptions, RagOrchestrator};
use axum::routing::post;
use axum::Router;
use rmp_core::config::HttpTimeouts;
use rmp_core::{AppError, AppResult};
use rmp_llm::{ChatChunk, ChatClient, ChatRequest, ChatStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serve `router` on an ephemeral local port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Serve a `POST path` that accepts the request and never answers.
pub(crate) async fn serve_stalled(path: &str) -> String {
    let router = Router::new().route(
        path,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            "late"
        }),
    );
    serve(router).await
}

/// Timeouts tight enough for stalled-upstream tests.
pub(crate) fn quick_timeouts() -> HttpTimeouts {
    HttpTimeouts::new(Duration::from_secs(2), Duration::from_secs(1))
}

/// Fail the test if `future` does not settle within ten seconds.
pub(crate) async fn settles<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(10), future)
        .await
        .expect("upstream call still pending")
}

#[derive(Debug, Default)]
pub(crate) struct StubEmbedder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl StubEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-embedding"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(2)
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::unavailable("embedding", "connection refused"));
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[derive(Debug, Default)]
pub(crate) struct StubIndex {
    pub matches: Vec<RetrievedMatch>,
    pub calls: AtomicUsize,
    pub last_top_k: AtomicUsize,
}

impl StubIndex {
    pub fn with_matches(matches: Vec<RetrievedMatch>) -> Self {
        Self {
            matches,
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl VectorIndexClient for StubIndex {
    fn backend_name(&self) -> &str {
        "stub"
    }

    async fn query(&self, _vector: &[f32], top_k: usize) -> AppResult<Vec<RetrievedMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_top_k.store(top_k, Ordering::SeqCst);
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }
}

/// One scripted step of a generation stream.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Text(&'static str),
    Pause(u64),
    Fail,
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Chat client that replays a fixed script and records every request.
pub(crate) struct ScriptedChat {
    steps: Vec<Step>,
    finish: bool,
    reject: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
    pub released: Arc<AtomicBool>,
}

impl ScriptedChat {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            finish: true,
            reject: false,
            requests: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Never send the completion marker.
    pub fn unfinished(mut self) -> Self {
        self.finish = false;
        self
    }

    /// Fail the call itself, before any stream exists.
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl ChatClient for ScriptedChat {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        self.requests.lock().unwrap().push(request.clone());
        if self.reject {
            return Err(AppError::upstream("generation", "401 Unauthorized"));
        }

        let steps = self.steps.clone();
        let finish = self.finish;
        let guard = DropFlag(Arc::clone(&self.released));

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            let mut failed = false;

            for step in steps {
                match step {
                    Step::Text(text) => {
                        yield Ok(ChatChunk::text(text, "scripted"));
                    }
                    Step::Pause(ms) => {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                    Step::Fail => {
                        yield Err(AppError::MidStream("connection reset".to_string()));
                        failed = true;
                        break;
                    }
                }
            }

            if finish && !failed {
                yield Ok(ChatChunk::finished("scripted"));
            }
        }))
    }
}

pub(crate) fn options() -> RagOptions {
    RagOptions {
        system_prompt: "SYSTEM".to_string(),
        top_k: 3,
        model: "test-model".to_string(),
        temperature: None,
        max_tokens: None,
    }
}

pub(crate) fn orchestrator(
    embedder: &Arc<StubEmbedder>,
    index: &Arc<StubIndex>,
    chat: &Arc<ScriptedChat>,
) -> RagOrchestrator {
    RagOrchestrator::new(embedder.clone(), index.clone(), chat.clone(), options())
}
