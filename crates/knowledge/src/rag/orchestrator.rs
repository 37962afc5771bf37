//! RAG request orchestration.
//!
//! One call to [`RagOrchestrator::handle`] runs the whole pipeline for a
//! conversation: embed the last message, retrieve the nearest matches, fold
//! them into the last turn and stream the model's answer back. Everything up
//! to the first generated byte either succeeds or fails as a single error;
//! after that, failures end the stream with one terminal error item.

use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::index::{create_index, RetrievedMatch, VectorIndexClient};
use crate::rag::augment::augment;
use crate::rag::types::{RagOptions, RequestState, ResponseStream};
use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use rmp_core::{AppConfig, AppError, AppResult};
use rmp_llm::{ChatClient, ChatMessage, ChatRequest, ChatStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Follows one request through its states and logs each transition.
struct RequestTracker {
    id: u64,
    state: RequestState,
    started: Instant,
}

impl RequestTracker {
    fn new() -> Self {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        debug!(request = id, state = %RequestState::Validating, "Request started");
        Self {
            id,
            state: RequestState::Validating,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: RequestState) {
        debug!(request = self.id, from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    fn completed(&mut self, bytes: usize) {
        self.advance(RequestState::Completed);
        info!(request = self.id, bytes, elapsed_ms = self.elapsed_ms(), "Request completed");
    }

    fn failed_pre_stream(&mut self, err: &AppError) {
        let stage = self.state;
        self.advance(RequestState::FailedPreStream);
        if err.is_client_error() {
            warn!(request = self.id, error = %err, "Rejected request");
        } else {
            error!(
                request = self.id,
                stage = %stage,
                error = %err,
                elapsed_ms = self.elapsed_ms(),
                "Request failed before streaming"
            );
        }
    }

    fn failed_mid_stream(&mut self, err: &AppError, bytes: usize) {
        self.advance(RequestState::FailedMidStream);
        error!(
            request = self.id,
            error = %err,
            bytes,
            elapsed_ms = self.elapsed_ms(),
            "Stream failed after output started"
        );
    }
}

impl Drop for RequestTracker {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            info!(request = self.id, state = %self.state, "Request cancelled by caller");
        }
    }
}

/// First output of a started generation plus the rest of the upstream.
struct StreamStart {
    first: Option<Bytes>,
    rest: Option<ChatStream>,
}

/// Check the conversation and return its last message.
pub fn validate_history(history: &[ChatMessage]) -> AppResult<&ChatMessage> {
    let last = history
        .last()
        .ok_or_else(|| AppError::InvalidRequest("Conversation is empty".to_string()))?;

    if last.content.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Last message has no content".to_string(),
        ));
    }

    Ok(last)
}

/// Build the conversation sent to the model.
///
/// The system prompt comes first, then every earlier turn in order, then the
/// augmented form of the last turn. The original last turn is not sent.
pub fn build_conversation(
    system_prompt: &str,
    history: &[ChatMessage],
    matches: &[RetrievedMatch],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));

    if let Some((last, earlier)) = history.split_last() {
        messages.extend(earlier.iter().cloned());
        messages.push(augment(last, matches));
    }

    messages
}

/// Sequences embedding, retrieval, augmentation and generation.
///
/// Holds only immutable options and shared stateless clients, so one
/// instance serves any number of concurrent requests.
pub struct RagOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndexClient>,
    chat: Arc<dyn ChatClient>,
    options: RagOptions,
}

impl RagOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndexClient>,
        chat: Arc<dyn ChatClient>,
        options: RagOptions,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            options,
        }
    }

    /// Build every collaborator from configuration.
    ///
    /// May contact the index control plane once to resolve its host.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embedder = create_provider(&config.embedding, &config.upstream)?;
        let index = create_index(&config.index, &config.upstream).await?;
        let chat = rmp_llm::create_client(&config.generation, &config.upstream)?;

        let definition = rmp_prompt::load_system_prompt(config.prompt.path.as_deref())?;
        let system_prompt = rmp_prompt::render_system_prompt(&definition, config.index.top_k)?;

        info!(
            embedding = %format!("{}/{}", embedder.provider_name(), embedder.model_name()),
            index = index.backend_name(),
            generation = %format!("{}/{}", chat.provider_name(), config.generation.model),
            prompt = %system_prompt.source_prompt_id,
            top_k = config.index.top_k,
            "RAG pipeline ready"
        );

        Ok(Self::new(
            embedder,
            index,
            chat,
            RagOptions {
                system_prompt: system_prompt.text,
                top_k: config.index.top_k,
                model: config.generation.model.clone(),
                temperature: config.generation.temperature,
                max_tokens: config.generation.max_tokens,
            },
        ))
    }

    pub fn options(&self) -> &RagOptions {
        &self.options
    }

    /// Run the pipeline for `history` and return the answer stream.
    ///
    /// Resolves once the first non-empty chunk has been generated, so any
    /// failure before that point is returned here as one error.
    pub async fn handle(&self, history: Vec<ChatMessage>) -> AppResult<ResponseStream> {
        let mut tracker = RequestTracker::new();

        match self.start(&history, &mut tracker).await {
            Ok(start) => Ok(relay(start, tracker)),
            Err(err) => {
                tracker.failed_pre_stream(&err);
                Err(err)
            }
        }
    }

    async fn start(
        &self,
        history: &[ChatMessage],
        tracker: &mut RequestTracker,
    ) -> AppResult<StreamStart> {
        let last = validate_history(history)?;
        debug!(request = tracker.id, turns = history.len(), "Conversation accepted");

        tracker.advance(RequestState::Embedding);
        let vector = self.embedder.embed(&last.content).await?;
        debug!(request = tracker.id, dimensions = vector.len(), "Query embedded");

        tracker.advance(RequestState::Retrieving);
        let matches = self.index.query(&vector, self.options.top_k).await?;
        debug!(request = tracker.id, matches = matches.len(), "Matches retrieved");

        tracker.advance(RequestState::Augmenting);
        let messages = build_conversation(&self.options.system_prompt, history, &matches);

        let mut request = ChatRequest::new(&self.options.model, messages);
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        tracker.advance(RequestState::Streaming);
        let mut upstream = self.chat.stream(&request).await?;

        while let Some(item) = upstream.next().await {
            let chunk = item?;
            let done = chunk.done;
            if !chunk.content.is_empty() {
                return Ok(StreamStart {
                    first: Some(Bytes::from(chunk.content)),
                    rest: (!done).then_some(upstream),
                });
            }
            if done {
                break;
            }
        }

        Ok(StreamStart {
            first: None,
            rest: None,
        })
    }
}

/// Forward chunk text to the caller as it arrives.
///
/// The upstream stream is owned here: dropping the returned stream drops
/// the upstream response and its connection.
fn relay(start: StreamStart, mut tracker: RequestTracker) -> ResponseStream {
    let StreamStart { first, rest } = start;

    Box::pin(stream! {
        let mut delivered = 0usize;

        if let Some(bytes) = first {
            delivered += bytes.len();
            yield Ok(bytes);
        }

        if let Some(mut upstream) = rest {
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        let done = chunk.done;
                        if !chunk.content.is_empty() {
                            delivered += chunk.content.len();
                            yield Ok(Bytes::from(chunk.content));
                        }
                        if done {
                            break;
                        }
                    }
                    Err(err) => {
                        tracker.failed_mid_stream(&err, delivered);
                        yield Err(err);
                        break;
                    }
                }
            }
        }

        if !tracker.state.is_terminal() {
            tracker.completed(delivered);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmp_llm::Role;

    #[test]
    fn test_validate_history() {
        assert!(matches!(validate_history(&[]), Err(AppError::InvalidRequest(_))));
        assert!(matches!(
            validate_history(&[ChatMessage::user(" \n")]),
            Err(AppError::InvalidRequest(_))
        ));

        let history = vec![ChatMessage::user("hi"), ChatMessage::user("chemistry?")];
        assert_eq!(validate_history(&history).unwrap().content, "chemistry?");
    }

    #[test]
    fn test_build_conversation_shape() {
        let history = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("last"),
        ];

        let messages = build_conversation("SYS", &history, &[]);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ChatMessage::system("SYS"));
        assert_eq!(&messages[1..3], &history[..2]);
        assert_eq!(messages[3].role, Role::User);
        assert_eq!(messages[3].content, "last");
    }
}
