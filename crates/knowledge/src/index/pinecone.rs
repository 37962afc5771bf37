//! Pinecone vector index client.
//!
//! Queries go to the index's data-plane host. When no host is configured it
//! is resolved once through the control plane (`GET /indexes/{name}`) while
//! the client is being built, never per request.

use crate::index::client::{ensure_top_k, rank_matches, RetrievedMatch, VectorIndexClient};
use rmp_core::config::{IndexSettings, UpstreamSettings};
use rmp_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use rmp_core::config::HttpTimeouts;
use tracing::{debug, info, instrument};

/// Pinecone control plane.
pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const SERVICE: &str = "pinecone";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

/// Client for one namespace of a Pinecone index.
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: String,
}

impl PineconeIndex {
    /// Create a client for a known data-plane host.
    pub fn new(
        host: &str,
        api_key: impl Into<String>,
        namespace: impl Into<String>,
        timeouts: HttpTimeouts,
    ) -> AppResult<Self> {
        Ok(Self {
            client: http_client(timeouts)?,
            host: normalize_host(host),
            api_key: api_key.into(),
            namespace: namespace.into(),
        })
    }

    /// Build a client from configuration, resolving the host if needed.
    pub async fn connect(settings: &IndexSettings, upstream: &UpstreamSettings) -> AppResult<Self> {
        Self::connect_via(CONTROL_PLANE_URL, settings, upstream).await
    }

    pub(crate) async fn connect_via(
        control_plane: &str,
        settings: &IndexSettings,
        upstream: &UpstreamSettings,
    ) -> AppResult<Self> {
        let api_key = settings.api_key.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "Pinecone requires an API key (set {})",
                settings.api_key_env
            ))
        })?;
        let timeouts = upstream.unary_timeouts();

        let host = match settings.host.as_deref() {
            Some(host) => host.to_string(),
            None => {
                let client = http_client(timeouts)?;
                describe_index(&client, control_plane, &settings.name, api_key).await?
            }
        };

        info!(
            index = %settings.name,
            namespace = %settings.namespace,
            host = %host,
            "Connected to Pinecone index"
        );

        Self::new(&host, api_key, &settings.namespace, timeouts)
    }
}

fn http_client(timeouts: HttpTimeouts) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.response)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Data-plane hosts come back without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

async fn describe_index(
    client: &reqwest::Client,
    control_plane: &str,
    name: &str,
    api_key: &str,
) -> AppResult<String> {
    let url = format!("{}/indexes/{}", control_plane.trim_end_matches('/'), name);
    debug!("Resolving Pinecone index host via {}", url);

    let response = client
        .get(&url)
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", API_VERSION)
        .send()
        .await
        .map_err(|e| AppError::unavailable(SERVICE, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::upstream(
            SERVICE,
            format!("describe index '{}' failed ({}): {}", name, status, body),
        ));
    }

    let description: IndexDescription = response
        .json()
        .await
        .map_err(|e| AppError::upstream(SERVICE, format!("Failed to parse index description: {}", e)))?;

    Ok(description.host)
}

#[async_trait::async_trait]
impl VectorIndexClient for PineconeIndex {
    fn backend_name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self, vector), fields(dimensions = vector.len(), namespace = %self.namespace))]
    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<RetrievedMatch>> {
        ensure_top_k(top_k)?;

        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: &self.namespace,
        };

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::unavailable(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                SERVICE,
                format!("query failed ({}): {}", status, body),
            ));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("Failed to parse query response: {}", e)))?;

        let matches = body
            .matches
            .into_iter()
            .map(|m| RetrievedMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
                rank: 0,
            })
            .collect();

        let matches = rank_matches(matches, top_k);
        debug!("Pinecone returned {} matches", matches.len());

        Ok(matches)
    }
}
