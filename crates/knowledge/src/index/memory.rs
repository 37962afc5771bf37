//! Read-only in-memory vector index using cosine similarity.
//!
//! Records are loaded once from a JSON file shaped like a Pinecone export:
//!
//! ```json
//! [{"id": "Dr. Smith", "values": [0.1, 0.2], "metadata": {"stars": 5}}]
//! ```

use crate::index::client::{ensure_top_k, rank_matches, RetrievedMatch, VectorIndexClient};
use rmp_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::Path;

const SERVICE: &str = "memory index";

/// One stored vector with its metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// An in-memory index over a fixed set of records.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: Vec<IndexRecord>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl MemoryIndex {
    pub fn new(records: Vec<IndexRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSON file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read memory index {:?}: {}", path, e))
        })?;

        let records: Vec<IndexRecord> = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse memory index {:?}: {}", path, e))
        })?;

        tracing::info!("Loaded {} records from {:?}", records.len(), path);

        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl VectorIndexClient for MemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<RetrievedMatch>> {
        ensure_top_k(top_k)?;

        if let Some(record) = self.records.iter().find(|r| r.values.len() != vector.len()) {
            return Err(AppError::upstream(
                SERVICE,
                format!(
                    "query has {} dimensions but record '{}' has {}",
                    vector.len(),
                    record.id,
                    record.values.len()
                ),
            ));
        }

        let mut scored: Vec<(f32, &IndexRecord)> = self
            .records
            .iter()
            .map(|record| (cosine_similarity(vector, &record.values), record))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let matches = scored
            .into_iter()
            .take(top_k)
            .map(|(score, record)| RetrievedMatch {
                id: record.id.clone(),
                score: Some(score),
                metadata: record.metadata.clone(),
                rank: 0,
            })
            .collect();

        Ok(rank_matches(matches, top_k))
    }
}
