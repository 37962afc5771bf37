//! Vector index abstraction.
//!
//! Defines a trait for provider-agnostic nearest-neighbour retrieval and the
//! match type every backend returns.

use rmp_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stored item returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMatch {
    /// Stored item identifier (the professor's name)
    pub id: String,

    /// Similarity score, when the backend reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    /// Free-form metadata, passed through unmodified
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// 0-based position in result order
    #[serde(default)]
    pub rank: usize,
}

impl RetrievedMatch {
    pub fn review(&self) -> Option<String> {
        self.field("review")
    }

    pub fn subject(&self) -> Option<String> {
        self.field("subject")
    }

    pub fn stars(&self) -> Option<String> {
        self.field("stars")
    }

    /// Render a metadata field as text.
    ///
    /// Missing keys, `null` and blank strings are absent. Numbers keep their
    /// JSON form; other structured values are rendered as JSON.
    fn field(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorIndexClient: Send + Sync + std::fmt::Debug {
    /// Backend name (e.g., "pinecone", "memory")
    fn backend_name(&self) -> &str;

    /// Return at most `top_k` matches for `vector`, most similar first.
    ///
    /// An index with no matches yields an empty list.
    async fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<RetrievedMatch>>;
}

pub(crate) fn ensure_top_k(top_k: usize) -> AppResult<()> {
    if top_k == 0 {
        return Err(AppError::InvalidRequest(
            "topK must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Truncate to `top_k` and number the survivors in order.
pub(crate) fn rank_matches(mut matches: Vec<RetrievedMatch>, top_k: usize) -> Vec<RetrievedMatch> {
    matches.truncate(top_k);
    for (rank, m) in matches.iter_mut().enumerate() {
        m.rank = rank;
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_metadata(metadata: Value) -> RetrievedMatch {
        RetrievedMatch {
            id: "Dr. Smith".to_string(),
            score: Some(0.9),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            rank: 0,
        }
    }

    #[test]
    fn test_accessors_render_present_fields() {
        let m = with_metadata(json!({
            "review": "Great lectures",
            "subject": "Chemistry",
            "stars": 4.5
        }));

        assert_eq!(m.review().as_deref(), Some("Great lectures"));
        assert_eq!(m.subject().as_deref(), Some("Chemistry"));
        assert_eq!(m.stars().as_deref(), Some("4.5"));
    }

    #[test]
    fn test_absent_fields() {
        let m = with_metadata(json!({"review": null, "subject": "   "}));

        assert_eq!(m.review(), None);
        assert_eq!(m.subject(), None);
        assert_eq!(m.stars(), None);
    }

    #[test]
    fn test_stars_formats() {
        assert_eq!(with_metadata(json!({"stars": 4})).stars().as_deref(), Some("4"));
        assert_eq!(with_metadata(json!({"stars": 0})).stars().as_deref(), Some("0"));
        assert_eq!(with_metadata(json!({"stars": "5/5"})).stars().as_deref(), Some("5/5"));
    }

    #[test]
    fn test_rank_matches_truncates_and_numbers() {
        let matches = (0..5)
            .map(|i| RetrievedMatch {
                id: format!("p{i}"),
                score: None,
                metadata: Map::new(),
                rank: 99,
            })
            .collect();

        let ranked = rank_matches(matches, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked.iter().map(|m| m.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(ranked[2].id, "p2");
    }

    #[test]
    fn test_zero_top_k_is_invalid() {
        assert!(matches!(ensure_top_k(0), Err(AppError::InvalidRequest(_))));
        assert!(ensure_top_k(1).is_ok());
    }
}
