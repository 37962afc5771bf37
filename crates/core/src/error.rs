//! Error types for the RMP chat service.
//!
//! This module defines a unified error enum covering configuration, caller
//! errors, the three upstream collaborators (embedding, vector index,
//! generation) and failures that happen after a response stream has started.

use thiserror::Error;

/// Unified error type for the RMP chat service.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller error: empty conversation, blank query, malformed body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An upstream service could not be reached
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// An upstream service answered with a failure or an unreadable body
    #[error("{service} error: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    /// The generated stream broke after bytes were already delivered
    #[error("Stream interrupted: {0}")]
    MidStream(String),

    /// Prompt loading and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Upstream could not be reached (connect failure, timeout, DNS).
    pub fn unavailable(service: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::UpstreamUnavailable {
            service,
            message: err.to_string(),
        }
    }

    /// Upstream was reached but the exchange failed.
    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Upstream {
            service,
            message: err.to_string(),
        }
    }

    /// Whether the failure was caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::InvalidRequest(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
