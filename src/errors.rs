//! Error types for groundqa
//!
//! One error enum for the whole crate, classified the way callers need it:
//! business errors are safe to show, transient errors are retried at the
//! backend boundary, everything else is an internal failure.

use thiserror::Error;

/// Safe message returned to callers for anything that is not a business error
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Main error type for the question-answering pipeline
#[derive(Error, Debug)]
pub enum QaError {
    /// Malformed caller request (business error, shown verbatim)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Similarity backend failures
    #[error("Retrieval backend error: {0}")]
    RetrievalBackend(String),

    /// Language-model backend failures
    #[error("Generation backend error: {0}")]
    Generation(String),

    /// Short- or long-term memory store failures
    #[error("Memory store error: {0}")]
    Memory(String),

    /// Upstream rate limiting (transient)
    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    /// Upstream timeout (transient)
    #[error("Upstream timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Upstream temporarily unavailable (transient)
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document ingestion errors
    #[error("Ingestion error: {0}")]
    Ingest(String),

    /// Workflow reached a node with no edge for the event
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Unexpected failures
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, QaError>;

impl QaError {
    /// Transport-class failure that is safe to retry
    pub fn is_transient(&self) -> bool {
        match self {
            QaError::RateLimited(_) | QaError::Timeout { .. } | QaError::Unavailable(_) => true,
            QaError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Caller-facing error whose message is safe to return
    pub fn is_business(&self) -> bool {
        matches!(self, QaError::InvalidRequest(_))
    }

    /// Message for the invocation boundary; internals never leak
    pub fn public_message(&self) -> String {
        match self {
            QaError::InvalidRequest(msg) => msg.clone(),
            other => {
                tracing::error!(error = %other, debug = ?other, "unhandled pipeline failure");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
        }
    }
}

/// Convert anyhow errors to QaError
impl From<anyhow::Error> for QaError {
    fn from(err: anyhow::Error) -> Self {
        QaError::Internal(format!("{:#}", err))
    }
}
