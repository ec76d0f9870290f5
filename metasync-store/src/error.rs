//! Error types for store access.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised when a store call could not be completed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Top-level GraphQL errors.
    #[error("GraphQL error: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// The store refused the call because the request quota is exhausted.
    #[error("throttled by store, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// The store cannot be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if the store rejected the call for quota reasons.
    pub fn is_throttled(&self) -> bool {
        match self {
            StoreError::Throttled { .. } => true,
            StoreError::Http { status, .. } => *status == 429,
            _ => false,
        }
    }
}
