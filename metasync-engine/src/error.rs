//! Error types for the sync engine.

use metasync_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the engine.
///
/// Only [`EngineError::Setup`] and [`EngineError::InvalidConfig`] abort a run.
/// [`EngineError::Store`] is raised per operation and recovered by the
/// orchestrator, which counts the affected record as failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A store could not be reached before any work started.
    #[error("setup failed: {0}")]
    Setup(String),

    /// The run configuration cannot be executed.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// A store call failed, with the context needed to find it in the logs.
    #[error("{store}: {operation} (#{sequence}) failed: {source}")]
    Store {
        operation: &'static str,
        sequence: u64,
        store: String,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    /// Returns true for errors that end the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Setup(_) | EngineError::InvalidConfig(_))
    }
}
