//! Error types for the offline cache worker
//!
//! Validation problems with tile requests and synthesis failures are reported
//! as HTTP responses, not as errors. The variants here cover the failures that
//! must propagate to the host: an unreachable network, a broken storage
//! backend, a bad configuration or a lifecycle step run out of order.

use thiserror::Error;

/// Main error type for worker operations
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Network fetch failed before a response was produced
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Cache storage backend failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pre-population of the core namespace failed
    #[error("Install failed for {path}: {reason}")]
    InstallError { path: String, reason: String },

    /// Lifecycle event delivered in the wrong state
    #[error("Invalid lifecycle transition: cannot {action} while {state}")]
    LifecycleError { action: String, state: String },

    /// URL could not be parsed
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    /// Filesystem access error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

impl From<String> for WorkerError {
    fn from(s: String) -> Self {
        WorkerError::Other(s)
    }
}

impl From<&str> for WorkerError {
    fn from(s: &str) -> Self {
        WorkerError::Other(s.to_string())
    }
}
