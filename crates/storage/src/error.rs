//! Error types for cache resolution and transfer operations.

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Object not found in the storage backend.
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Network or backend service error.
    #[error("Network error: {message}")]
    Network {
        message: String,
        retryable: bool,
        /// Backend request identifier, when the backend reported one.
        request_id: Option<String>,
    },

    /// A deadline expired. Per-attempt timeouts are retried; per-part
    /// timeouts on the SDK path abort the transfer.
    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Downloaded size does not match the advertised content length.
    #[error("Size mismatch for {key}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Missing or unparseable object metadata (e.g. content length).
    #[error("Invalid object metadata: {message}")]
    InvalidMetadata { message: String },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CacheError {
    /// Create a network error with no backend diagnostics.
    pub fn network(message: impl Into<String>, retryable: bool) -> Self {
        CacheError::Network {
            message: message.into(),
            retryable,
            request_id: None,
        }
    }

    /// Create an I/O error for a path.
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            path: String::new(),
            message: err.to_string(),
        }
    }
}
