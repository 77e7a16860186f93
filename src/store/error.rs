//! Error types for due-queue store operations

use std::fmt;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the due-queue store
#[derive(Debug)]
pub enum StoreError {
    /// Connecting to the store failed
    Connection(String),

    /// A store command failed
    Command(String),

    /// Snapshot (de)serialization failed
    Serialization(String),

    /// The store did not answer in time
    Timeout(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "failed to connect to due-queue store: {}", msg),
            StoreError::Command(msg) => write!(f, "due-queue store command failed: {}", msg),
            StoreError::Serialization(msg) => write!(f, "snapshot serialization error: {}", msg),
            StoreError::Timeout(msg) => write!(f, "due-queue store timed out: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Connection(err.to_string())
        } else if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
