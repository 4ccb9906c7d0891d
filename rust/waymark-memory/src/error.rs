//! Error types for spatial memory

use thiserror::Error;

/// Result type for spatial-memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors from the spatial-memory stores and providers
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Vector-store backend failure
    #[error("store error: {0}")]
    Store(String),

    /// Snapshot or metadata (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding model could not produce a vector
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
}

impl From<sled::Error> for MemoryError {
    fn from(e: sled::Error) -> Self {
        MemoryError::Store(e.to_string())
    }
}

impl From<bincode::Error> for MemoryError {
    fn from(e: bincode::Error) -> Self {
        MemoryError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Serialization(e.to_string())
    }
}
