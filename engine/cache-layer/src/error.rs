//! Error types for the cache layer

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur in either cache tier
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Handed to callers that waited on an in-flight production which failed.
    #[error("Shared production for {key} failed: {message}")]
    ProducerFailed { key: String, message: String },

    #[error("Internal cache error: {0}")]
    Internal(String),
}
