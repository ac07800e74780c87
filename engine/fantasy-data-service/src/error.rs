//! Error types for the Fantasy Data Service

use cache_layer::CacheError;
use thiserror::Error;

/// Result type for Fantasy Data Service operations
pub type FantasyResult<T> = std::result::Result<T, FantasyError>;

/// Errors that can occur while aggregating provider data
#[derive(Error, Debug)]
pub enum FantasyError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Upstream {source_id} failed: {message}")]
    Upstream { source_id: String, message: String },

    #[error("Missing credential: {0}")]
    Auth(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// The four categories callers at the HTTP boundary distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Upstream,
    Auth,
    Internal,
}

impl FantasyError {
    pub fn upstream(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        FantasyError::Upstream { source_id: source_id.into(), message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FantasyError::Validation(_) => ErrorKind::Validation,
            FantasyError::Auth(_) => ErrorKind::Auth,
            FantasyError::Upstream { .. } | FantasyError::Http(_) | FantasyError::Table(_) => {
                ErrorKind::Upstream
            }
            // A waiter inherits the leader's failure, which came from a provider.
            FantasyError::Cache(CacheError::ProducerFailed { .. }) => ErrorKind::Upstream,
            FantasyError::Cache(_)
            | FantasyError::Serialization(_)
            | FantasyError::Io(_)
            | FantasyError::Config(_)
            | FantasyError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status for the response envelope.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Auth => 401,
            ErrorKind::Upstream => 502,
            ErrorKind::Internal => 500,
        }
    }
}

impl From<String> for FantasyError {
    fn from(err: String) -> Self {
        FantasyError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FantasyError::Validation("week".into()).status_code(), 400);
        assert_eq!(FantasyError::Auth("x-api-key".into()).status_code(), 401);
        assert_eq!(FantasyError::upstream("fantasypros", "status 503").status_code(), 502);
        assert_eq!(FantasyError::Internal("oops".into()).status_code(), 500);
    }

    #[test]
    fn test_shared_producer_failure_is_upstream() {
        let err = FantasyError::from(CacheError::ProducerFailed {
            key: "ranks".into(),
            message: "status 500".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Upstream);

        let err = FantasyError::from(CacheError::Internal("poisoned".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
