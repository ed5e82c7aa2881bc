//! tube-harvest: YouTube search, comment collection and translation
//!
//! This crate searches videos through the YouTube Data API, collects their
//! comments in paced sequential batches, translates comment text, computes
//! analytics over the collected records and pushes summaries to a chat webhook.

pub mod analytics;
pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod history;
pub mod model;
pub mod session;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for tube-harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A batch is already running on this runner")]
    BatchInProgress,

    #[error("Batch aborted at {item}: {source}")]
    BatchAborted {
        item: String,
        source: FetchError,
        counts: batch::BatchCounts,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failure of one external call
///
/// Cloneable so a batch can keep the last failure of an item while reporting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Service error: {0}")]
    Api(String),

    #[error("Quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl FetchError {
    /// Returns true if another attempt may succeed
    ///
    /// Quota and validation failures are final; everything else is retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::QuotaExceeded(_) | Self::Validation(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<ConfigError> for FetchError {
    fn from(err: ConfigError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type alias for tube-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for single external calls
pub type FetchOutcome<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use batch::{BatchRunner, BatchSummary, FetchResult};
pub use config::Config;
pub use session::Session;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Transport("reset".into()).is_retryable());
        assert!(FetchError::Parse("eof".into()).is_retryable());
        assert!(FetchError::Api("busy".into()).is_retryable());
        assert!(FetchError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());

        assert!(!FetchError::QuotaExceeded("daily".into()).is_retryable());
        assert!(!FetchError::Validation("empty".into()).is_retryable());
    }

    #[test]
    fn test_config_error_becomes_validation_failure() {
        let err: FetchError = ConfigError::InvalidUrl("bad".into()).into();
        assert!(matches!(err, FetchError::Validation(_)));
    }
}
