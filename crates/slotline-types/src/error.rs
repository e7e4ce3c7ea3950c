//! Library-level errors.
//!
//! Job failures are never wrapped: the stream hands the caller's own error
//! type back untouched. The errors here cover misconfiguration only.

use thiserror::Error;

/// Result type for configuration parsing.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("invalid max concurrency {0:?}: expected a positive integer or \"unbounded\"")]
    InvalidConcurrency(String),
    #[error("invalid value for {key}: {source}")]
    Env {
        key: String,
        #[source]
        source: Box<ConfigError>,
    },
}
