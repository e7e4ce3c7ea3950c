//! Stream configuration data.
//!
//! Loading from files and the process environment lives in
//! `slotline-kernel::config`; this module only holds the data and the pure
//! override logic.

use serde::{Deserialize, Serialize};

use crate::concurrency::MaxConcurrency;
use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding [`StreamConfig::max_concurrency`].
pub const ENV_MAX_CONCURRENCY: &str = "SLOTLINE_MAX_CONCURRENCY";

/// Environment variable overriding [`StreamConfig::inner_concurrency`].
pub const ENV_INNER_CONCURRENCY: &str = "SLOTLINE_INNER_CONCURRENCY";

/// Concurrency settings for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Bound on running jobs (outer jobs, for flatten streams).
    #[serde(default)]
    pub max_concurrency: MaxConcurrency,

    /// Bound on running inner jobs per outer result (flatten streams only).
    #[serde(default)]
    pub inner_concurrency: MaxConcurrency,
}

impl StreamConfig {
    /// A config with the given outer bound and an unbounded inner bound.
    pub fn new(max_concurrency: impl Into<MaxConcurrency>) -> Self {
        Self {
            max_concurrency: max_concurrency.into(),
            inner_concurrency: MaxConcurrency::Unbounded,
        }
    }

    /// Builder-style setter for the inner bound.
    pub fn with_inner(mut self, inner: impl Into<MaxConcurrency>) -> Self {
        self.inner_concurrency = inner.into();
        self
    }

    /// Apply overrides from a variable lookup (usually the process environment).
    ///
    /// Unset variables leave the current value alone.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = parse_env(ENV_MAX_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_INNER_CONCURRENCY) {
            self.inner_concurrency = parse_env(ENV_INNER_CONCURRENCY, &raw)?;
        }
        Ok(())
    }
}

fn parse_env(key: &str, raw: &str) -> ConfigResult<MaxConcurrency> {
    raw.parse().map_err(|e| ConfigError::Env {
        key: key.to_string(),
        source: Box::new(e),
    })
}
