//! Loading [`StreamConfig`] from TOML files and the process environment.
//!
//! ```toml
//! # slotline.toml
//! max_concurrency = 8            # or "unbounded"
//! inner_concurrency = 2
//! ```
//!
//! `SLOTLINE_MAX_CONCURRENCY` and `SLOTLINE_INNER_CONCURRENCY` override
//! whatever the file says.

use std::path::Path;

use anyhow::{Context, Result};
use slotline_types::StreamConfig;

/// Load configuration from a specific path, without environment overrides.
pub fn load_from(path: &Path) -> Result<StreamConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    parse(&content).with_context(|| format!("Failed to parse config from {}", path.display()))
}

/// Parse configuration from TOML text.
pub fn parse(content: &str) -> Result<StreamConfig> {
    Ok(toml::from_str(content)?)
}

/// Defaults with environment overrides applied.
pub fn from_env() -> Result<StreamConfig> {
    let mut config = StreamConfig::default();
    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Load from `path` if given and present, then apply environment overrides.
///
/// A missing file is not an error; defaults are used instead.
pub fn load(path: Option<&Path>) -> Result<StreamConfig> {
    let mut config = match path {
        Some(path) if path.exists() => load_from(path)?,
        Some(path) => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            StreamConfig::default()
        }
        None => StreamConfig::default(),
    };

    config
        .apply_overrides(|key| std::env::var(key).ok())
        .context("Invalid concurrency override in environment")?;
    Ok(config)
}
