//! Concurrency bounds for streams.

use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConfigError, ConfigResult};

/// Upper bound on simultaneously running jobs.
///
/// Defaults to [`MaxConcurrency::Unbounded`], which starts every job at the
/// first pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaxConcurrency {
    /// At most this many jobs run at once.
    Limited(NonZeroUsize),
    /// Every job starts immediately.
    #[default]
    Unbounded,
}

impl MaxConcurrency {
    /// Create a bound of exactly `n` jobs; zero is rejected.
    pub fn new(n: usize) -> ConfigResult<Self> {
        NonZeroUsize::new(n)
            .map(MaxConcurrency::Limited)
            .ok_or(ConfigError::ZeroConcurrency)
    }

    /// The numeric limit, or `None` when unbounded.
    pub fn get(self) -> Option<usize> {
        match self {
            MaxConcurrency::Limited(n) => Some(n.get()),
            MaxConcurrency::Unbounded => None,
        }
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, MaxConcurrency::Unbounded)
    }

    /// Whether one more job may start while `running` are in flight.
    pub fn admits(self, running: usize) -> bool {
        match self {
            MaxConcurrency::Limited(n) => running < n.get(),
            MaxConcurrency::Unbounded => true,
        }
    }

    /// Size of the initial window for `count` jobs: `min(limit, count)`.
    pub fn window(self, count: usize) -> usize {
        match self {
            MaxConcurrency::Limited(n) => n.get().min(count),
            MaxConcurrency::Unbounded => count,
        }
    }
}

impl From<NonZeroUsize> for MaxConcurrency {
    fn from(n: NonZeroUsize) -> Self {
        MaxConcurrency::Limited(n)
    }
}

/// Lenient conversion: a limit of zero is raised to one.
///
/// Use [`MaxConcurrency::new`] to reject zero instead.
impl From<usize> for MaxConcurrency {
    fn from(n: usize) -> Self {
        MaxConcurrency::Limited(NonZeroUsize::new(n.max(1)).unwrap_or(NonZeroUsize::MIN))
    }
}

impl From<Option<usize>> for MaxConcurrency {
    fn from(n: Option<usize>) -> Self {
        n.map(MaxConcurrency::from).unwrap_or_default()
    }
}

impl FromStr for MaxConcurrency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "unbounded" | "unlimited" | "*" => Ok(MaxConcurrency::Unbounded),
            other => {
                let n: usize = other
                    .parse()
                    .map_err(|_| ConfigError::InvalidConcurrency(trimmed.to_string()))?;
                MaxConcurrency::new(n)
            }
        }
    }
}

impl std::fmt::Display for MaxConcurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxConcurrency::Limited(n) => write!(f, "{}", n),
            MaxConcurrency::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl Serialize for MaxConcurrency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxConcurrency::Limited(n) => serializer.serialize_u64(n.get() as u64),
            MaxConcurrency::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxConcurrency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u64),
            Str(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Int(n) => {
                let n = usize::try_from(n).map_err(serde::de::Error::custom)?;
                MaxConcurrency::new(n).map_err(serde::de::Error::custom)
            }
            Repr::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
