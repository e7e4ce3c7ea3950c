//! Pure data types for slotline: job identity, lifecycle and concurrency bounds.
//!
//! This crate is a leaf dependency with no async runtime. It exists so that
//! consumers can describe and configure streams (or inspect pool snapshots)
//! without pulling in tokio.

pub mod concurrency;
pub mod config;
pub mod error;
pub mod job;
pub mod outcome;
pub mod snapshot;

// Flat re-exports for convenience
pub use concurrency::*;
pub use config::*;
pub use error::*;
pub use job::*;
pub use outcome::*;
pub use snapshot::*;
