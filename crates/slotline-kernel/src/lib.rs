//! slotline-kernel: bounded-concurrency task streams.
//!
//! This crate provides:
//!
//! - **Scheduler**: the slot pool, admission queue and result channel that run
//!   at most N jobs at once and deliver results in completion order
//! - **Streams**: [`TaskStream`] (infallible jobs) and [`TryTaskStream`]
//!   (fail-fast: first error cancels everything still outstanding)
//! - **Collector**: [`await_all`] / [`try_await_all`], which restore input order
//! - **Flatten**: [`flatten_stream`], two independently bounded levels of jobs
//! - **Parallel adapters**: map/filter/flat-map/for-each over iterators
//! - **Config**: loading [`StreamConfig`] from TOML files and the environment

pub mod config;
pub mod parallel;
pub mod scheduler;

pub use parallel::ParallelExt;
pub use scheduler::{
    await_all, flatten_stream, flatten_stream_with, stream, stream_with, try_await_all,
    try_stream, try_stream_with, FlattenStream, IndexedTaskStream, IndexedTryTaskStream, Job,
    OrderedBuffer, TaskStream, TryTaskStream,
};

// Data types (for embedders that don't want a direct slotline-types dependency)
pub use slotline_types::{
    ConfigError, JobId, JobStatus, MaxConcurrency, Outcome, PoolSnapshot, StreamConfig,
};

// Cancellation primitive shared by every stream
pub use tokio_util::sync::CancellationToken;
