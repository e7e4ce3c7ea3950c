//! Scheduler module for slotline: admission control and result delivery.
//!
//! This module provides:
//! - **Slot pool + admission queue**: run at most N jobs, admit the next queued
//!   job in input order whenever a running one finishes.
//! - **Result channel**: unbounded completion-order conduit from job tasks to
//!   the consumer.
//! - **Task streams**: lazy `Stream`s over the results, plus a fail-fast variant.
//! - **Collector**: reassembles results into input order.
//! - **Flatten**: two levels of independently bounded jobs, one output stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TryTaskStream                         │
//! │                                                             │
//! │  Mutex<PoolState>                                           │
//! │  ┌───────────────────────────┐   admit    ┌──────────────┐  │
//! │  │ queue: [j5, j6, j7, ...]  │──────────▶ │ tokio::spawn │  │
//! │  │ running: 0..=N            │            │  select!     │  │
//! │  │ statuses: [..]            │◀── finish ─│  job | cancel│  │
//! │  └───────────────────────────┘            └──────┬───────┘  │
//! │                                                  │          │
//! │                     ResultChannel (unbounded) ◀──┘          │
//! │                              │                              │
//! │                              ▼                              │
//! │                      poll_next (consumer)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Admission is push-driven: a finishing job releases its slot and admits the
//! next one in the same critical section, whatever the consumer is doing.
//! Admitted closures are then invoked in admission order after the pool lock
//! is released, so user code never runs while pool state is locked.

mod collector;
mod flatten;
mod job;
mod result_channel;
mod slot_pool;
mod task_stream;

pub use collector::{await_all, try_await_all, OrderedBuffer};
pub use flatten::{flatten_stream, flatten_stream_with, FlattenStream};
pub use job::Job;
pub use task_stream::{
    stream, stream_with, try_stream, try_stream_with, IndexedTaskStream, IndexedTryTaskStream,
    TaskStream, TryTaskStream,
};
