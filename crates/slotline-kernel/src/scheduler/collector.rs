//! Order-preserving collector.
//!
//! Results arrive in completion order; the collector writes each one straight
//! into its input position in a preallocated buffer, so the final `Vec` is in
//! input order with no sort or reorder pass.

use futures::StreamExt;
use slotline_types::{JobId, MaxConcurrency};

use super::job::Job;
use super::task_stream::{stream, try_stream};

/// Fixed-size, write-once-per-slot buffer indexed by job position.
///
/// Not shared: only the collecting task touches it.
#[derive(Debug)]
pub struct OrderedBuffer<T> {
    slots: Vec<Option<T>>,
    filled: usize,
}

impl<T> OrderedBuffer<T> {
    /// A buffer with `len` empty slots.
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots, filled: 0 }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots written so far.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Write the value for `id`.
    ///
    /// # Panics
    ///
    /// If `id` is out of range or its slot was already written; each job
    /// delivers at most once, so either means a scheduler bug.
    pub fn fill(&mut self, id: JobId, value: T) {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("job {id} out of range for buffer of {len}"));
        assert!(slot.is_none(), "slot {id} written twice");
        *slot = Some(value);
        self.filled += 1;
    }

    /// The values in input order.
    ///
    /// # Panics
    ///
    /// If any slot is still empty.
    pub fn into_vec(self) -> Vec<T> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| panic!("slot {i} was never filled")))
            .collect()
    }
}

/// Run infallible jobs with at most `max` in flight and return their values
/// in input order.
pub async fn await_all<I>(jobs: I, max: impl Into<MaxConcurrency>) -> Vec<<I::Item as Job>::Output>
where
    I: IntoIterator,
    I::Item: Job,
{
    let mut results = stream(jobs, max).indexed();
    let mut buffer = OrderedBuffer::new(results.len());

    while let Some((id, value)) = results.next().await {
        buffer.fill(id, value);
    }

    buffer.into_vec()
}

/// Run fallible jobs with at most `max` in flight and return their values in
/// input order, or the first error (after cancelling everything else).
pub async fn try_await_all<I, T, E>(jobs: I, max: impl Into<MaxConcurrency>) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    I::Item: Job<Output = Result<T, E>>,
    T: Send + 'static,
    E: Send + 'static,
{
    let mut results = try_stream(jobs, max).indexed();
    let mut buffer = OrderedBuffer::new(results.len());

    while let Some(result) = results.next().await {
        let (id, value) = result?;
        buffer.fill(id, value);
    }

    Ok(buffer.into_vec())
}
