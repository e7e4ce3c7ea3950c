//! Slot pool and admission queue.
//!
//! Pure bookkeeping, no I/O and no locking of its own: the owning stream
//! wraps it in a single mutex so that every admission and release is one
//! critical section.
//!
//! ```text
//!   queue (FIFO)           running (≤ capacity)
//!   [j5, j6, j7, ...] ──admit_next──▶ {j0..j4}
//!                    ◀──release────── job finished
//! ```

use std::collections::VecDeque;

use slotline_types::{JobId, JobStatus, MaxConcurrency, PoolSnapshot};

/// Tracks running jobs and the ordered backlog of pending ones.
pub(crate) struct SlotPool<J> {
    capacity: MaxConcurrency,
    running: usize,
    peak_running: usize,
    queue: VecDeque<(JobId, J)>,
    statuses: Vec<JobStatus>,
}

impl<J> SlotPool<J> {
    /// Queue every job in input order; nothing is admitted yet.
    pub(crate) fn new(jobs: impl IntoIterator<Item = J>, capacity: MaxConcurrency) -> Self {
        let queue: VecDeque<(JobId, J)> = jobs
            .into_iter()
            .enumerate()
            .map(|(i, job)| (JobId(i), job))
            .collect();
        let statuses = vec![JobStatus::Pending; queue.len()];

        Self {
            capacity,
            running: 0,
            peak_running: 0,
            queue,
            statuses,
        }
    }

    /// Total number of jobs this pool was created with.
    pub(crate) fn len(&self) -> usize {
        self.statuses.len()
    }

    pub(crate) fn capacity(&self) -> MaxConcurrency {
        self.capacity
    }

    pub(crate) fn running(&self) -> usize {
        self.running
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Nothing running and nothing left to admit.
    pub(crate) fn is_settled(&self) -> bool {
        self.running == 0 && self.queue.is_empty()
    }

    /// Pop the head of the queue if a slot is free.
    ///
    /// When `cancelled` is set, the whole queue is drained as Cancelled
    /// instead and nothing is admitted.
    pub(crate) fn admit_next(&mut self, cancelled: bool) -> Option<(JobId, J)> {
        if cancelled {
            let dropped = self.cancel_pending();
            if dropped > 0 {
                tracing::debug!(dropped, "cancelled pending jobs before admission");
            }
            return None;
        }
        if !self.capacity.admits(self.running) {
            return None;
        }

        let (id, job) = self.queue.pop_front()?;
        self.statuses[id.index()] = JobStatus::Running;
        self.running += 1;
        self.peak_running = self.peak_running.max(self.running);
        Some((id, job))
    }

    /// A running job reached a terminal state; free its slot.
    pub(crate) fn release(&mut self, id: JobId, status: JobStatus) {
        debug_assert!(status.is_terminal(), "release with non-terminal status {status}");
        debug_assert_eq!(self.statuses[id.index()], JobStatus::Running);

        self.statuses[id.index()] = status;
        self.running = self.running.saturating_sub(1);
    }

    /// Drop every queued job without starting it. Returns how many were dropped.
    pub(crate) fn cancel_pending(&mut self) -> usize {
        let drained = self.queue.len();
        for (id, _job) in self.queue.drain(..) {
            self.statuses[id.index()] = JobStatus::Cancelled;
        }
        drained
    }

    pub(crate) fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            capacity: self.capacity,
            running: self.running,
            peak_running: self.peak_running,
            pending: self.queue.len(),
            statuses: self.statuses.clone(),
        }
    }
}
