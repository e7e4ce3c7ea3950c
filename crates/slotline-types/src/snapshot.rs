//! Point-in-time view of a stream's slot pool.

use crate::concurrency::MaxConcurrency;
use crate::job::{JobId, JobStatus};

/// Copy of the slot pool's counters and per-job status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Configured bound.
    pub capacity: MaxConcurrency,
    /// Jobs currently executing.
    pub running: usize,
    /// Highest `running` value ever observed.
    pub peak_running: usize,
    /// Jobs still waiting in the admission queue.
    pub pending: usize,
    /// Status of every job, indexed by position.
    pub statuses: Vec<JobStatus>,
}

impl PoolSnapshot {
    /// Status of one job, if the position is in range.
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.statuses.get(id.index()).copied()
    }

    /// Positions of every job currently in `status`.
    pub fn with_status(&self, status: JobStatus) -> Vec<JobId> {
        self.statuses
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == status)
            .map(|(i, _)| JobId(i))
            .collect()
    }

    /// Number of jobs currently in `status`.
    pub fn count(&self, status: JobStatus) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }

    /// True once no job is Pending or Running.
    pub fn is_settled(&self) -> bool {
        self.statuses.iter().all(|s| s.is_terminal())
    }
}
