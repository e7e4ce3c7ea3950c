//! Job identification and lifecycle types.

/// Identity of a job: its 0-based position in the input ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub usize);

impl JobId {
    /// Position of the job in its input collection.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for JobId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Lifecycle state of a job inside a stream.
///
/// ```text
/// Pending ──admit──▶ Running ──▶ Completed | Failed | Cancelled
/// Pending ──cancel─────────────▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    /// Queued, not yet admitted.
    #[default]
    Pending,
    /// Admitted and executing.
    Running,
    /// Produced a value.
    Completed,
    /// Produced an error (or panicked).
    Failed,
    /// Stopped by the cancellation signal; never delivers a value.
    Cancelled,
}

impl JobStatus {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}
