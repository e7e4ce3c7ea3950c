//! What a finished job hands back to its stream.

use std::any::Any;

use crate::job::JobId;

/// Terminal result of one job that actually ran to the end of its body.
///
/// Cancelled jobs produce no outcome at all.
pub enum Outcome<T, E> {
    /// The job produced a value.
    Completed(T),
    /// The job returned an error.
    Failed(E),
    /// The job panicked; the payload is re-raised on the consumer.
    Panicked(Box<dyn Any + Send + 'static>),
}

impl<T, E> Outcome<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Completed(value),
            Err(err) => Outcome::Failed(err),
        }
    }
}

impl<T: std::fmt::Debug, E: std::fmt::Debug> std::fmt::Debug for Outcome<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed(v) => f.debug_tuple("Completed").field(v).finish(),
            Outcome::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            Outcome::Panicked(_) => f.write_str("Panicked(..)"),
        }
    }
}

/// An outcome tagged with the position of the job that produced it.
#[derive(Debug)]
pub struct Envelope<T, E> {
    pub id: JobId,
    pub outcome: Outcome<T, E>,
}

impl<T, E> Envelope<T, E> {
    pub fn new(id: JobId, outcome: Outcome<T, E>) -> Self {
        Self { id, outcome }
    }
}
