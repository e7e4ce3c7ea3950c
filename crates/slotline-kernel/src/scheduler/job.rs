//! The unit of work a stream schedules.

use std::convert::Infallible;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

/// A deferred unit of asynchronous work, started at most once.
///
/// Any `FnOnce() -> impl Future` closure is a job. The closure runs right
/// after admission, in admission order, and should only build its future;
/// the future is then driven on its own tokio task. A panic in the closure is
/// treated like a panic in the job.
///
/// ```
/// use slotline_kernel::Job;
///
/// fn assert_job<J: Job>(_: J) {}
/// assert_job(|| async { 42 });
/// ```
pub trait Job: Send + 'static {
    /// What the job produces.
    type Output: Send + 'static;

    /// Begin the job, returning the future that drives it.
    fn start(self) -> BoxFuture<'static, Self::Output>;
}

impl<F, Fut> Job for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    type Output = Fut::Output;

    fn start(self) -> BoxFuture<'static, Self::Output> {
        self().boxed()
    }
}

/// Type-erased fallible job as stored in the admission queue.
pub(crate) type BoxedJob<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

/// Erase a fallible job.
pub(crate) fn boxed_try<J, T, E>(job: J) -> BoxedJob<T, E>
where
    J: Job<Output = Result<T, E>>,
{
    Box::new(move || job.start())
}

/// Erase an infallible job, lifting its output into `Ok`.
pub(crate) fn boxed_infallible<J>(job: J) -> BoxedJob<J::Output, Infallible>
where
    J: Job,
{
    Box::new(move || job.start().map(Ok).boxed())
}
