//! Task streams: the public iteration surface over a slot pool.
//!
//! [`TryTaskStream`] is the fail-fast variant: the first failing job cancels
//! every job that has not delivered yet, and the consumer sees exactly that
//! one error. [`TaskStream`] wraps it for jobs that cannot fail.
//!
//! Both are lazy: nothing starts until the first poll. Values arrive in
//! completion order; use [`indexed`](TryTaskStream::indexed) to learn each
//! value's input position, or the collector to restore input order.
//!
//! Dropping a stream before it finishes cancels its outstanding jobs.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{ready, Context, Poll};

use futures::future::BoxFuture;
use futures::stream::FusedStream;
use futures::{FutureExt, Stream};
use slotline_types::{JobId, JobStatus, MaxConcurrency, Outcome, PoolSnapshot, StreamConfig};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::job::{boxed_infallible, boxed_try, BoxedJob, Job};
use super::result_channel::{result_channel, ResultReceiver, ResultSender};
use super::slot_pool::SlotPool;

/// Everything guarded by the stream's pool lock.
struct PoolState<T, E> {
    slots: SlotPool<BoxedJob<T, E>>,
    /// Admitted (already Running) jobs whose closures have not been invoked
    /// yet, in admission order.
    admitted: VecDeque<(JobId, BoxedJob<T, E>)>,
    /// Dropped once the pool settles, closing the channel.
    results: Option<ResultSender<T, E>>,
}

/// Shared between the consumer and every job task.
///
/// Job bodies never see this; only the task wrapper around them does.
struct Scheduler<T, E> {
    state: Mutex<PoolState<T, E>>,
    /// Held while job closures are invoked, never together with `state` held
    /// first. Serializes launches so closures run in admission order.
    launching: Mutex<()>,
    cancel: CancellationToken,
    settled: Notify,
}

impl<T, E> Scheduler<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn lock(&self) -> MutexGuard<'_, PoolState<T, E>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fill the initial window.
    fn start(self: &Arc<Self>) {
        {
            let mut state = self.lock();
            debug!(
                jobs = state.slots.len(),
                capacity = %state.slots.capacity(),
                "starting task stream"
            );
            self.admit(&mut state);
        }
        self.launch();
    }

    /// Admit until the pool is saturated (or drain it if cancelled), then
    /// close the result channel if nothing is left in flight.
    ///
    /// Admitted jobs are only queued here; [`launch`](Self::launch) invokes
    /// them once the pool lock is released.
    fn admit(&self, state: &mut PoolState<T, E>) {
        while let Some((id, job)) = state.slots.admit_next(self.cancel.is_cancelled()) {
            trace!(
                job = %id,
                running = state.slots.running(),
                pending = state.slots.pending(),
                "admitted job"
            );
            state.admitted.push_back((id, job));
        }

        if state.slots.is_settled() && state.results.take().is_some() {
            trace!("task stream settled");
            self.settled.notify_waiters();
        }
    }

    /// Invoke admitted job closures in admission order and spawn their
    /// futures. Must be called without the pool lock held.
    fn launch(self: &Arc<Self>) {
        let mut unstarted = Vec::new();
        {
            let _launching = self.launching.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                let next = self.lock().admitted.pop_front();
                let Some((id, job)) = next else {
                    break;
                };
                if self.cancel.is_cancelled() {
                    unstarted.push((id, None));
                    continue;
                }
                match std::panic::catch_unwind(AssertUnwindSafe(job)) {
                    Ok(future) => self.spawn(id, future),
                    Err(payload) => {
                        warn!(job = %id, "job panicked while starting");
                        unstarted.push((id, Some(Outcome::Panicked(payload))));
                    }
                }
            }
        }

        for (id, outcome) in unstarted {
            self.finish(id, outcome);
        }
    }

    fn spawn(self: &Arc<Self>, id: JobId, future: BoxFuture<'static, Result<T, E>>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = scheduler.cancel.cancelled() => None,
                result = AssertUnwindSafe(future).catch_unwind() => Some(match result {
                    Ok(result) => Outcome::from(result),
                    Err(payload) => Outcome::Panicked(payload),
                }),
            };
            scheduler.finish(id, outcome);
        });
    }

    /// A running job reached a terminal state: deliver, release, admit next.
    ///
    /// Delivery, release and admission share one critical section, so
    /// `running` never exceeds capacity and the first failure is the only one
    /// ever sent.
    fn finish(self: &Arc<Self>, id: JobId, outcome: Option<Outcome<T, E>>) {
        {
            let mut state = self.lock();

            let status = match outcome {
                None => {
                    trace!(job = %id, "job cancelled while running");
                    JobStatus::Cancelled
                }
                Some(_) if self.cancel.is_cancelled() => {
                    debug!(job = %id, "discarding outcome that arrived after cancellation");
                    JobStatus::Cancelled
                }
                Some(Outcome::Completed(value)) => {
                    trace!(job = %id, "job completed");
                    if let Some(results) = &state.results {
                        results.send(id, Outcome::Completed(value));
                    }
                    JobStatus::Completed
                }
                Some(failure) => {
                    if matches!(failure, Outcome::Panicked(_)) {
                        warn!(job = %id, "job panicked, cancelling outstanding jobs");
                    } else {
                        debug!(job = %id, "job failed, cancelling outstanding jobs");
                    }
                    self.cancel.cancel();
                    if let Some(results) = &state.results {
                        results.send(id, failure);
                    }
                    JobStatus::Failed
                }
            };

            state.slots.release(id, status);
            self.admit(&mut state);
        }
        self.launch();
    }

    fn snapshot(&self) -> PoolSnapshot {
        self.lock().slots.snapshot()
    }

    fn is_settled(&self) -> bool {
        self.lock().slots.is_settled()
    }
}

/// Fail-fast stream of job results in completion order.
///
/// Yields every value that arrived before the first failure, then that one
/// error, then ends. Failures from other jobs after that point are dropped.
#[must_use = "streams do nothing unless polled"]
pub struct TryTaskStream<T, E> {
    scheduler: Arc<Scheduler<T, E>>,
    results: ResultReceiver<T, E>,
    len: usize,
    started: bool,
    finished: bool,
}

impl<T, E> TryTaskStream<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(
        jobs: impl IntoIterator<Item = BoxedJob<T, E>>,
        max: MaxConcurrency,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = result_channel();
        let slots = SlotPool::new(jobs, max);
        let len = slots.len();

        let scheduler = Scheduler {
            state: Mutex::new(PoolState {
                slots,
                admitted: VecDeque::new(),
                results: Some(sender),
            }),
            launching: Mutex::new(()),
            cancel,
            settled: Notify::new(),
        };

        Self {
            scheduler: Arc::new(scheduler),
            results: receiver,
            len,
            started: false,
            finished: false,
        }
    }

    /// Number of jobs this stream was built from.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot pool counters and per-job statuses.
    pub fn snapshot(&self) -> PoolSnapshot {
        self.scheduler.snapshot()
    }

    /// A handle to this stream's cancellation signal.
    ///
    /// Cancelling it stops running jobs at their next suspension point and
    /// keeps pending ones from starting. Values that already arrived are
    /// still yielded; the stream then ends without an error.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.scheduler.cancel.clone()
    }

    /// Cancel every job that has not delivered yet.
    pub fn cancel(&self) {
        self.scheduler.cancel.cancel();
    }

    /// Wait until no job is Pending or Running.
    ///
    /// Returns immediately if the stream has never been polled.
    pub async fn wait_settled(&self) {
        if !self.started {
            return;
        }
        loop {
            let notified = self.scheduler.settled.notified();
            if self.scheduler.is_settled() {
                return;
            }
            notified.await;
        }
    }

    /// Yield `(position, value)` pairs instead of bare values.
    pub fn indexed(self) -> IndexedTryTaskStream<T, E> {
        IndexedTryTaskStream { inner: self }
    }

    fn poll_envelope(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<(JobId, T), E>>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if !self.started {
            self.started = true;
            self.scheduler.start();
        }

        let Some(envelope) = ready!(self.results.poll_recv(cx)) else {
            self.finished = true;
            return Poll::Ready(None);
        };

        match envelope.outcome {
            Outcome::Completed(value) => Poll::Ready(Some(Ok((envelope.id, value)))),
            Outcome::Failed(err) => {
                self.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Outcome::Panicked(payload) => {
                self.finished = true;
                std::panic::resume_unwind(payload)
            }
        }
    }
}

impl<T, E> Stream for TryTaskStream<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .poll_envelope(cx)
            .map(|item| item.map(|result| result.map(|(_, value)| value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            (0, Some(self.len))
        }
    }
}

impl<T, E> FusedStream for TryTaskStream<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<T, E> Drop for TryTaskStream<T, E> {
    fn drop(&mut self) {
        self.scheduler.cancel.cancel();
    }
}

impl<T, E> std::fmt::Debug for TryTaskStream<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryTaskStream")
            .field("len", &self.len)
            .field("started", &self.started)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// [`TryTaskStream`] yielding `(JobId, value)` pairs.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct IndexedTryTaskStream<T, E> {
    inner: TryTaskStream<T, E>,
}

impl<T, E> IndexedTryTaskStream<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.inner.snapshot()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation_token()
    }

    pub async fn wait_settled(&self) {
        self.inner.wait_settled().await
    }
}

impl<T, E> Stream for IndexedTryTaskStream<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    type Item = Result<(JobId, T), E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_envelope(cx)
    }
}

/// Stream of results from jobs that cannot fail, in completion order.
///
/// Ends after exactly one value per job. A panicking job is re-raised on the
/// consumer.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct TaskStream<T> {
    inner: TryTaskStream<T, Infallible>,
}

impl<T: Send + 'static> TaskStream<T> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.inner.snapshot()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation_token()
    }

    pub async fn wait_settled(&self) {
        self.inner.wait_settled().await
    }

    /// Yield `(position, value)` pairs instead of bare values.
    pub fn indexed(self) -> IndexedTaskStream<T> {
        IndexedTaskStream { inner: self.inner }
    }
}

impl<T: Send + 'static> Stream for TaskStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .inner
            .poll_envelope(cx)
            .map(|item| item.map(|result| match result {
                Ok((_, value)) => value,
                Err(never) => match never {},
            }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Send + 'static> FusedStream for TaskStream<T> {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

/// [`TaskStream`] yielding `(JobId, value)` pairs.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct IndexedTaskStream<T> {
    inner: TryTaskStream<T, Infallible>,
}

impl<T: Send + 'static> IndexedTaskStream<T> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.inner.snapshot()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation_token()
    }

    pub async fn wait_settled(&self) {
        self.inner.wait_settled().await
    }
}

impl<T: Send + 'static> Stream for IndexedTaskStream<T> {
    type Item = (JobId, T);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .inner
            .poll_envelope(cx)
            .map(|item| item.map(|result| match result {
                Ok(pair) => pair,
                Err(never) => match never {},
            }))
    }
}

/// Run infallible jobs with at most `max` in flight, yielding values as they
/// complete.
pub fn stream<I>(jobs: I, max: impl Into<MaxConcurrency>) -> TaskStream<<I::Item as Job>::Output>
where
    I: IntoIterator,
    I::Item: Job,
{
    let jobs = jobs.into_iter().map(boxed_infallible);
    TaskStream {
        inner: TryTaskStream::new(jobs, max.into(), CancellationToken::new()),
    }
}

/// Run fallible jobs with at most `max` in flight; the first error cancels
/// the rest and ends the stream.
pub fn try_stream<I, T, E>(jobs: I, max: impl Into<MaxConcurrency>) -> TryTaskStream<T, E>
where
    I: IntoIterator,
    I::Item: Job<Output = Result<T, E>>,
    T: Send + 'static,
    E: Send + 'static,
{
    let jobs = jobs.into_iter().map(boxed_try);
    TryTaskStream::new(jobs, max.into(), CancellationToken::new())
}

/// [`stream`] bounded by `config.max_concurrency`.
pub fn stream_with<I>(jobs: I, config: &StreamConfig) -> TaskStream<<I::Item as Job>::Output>
where
    I: IntoIterator,
    I::Item: Job,
{
    stream(jobs, config.max_concurrency)
}

/// [`try_stream`] bounded by `config.max_concurrency`.
pub fn try_stream_with<I, T, E>(jobs: I, config: &StreamConfig) -> TryTaskStream<T, E>
where
    I: IntoIterator,
    I::Item: Job<Output = Result<T, E>>,
    T: Send + 'static,
    E: Send + 'static,
{
    try_stream(jobs, config.max_concurrency)
}
