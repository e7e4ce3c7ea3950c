//! Two-level fan-out: outer jobs yield collections of inner jobs.
//!
//! ```text
//!   outer jobs ──TryTaskStream(outer_max)──▶ [inner jobs] ─┐
//!                                            [inner jobs] ─┼─▶ TryTaskStream(inner_max) each
//!                                            [inner jobs] ─┘          │
//!                                                                     ▼
//!                                                    SelectAll ──▶ one output stream
//! ```
//!
//! The two bounds are independent: at most `outer_max` outer jobs run at once,
//! and each inner collection runs with at most `inner_max` of its own jobs.
//! Every level's cancellation token is a child of the flatten stream's token,
//! so the first error anywhere stops everything.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{FusedStream, SelectAll};
use futures::{FutureExt, Stream, StreamExt};
use slotline_types::{MaxConcurrency, StreamConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::job::{boxed_try, BoxedJob, Job};
use super::task_stream::TryTaskStream;

type InnerJobs<V, E> = Vec<BoxedJob<V, E>>;

/// Merged output of every inner job across every outer job.
#[must_use = "streams do nothing unless polled"]
pub struct FlattenStream<V, E> {
    /// `None` once every outer job has delivered.
    outer: Option<TryTaskStream<InnerJobs<V, E>, E>>,
    inner: SelectAll<TryTaskStream<V, E>>,
    inner_max: MaxConcurrency,
    cancel: CancellationToken,
    finished: bool,
}

impl<V, E> FlattenStream<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    /// Number of inner streams currently active.
    pub fn active_inner(&self) -> usize {
        self.inner.len()
    }

    /// Cancel every outer and inner job that has not delivered yet.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn fail(&mut self, err: E) -> Poll<Option<Result<V, E>>> {
        debug!("flatten stream failed, cancelling both levels");
        self.cancel.cancel();
        self.finished = true;
        self.outer = None;
        self.inner = SelectAll::new();
        Poll::Ready(Some(Err(err)))
    }
}

impl<V, E> Stream for FlattenStream<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    type Item = Result<V, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        // Start an inner stream for every outer result that is ready.
        while let Some(outer) = this.outer.as_mut() {
            match outer.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(jobs))) => {
                    trace!(inner_jobs = jobs.len(), "outer job delivered");
                    let inner = TryTaskStream::new(jobs, this.inner_max, this.cancel.child_token());
                    this.inner.push(inner);
                }
                Poll::Ready(Some(Err(err))) => return this.fail(err),
                Poll::Ready(None) => {
                    trace!("all outer jobs delivered");
                    this.outer = None;
                }
                Poll::Pending => break,
            }
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(value))) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(Some(Err(err))) => this.fail(err),
            Poll::Ready(None) if this.outer.is_none() => {
                this.finished = true;
                Poll::Ready(None)
            }
            // No inner stream active yet; the outer stream holds our waker.
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }
}

impl<V, E> FusedStream for FlattenStream<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<V, E> Drop for FlattenStream<V, E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<V, E> std::fmt::Debug for FlattenStream<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlattenStream")
            .field("outer_done", &self.outer.is_none())
            .field("active_inner", &self.inner.len())
            .field("inner_max", &self.inner_max)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Run `jobs` (each resolving to a collection of inner jobs) with at most
/// `outer_max` in flight, run each collection with at most `inner_max` in
/// flight, and merge every inner result into one stream.
pub fn flatten_stream<I, C, V, E>(
    jobs: I,
    outer_max: impl Into<MaxConcurrency>,
    inner_max: impl Into<MaxConcurrency>,
) -> FlattenStream<V, E>
where
    I: IntoIterator,
    I::Item: Job<Output = Result<C, E>>,
    C: IntoIterator + 'static,
    C::Item: Job<Output = Result<V, E>>,
    V: Send + 'static,
    E: Send + 'static,
{
    let cancel = CancellationToken::new();
    let outer_jobs = jobs.into_iter().map(|job| -> BoxedJob<InnerJobs<V, E>, E> {
        Box::new(move || -> BoxFuture<'static, Result<InnerJobs<V, E>, E>> {
            job.start()
                .map(|result| result.map(|inner| inner.into_iter().map(boxed_try).collect()))
                .boxed()
        })
    });

    FlattenStream {
        outer: Some(TryTaskStream::new(outer_jobs, outer_max.into(), cancel.child_token())),
        inner: SelectAll::new(),
        inner_max: inner_max.into(),
        cancel,
        finished: false,
    }
}

/// [`flatten_stream`] bounded by `config.max_concurrency` (outer) and
/// `config.inner_concurrency` (inner).
pub fn flatten_stream_with<I, C, V, E>(jobs: I, config: &StreamConfig) -> FlattenStream<V, E>
where
    I: IntoIterator,
    I::Item: Job<Output = Result<C, E>>,
    C: IntoIterator + 'static,
    C::Item: Job<Output = Result<V, E>>,
    V: Send + 'static,
    E: Send + 'static,
{
    flatten_stream(jobs, config.max_concurrency, config.inner_concurrency)
}
