//! Parallel map/filter/flat-map/for-each over plain iterators.
//!
//! Thin adapters: each one turns items into jobs and hands them to
//! [`await_all`] or [`try_await_all`], so outputs come back in input order and
//! the fallible variants stop at the first error.
//!
//! ```
//! use slotline_kernel::ParallelExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let doubled = vec![1, 2, 3].par_map(2, |n| async move { n * 2 }).await;
//! assert_eq!(doubled, vec![2, 4, 6]);
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use slotline_types::MaxConcurrency;

use crate::scheduler::{await_all, try_await_all};

/// Bounded-concurrency combinators for anything iterable.
pub trait ParallelExt: IntoIterator + Sized
where
    Self::Item: Send + 'static,
{
    /// Apply `f` to every item, at most `max` at a time.
    fn par_map<F, Fut, U>(self, max: impl Into<MaxConcurrency>, f: F) -> impl Future<Output = Vec<U>> + Send
    where
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = U> + Send + 'static,
        U: Send + 'static,
    {
        let jobs = jobs_for(self, f);
        await_all(jobs, max.into())
    }

    /// Fallible [`par_map`](ParallelExt::par_map): the first error cancels
    /// the remaining work and is returned.
    fn try_par_map<F, Fut, U, E>(
        self,
        max: impl Into<MaxConcurrency>,
        f: F,
    ) -> impl Future<Output = Result<Vec<U>, E>> + Send
    where
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
        U: Send + 'static,
        E: Send + 'static,
    {
        let jobs = jobs_for(self, f);
        try_await_all(jobs, max.into())
    }

    /// Keep the items for which `predicate` resolves to `true`.
    fn par_filter<F, Fut>(self, max: impl Into<MaxConcurrency>, predicate: F) -> impl Future<Output = Vec<Self::Item>> + Send
    where
        Self::Item: Clone,
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let predicate = Arc::new(predicate);
        let jobs: Vec<_> = self
            .into_iter()
            .map(|item| {
                let predicate = Arc::clone(&predicate);
                move || async move {
                    let keep = predicate(item.clone()).await;
                    keep.then_some(item)
                }
            })
            .collect();
        await_all(jobs, max.into()).map(|kept| kept.into_iter().flatten().collect::<Vec<_>>())
    }

    /// Map every item to a collection and concatenate the results in input
    /// order.
    fn par_flat_map<F, Fut, C>(
        self,
        max: impl Into<MaxConcurrency>,
        f: F,
    ) -> impl Future<Output = Vec<C::Item>> + Send
    where
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = C> + Send + 'static,
        C: IntoIterator + Send + 'static,
        C::Item: Send,
    {
        let jobs = jobs_for(self, f);
        await_all(jobs, max.into()).map(|chunks| chunks.into_iter().flatten().collect::<Vec<_>>())
    }

    /// Run `f` for every item, at most `max` at a time.
    fn par_for_each<F, Fut>(self, max: impl Into<MaxConcurrency>, f: F) -> impl Future<Output = ()> + Send
    where
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let jobs = jobs_for(self, f);
        await_all(jobs, max.into()).map(drop)
    }

    /// Fallible [`par_for_each`](ParallelExt::par_for_each).
    fn try_par_for_each<F, Fut, E>(
        self,
        max: impl Into<MaxConcurrency>,
        f: F,
    ) -> impl Future<Output = Result<(), E>> + Send
    where
        F: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let jobs = jobs_for(self, f);
        try_await_all(jobs, max.into()).map(|result| result.map(drop))
    }
}

impl<I> ParallelExt for I
where
    I: IntoIterator,
    I::Item: Send + 'static,
{
}

/// A job built from one item.
type ItemJob<Fut> = Box<dyn FnOnce() -> Fut + Send>;

/// One job per item, all sharing `f`.
fn jobs_for<I, F, Fut>(items: I, f: F) -> Vec<ItemJob<Fut>>
where
    I: IntoIterator,
    I::Item: Send + 'static,
    F: Fn(I::Item) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
{
    let f = Arc::new(f);
    items
        .into_iter()
        .map(|item| -> ItemJob<Fut> {
            let f = Arc::clone(&f);
            Box::new(move || f(item))
        })
        .collect()
}
