//! Integration tests for two-level fan-out.
//!
//! Tests verify:
//! - every inner value is delivered once and attributable to its outer job
//! - the outer and inner bounds hold independently and do not multiply
//! - an error at either level ends the whole stream

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, Ready};
use futures::{FutureExt, StreamExt};
use slotline_kernel::{flatten_stream, flatten_stream_with, MaxConcurrency, StreamConfig};
use slotline_testutil::{init_tracing, random_delays};

const OUTER: usize = 5;
const INNER: usize = 10;

/// Running counters for one level of fan-out, total and per outer job.
#[derive(Default)]
struct Tracker {
    running: AtomicUsize,
    peak: AtomicUsize,
    per_outer: Mutex<HashMap<usize, (usize, usize)>>,
}

impl Tracker {
    fn enter(&self, outer: usize) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let mut per_outer = self.per_outer.lock().unwrap();
        let (running, peak) = per_outer.entry(outer).or_default();
        *running += 1;
        *peak = (*peak).max(*running);
    }

    fn exit(&self, outer: usize) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        let mut per_outer = self.per_outer.lock().unwrap();
        if let Some((running, _)) = per_outer.get_mut(&outer) {
            *running -= 1;
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn peak_per_outer(&self) -> usize {
        let per_outer = self.per_outer.lock().unwrap();
        per_outer.values().map(|(_, peak)| *peak).max().unwrap_or(0)
    }
}

type InnerJob = Box<dyn FnOnce() -> BoxFuture<'static, Result<(usize, usize), String>> + Send>;
type OuterJob = Box<dyn FnOnce() -> BoxFuture<'static, Result<Vec<InnerJob>, String>> + Send>;

/// Outer job `o` yields `INNER` inner jobs, each returning `(o, i)` after a
/// seeded delay.
fn nested_jobs(tracker: Arc<Tracker>, fail_at: Option<(usize, usize)>) -> Vec<OuterJob> {
    (0..OUTER)
        .map(|o| {
            let tracker = Arc::clone(&tracker);
            Box::new(move || {
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    let inner: Vec<InnerJob> = random_delays(INNER, o as u64, 20)
                        .into_iter()
                        .enumerate()
                        .map(|(i, delay)| {
                            let tracker = Arc::clone(&tracker);
                            Box::new(move || {
                                async move {
                                    tracker.enter(o);
                                    tokio::time::sleep(delay).await;
                                    tracker.exit(o);
                                    if fail_at == Some((o, i)) {
                                        return Err(format!("inner {o}/{i} failed"));
                                    }
                                    Ok((o, i))
                                }
                                .boxed()
                            }) as InnerJob
                        })
                        .collect();
                    Ok::<_, String>(inner)
                }
                .boxed()
            }) as OuterJob
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_five_by_ten_values_attributable() {
    init_tracing();
    let tracker = Arc::new(Tracker::default());
    let mut s = flatten_stream(nested_jobs(Arc::clone(&tracker), None), 5, 1);

    let mut seen = Vec::new();
    while let Some(result) = s.next().await {
        seen.push(result.unwrap());
    }

    assert_eq!(seen.len(), OUTER * INNER);
    seen.sort();
    let expected: Vec<_> = (0..OUTER)
        .flat_map(|o| (0..INNER).map(move |i| (o, i)))
        .collect();
    assert_eq!(seen, expected);

    // One inner job per outer at a time, but the outer jobs overlap
    assert_eq!(tracker.peak_per_outer(), 1);
    assert!(tracker.peak() > 1);
    assert!(tracker.peak() <= OUTER);
}

#[tokio::test(start_paused = true)]
async fn test_inner_bound_applies_per_outer() {
    let tracker = Arc::new(Tracker::default());
    let s = flatten_stream(nested_jobs(Arc::clone(&tracker), None), 2, 3);

    let values: Vec<_> = s.collect().await;
    assert_eq!(values.len(), OUTER * INNER);
    assert!(values.iter().all(Result::is_ok));
    assert!(tracker.peak_per_outer() <= 3);
    // Outer slots free once a job returns its inner collection, so every
    // inner stream can be live at once
    assert!(tracker.peak() > 2 * 3);
    assert!(tracker.peak() <= OUTER * 3);
}

#[tokio::test(start_paused = true)]
async fn test_inner_error_ends_everything() {
    let tracker = Arc::new(Tracker::default());
    let mut s = flatten_stream(nested_jobs(Arc::clone(&tracker), Some((2, 0))), 5, 1);

    let mut errors = Vec::new();
    let mut values = 0;
    while let Some(result) = s.next().await {
        match result {
            Ok(_) => values += 1,
            Err(err) => errors.push(err),
        }
    }

    assert_eq!(errors, vec!["inner 2/0 failed".to_string()]);
    assert!(values < OUTER * INNER);
    assert!(s.next().await.is_none());
    assert!(s.cancellation_token().is_cancelled());
}

#[tokio::test]
async fn test_outer_error_ends_everything() {
    let jobs = (0..4usize).map(|o| {
        move || async move {
            if o == 1 {
                return Err("outer 1 failed");
            }
            let inner: Vec<_> = (0..3usize)
                .map(move |i| move || async move { Ok::<_, &'static str>(o * 10 + i) })
                .collect();
            Ok(inner)
        }
    });

    let results: Vec<_> = flatten_stream(jobs, 1, 1).collect().await;
    assert_eq!(results.last(), Some(&Err("outer 1 failed")));
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
}

#[tokio::test]
async fn test_empty_outer_ends_immediately() {
    type Leaf = fn() -> Ready<Result<u8, Infallible>>;
    let jobs: Vec<fn() -> Ready<Result<Vec<Leaf>, Infallible>>> = Vec::new();
    let values: Vec<_> = flatten_stream(jobs, MaxConcurrency::Unbounded, 1).collect().await;
    assert!(values.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flatten_stream_with_config() {
    let config = StreamConfig::new(MaxConcurrency::from(2usize)).with_inner(MaxConcurrency::from(1usize));
    let tracker = Arc::new(Tracker::default());

    let values: Vec<_> = flatten_stream_with(nested_jobs(Arc::clone(&tracker), None), &config)
        .collect()
        .await;
    assert_eq!(values.len(), OUTER * INNER);
    assert_eq!(tracker.peak_per_outer(), 1);
    assert!(tracker.peak() > 2);
    assert!(tracker.peak() <= OUTER);
}

#[tokio::test]
async fn test_debug_reports_progress() {
    let tracker = Arc::new(Tracker::default());
    let s = flatten_stream(nested_jobs(tracker, None), 2, 1);
    let rendered = format!("{s:?}");
    assert!(rendered.contains("FlattenStream"));
    assert!(rendered.contains("active_inner: 0"));
}
