//! Integration tests for fail-fast streams.
//!
//! Tests verify:
//! - exactly one error reaches the consumer, first failure wins
//! - values completed before the failure are delivered, nothing after
//! - running and pending jobs end Cancelled and never deliver
//! - pending jobs are never invoked once the signal is set

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use slotline_kernel::{try_await_all, try_stream, JobId, JobStatus};
use slotline_testutil::{init_tracing, random_delays, Event, EventLog, Gate};

#[derive(Debug, Clone, PartialEq, Eq)]
struct JobFailed(usize);

fn ids(ids: Vec<JobId>) -> HashSet<usize> {
    ids.into_iter().map(JobId::index).collect()
}

// ============================================================================
// End-to-end: 50 jobs, capacity 5, 25th completion fails
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_twenty_fifth_completion_fails() {
    init_tracing();
    let log = EventLog::new();
    let completions = Arc::new(AtomicUsize::new(0));

    let jobs: Vec<_> = random_delays(50, 11, 30)
        .into_iter()
        .enumerate()
        .map(|(i, delay)| {
            let log = log.clone();
            let completions = Arc::clone(&completions);
            move || {
                log.record(Event::Started(JobId(i)));
                async move {
                    tokio::time::sleep(delay).await;
                    if completions.fetch_add(1, Ordering::SeqCst) == 24 {
                        return Err(JobFailed(i));
                    }
                    log.record(Event::Finished(JobId(i)));
                    Ok(i)
                }
            }
        })
        .collect();

    let mut s = try_stream(jobs, 5);
    let mut delivered = Vec::new();
    let mut errors = Vec::new();
    while let Some(result) = s.next().await {
        match result {
            Ok(value) => delivered.push(value),
            Err(err) => errors.push(err),
        }
    }

    // Exactly one error, after exactly the values completed before it
    assert_eq!(errors.len(), 1);
    let failing = errors[0].0;
    assert_eq!(delivered.len(), 24);
    assert_eq!(delivered, log.finishes());

    s.wait_settled().await;
    let snap = s.snapshot();
    assert!(snap.is_settled());
    assert_eq!(snap.status(JobId(failing)), Some(JobStatus::Failed));
    assert_eq!(snap.count(JobStatus::Completed), 24);
    assert_eq!(snap.count(JobStatus::Failed), 1);
    assert_eq!(snap.count(JobStatus::Cancelled), 25);

    // Started-but-never-delivered equals started − delivered − the failing job,
    // and every one of them was cancelled
    let started: HashSet<usize> = log.starts().into_iter().collect();
    let delivered: HashSet<usize> = delivered.into_iter().collect();
    let cancelled = ids(snap.with_status(JobStatus::Cancelled));

    let never_delivered: HashSet<usize> = started
        .difference(&delivered)
        .copied()
        .filter(|i| *i != failing)
        .collect();
    assert_eq!(never_delivered, started.intersection(&cancelled).copied().collect());

    // Cancelled pending jobs never ran their closure
    let never_started: HashSet<usize> = cancelled.difference(&started).copied().collect();
    assert_eq!(never_started.len() + never_delivered.len(), 25);
}

// ============================================================================
// First Failure Wins
// ============================================================================

#[tokio::test]
async fn test_simultaneous_failures_surface_once() {
    let gate = Gate::new();
    let jobs: Vec<_> = (0..8usize)
        .map(|i| {
            let gate = gate.clone();
            move || async move {
                gate.wait().await;
                Err::<(), _>(JobFailed(i))
            }
        })
        .collect();

    let mut s = try_stream(jobs, 8);
    assert!(s.next().now_or_never().is_none());
    gate.open();

    let results: Vec<_> = s.by_ref().collect().await;
    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());

    s.wait_settled().await;
    let snap = s.snapshot();
    assert_eq!(snap.count(JobStatus::Failed), 1);
    assert_eq!(snap.count(JobStatus::Cancelled), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multi_thread_failures_surface_once() {
    let jobs: Vec<_> = (0..32usize)
        .map(|i| {
            move || async move {
                tokio::time::sleep(Duration::from_millis((i % 4) as u64)).await;
                if i % 3 == 0 {
                    Err(anyhow::anyhow!("job {i} failed"))
                } else {
                    Ok(i)
                }
            }
        })
        .collect();

    let results: Vec<anyhow::Result<usize>> = try_stream(jobs, 6).collect().await;
    let errors = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(errors, 1);
    assert!(results.last().is_some_and(|r| r.is_err()));
}

#[tokio::test(start_paused = true)]
async fn test_running_jobs_stop_at_next_suspension_point() {
    let reached_end = Arc::new(AtomicUsize::new(0));
    let jobs: Vec<_> = (0..4usize)
        .map(|i| {
            let reached_end = Arc::clone(&reached_end);
            move || async move {
                if i == 0 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    return Err(JobFailed(0));
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
                reached_end.fetch_add(1, Ordering::SeqCst);
                Ok(i)
            }
        })
        .collect();

    let mut s = try_stream(jobs, 4);
    assert_eq!(s.next().await, Some(Err(JobFailed(0))));
    assert_eq!(s.next().await, None);

    s.wait_settled().await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(reached_end.load(Ordering::SeqCst), 0);
    assert_eq!(s.snapshot().count(JobStatus::Cancelled), 3);
}

#[tokio::test]
async fn test_pending_jobs_never_invoked_after_failure() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let jobs: Vec<_> = (0..10usize)
        .map(|i| {
            let invoked = Arc::clone(&invoked);
            move || {
                invoked.fetch_add(1, Ordering::SeqCst);
                async move { if i == 0 { Err(JobFailed(i)) } else { Ok(i) } }.boxed()
            }
        })
        .collect();

    let mut s = try_stream(jobs, 1);
    assert_eq!(s.next().await, Some(Err(JobFailed(0))));
    s.wait_settled().await;

    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert_eq!(s.snapshot().count(JobStatus::Cancelled), 9);
}

// ============================================================================
// Collector
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_try_await_all_discards_partial_results() {
    let jobs = (0..6usize).map(|i| {
        move || async move {
            tokio::time::sleep(Duration::from_millis(10 * i as u64)).await;
            if i == 4 { Err(JobFailed(i)) } else { Ok(i) }
        }
    });
    assert_eq!(try_await_all(jobs, 3).await, Err(JobFailed(4)));
}

#[tokio::test]
async fn test_try_await_all_success() {
    let jobs = (0..6usize).map(|i| move || async move { Ok::<_, JobFailed>(i * 3) });
    assert_eq!(try_await_all(jobs, 2).await, Ok(vec![0, 3, 6, 9, 12, 15]));
}
