//! Shared-breaker behaviour on the multi-threaded runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use circuit_guard::{BreakerError, BreakerOptions, CircuitBreaker, CircuitState};
use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
#[error("dependency failed on call {0}")]
struct DependencyError(usize);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counters_consistent_under_contention() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let breaker = Arc::new(CircuitBreaker::new(
        move |_: ()| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::task::yield_now().await;
                if n % 3 == 0 {
                    Err(DependencyError(n))
                } else {
                    Ok(n)
                }
            }
        },
        // Never trips: only an all-failure window reaches 100%.
        BreakerOptions::new(Duration::from_secs(5), 100.0, Duration::from_secs(60)).with_volume_threshold(1_000),
    ));

    let handles: Vec<_> = (0..400)
        .map(|_| {
            let breaker = breaker.clone();
            tokio::spawn(async move { breaker.fire(()).await })
        })
        .collect();
    let results = join_all(handles).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let stats = breaker.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.request_count, 400);
    assert_eq!(stats.failure_count, 133);
    assert_eq!(stats.success_count, 267);
    assert_eq!(stats.request_count, stats.failure_count + stats.success_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_trial_among_concurrent_callers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let (counter, trial_gate) = (calls.clone(), gate.clone());
    let breaker = Arc::new(CircuitBreaker::new(
        move |_: ()| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let gate = trial_gate.clone();
            async move {
                if n == 1 {
                    return Err(DependencyError(n));
                }
                gate.notified().await;
                Ok(n)
            }
        },
        BreakerOptions::new(Duration::from_secs(5), 50.0, Duration::from_millis(20)),
    ));

    assert!(breaker.fire(()).await.is_err());
    assert_eq!(breaker.state(), CircuitState::Open);
    tokio::time::sleep(Duration::from_millis(40)).await;

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let breaker = breaker.clone();
            tokio::spawn(async move { breaker.fire(()).await })
        })
        .collect();

    tokio::time::timeout(Duration::from_secs(5), async {
        while breaker.stats().rejected_count < 49 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("other callers should be rejected while the trial is in flight");
    gate.notify_one();

    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();
    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(BreakerError::CircuitOpen { .. })))
        .count();

    assert_eq!((admitted, rejected), (1, 49));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(breaker.state(), CircuitState::Closed);
}
