//! Tests for the retry module, driven by tokio's paused clock

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::retry::{
    ClosurePredicate, RetryError, RetryExecutorBuilder, RetryPolicy, StatsObserver,
};

fn not_found_is_retryable() -> ClosurePredicate<impl Fn(&io::Error) -> bool + Send + Sync> {
    ClosurePredicate::new(|err: &io::Error| err.kind() == io::ErrorKind::NotFound)
}

#[tokio::test(start_paused = true)]
async fn test_immediate_success() {
    let observer = Arc::new(StatsObserver::new());

    let result: Result<&str, RetryError<io::Error>> = RetryExecutorBuilder::new()
        .with_policy(RetryPolicy::unbounded(Duration::from_secs(5)))
        .with_observer(observer.clone())
        .build()
        .execute(|| async { Ok("ready") })
        .await;

    assert_eq!(result.unwrap(), "ready");
    assert_eq!(observer.attempt_starts(), 1);
    assert_eq!(observer.successes(), 1);
    assert_eq!(observer.failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_retries_until_success_with_fixed_delay() {
    let observer = Arc::new(StatsObserver::new());
    let attempts = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result = RetryExecutorBuilder::new()
        .with_policy(RetryPolicy::unbounded(Duration::from_secs(5)))
        .with_predicate(not_found_is_retryable())
        .with_observer(observer.clone())
        .build()
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 10 {
                    Err(io::Error::new(io::ErrorKind::NotFound, "no providers"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 10);
    assert_eq!(observer.failures(), 9);
    assert_eq!(observer.successes(), 1);
    // Nine waits of five seconds each on the paused clock
    assert_eq!(start.elapsed(), Duration::from_secs(45));
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_returns_immediately() {
    let observer = Arc::new(StatsObserver::new());
    let start = Instant::now();

    let result: Result<(), RetryError<io::Error>> = RetryExecutorBuilder::new()
        .with_policy(RetryPolicy::unbounded(Duration::from_secs(5)))
        .with_predicate(not_found_is_retryable())
        .with_observer(observer.clone())
        .build()
        .execute(|| async {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "invalid profile",
            ))
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_non_retryable());
    assert_eq!(err.attempts(), 1);
    assert_eq!(observer.cancellations(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_after_retryable_ones() {
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), RetryError<io::Error>> = RetryExecutorBuilder::new()
        .with_policy(RetryPolicy::unbounded(Duration::from_secs(1)))
        .with_predicate(not_found_is_retryable())
        .build()
        .execute(|| {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(io::Error::new(io::ErrorKind::NotFound, "not yet"))
                } else {
                    Err(io::Error::new(io::ErrorKind::InvalidData, "broken"))
                }
            }
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_non_retryable());
    assert_eq!(err.attempts(), 3);
    assert_eq!(err.into_source().kind(), io::ErrorKind::InvalidData);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_policy_exhausts() {
    let observer = Arc::new(StatsObserver::new());

    let result: Result<(), RetryError<io::Error>> = RetryExecutorBuilder::new()
        .with_policy(RetryPolicy::bounded(3, Duration::from_millis(10)))
        .with_observer(observer.clone())
        .build()
        .execute(|| async { Err(io::Error::new(io::ErrorKind::TimedOut, "always")) })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_exhausted());
    assert_eq!(err.attempts(), 3);
    assert_eq!(observer.attempt_starts(), 3);
    assert_eq!(observer.failures(), 2);
    assert_eq!(observer.exhaustions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_retry_can_be_cancelled() {
    let executor = RetryExecutorBuilder::new()
        .with_policy(RetryPolicy::unbounded(Duration::from_secs(5)))
        .build();

    let never_ready = executor.execute(|| async {
        Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "never"))
    });

    let outcome = tokio::time::timeout(Duration::from_secs(60), never_ready).await;
    assert!(outcome.is_err(), "unbounded retry should still be pending");
}

#[test]
fn test_policy_last_attempt() {
    let bounded = RetryPolicy::bounded(2, Duration::ZERO);
    assert!(!bounded.is_last_attempt(1));
    assert!(bounded.is_last_attempt(2));

    let unbounded = RetryPolicy::unbounded(Duration::ZERO);
    assert!(!unbounded.is_last_attempt(u32::MAX));
}
