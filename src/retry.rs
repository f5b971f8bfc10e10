//! Bounded retry combinators.

use crate::config::{LifecycleWaitPolicy, RetryPolicy};
use crate::core::{Result, StoreError};
use http::StatusCode;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay after every failed attempt.
    Fixed,
    /// `base_delay * attempt_number`.
    Linear,
}

impl Backoff {
    pub fn delay(&self, base_delay: Duration, attempt: usize) -> Duration {
        match self {
            Self::Fixed => base_delay,
            Self::Linear => base_delay.saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX)),
        }
    }
}

/// Why a bounded attempt loop stopped without a value.
#[derive(Debug)]
pub(crate) enum AttemptFailure {
    /// The predicate declined to retry this failure.
    Rejected(StoreError),
    /// Every attempt failed with a retryable error.
    Exhausted { last: StoreError, attempts: usize },
}

pub(crate) async fn run_attempts<T, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut action: F,
) -> std::result::Result<T, AttemptFailure>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&StoreError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match action(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !should_retry(&err) => return Err(AttemptFailure::Rejected(err)),
            Err(err) if attempt >= max_attempts => {
                return Err(AttemptFailure::Exhausted {
                    last: err,
                    attempts: attempt,
                });
            }
            Err(err) => {
                let delay = policy.backoff.delay(policy.base_delay, attempt);
                debug!(
                    "attempt {}/{} failed, retrying in {:?}: {}",
                    attempt, max_attempts, delay, err
                );
                sleep(delay).await;
            }
        }
    }
}

/// Runs `action` up to `max_attempts` times with linear backoff.
///
/// After a failure accepted by `should_retry` the helper sleeps
/// `base_delay * attempt` and tries again. A failure the predicate rejects, or the
/// last allowed failure, is returned as [`StoreError::Timeout`] wrapping that failure.
pub async fn retry<T, F, Fut, P>(
    action: F,
    max_attempts: usize,
    base_delay: Duration,
    should_retry: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&StoreError) -> bool,
{
    let policy = RetryPolicy {
        max_attempts,
        base_delay,
        backoff: Backoff::Linear,
    };
    retry_with(&policy, should_retry, action).await
}

/// [`retry`] with an explicit policy.
pub async fn retry_with<T, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&StoreError) -> bool,
{
    match run_attempts(policy, should_retry, |_| action()).await {
        Ok(value) => Ok(value),
        Err(AttemptFailure::Rejected(err)) => Err(StoreError::timeout(
            "action failed with a non-retryable error",
            Some(err),
        )),
        Err(AttemptFailure::Exhausted { last, attempts }) => {
            warn!("action still failing after {} attempts: {}", attempts, last);
            Err(StoreError::timeout(
                format!("action fails after {} attempts", attempts),
                Some(last),
            ))
        }
    }
}

/// Bounds one collaborator call by `limit`; elapsing raises [`StoreError::Timeout`].
pub(crate) async fn bounded<R>(
    limit: Duration,
    target: &str,
    request: impl Future<Output = Result<R>>,
) -> Result<R> {
    tokio::time::timeout(limit, request).await.map_err(|_| {
        StoreError::timeout(format!("request to {} exceeded {:?}", target, limit), None)
    })?
}

/// Polls a provisioning-style operation until it stops answering 409.
///
/// Only conflict failures are retried, every `poll_interval`. Any other failure,
/// or a conflict after the ceiling has elapsed, is returned unchanged.
pub async fn wait_for_lifecycle<T, F, Fut>(policy: &LifecycleWaitPolicy, mut action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut polls = 0u64;
    loop {
        match action().await {
            Ok(value) => {
                if polls > 0 {
                    debug!("resource became usable after {} conflict poll(s)", polls);
                }
                return Ok(value);
            }
            Err(err)
                if err.status() == Some(StatusCode::CONFLICT)
                    && started.elapsed() + policy.poll_interval <= policy.ceiling =>
            {
                polls += 1;
                sleep(policy.poll_interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn conflict() -> StoreError {
        StoreError::service(StatusCode::CONFLICT, "busy")
    }

    #[test]
    fn test_backoff_delays() {
        let base = Duration::from_millis(10);
        assert_eq!(Backoff::Fixed.delay(base, 3), base);
        assert_eq!(Backoff::Linear.delay(base, 3), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let value = retry(
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(conflict())
                    } else {
                        Ok(7)
                    }
                }
            },
            5,
            Duration::from_millis(1),
            StoreError::is_concurrency_conflict,
        )
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_is_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let err = retry(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(conflict()) }
            },
            3,
            Duration::from_millis(1),
            |_| true,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { source: Some(_), .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_stops_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let err = retry(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(StoreError::Transport("reset".into())) }
            },
            3,
            Duration::from_millis(1),
            StoreError::is_concurrency_conflict,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_wait_retries_only_conflicts() {
        let policy = LifecycleWaitPolicy {
            poll_interval: Duration::from_millis(1),
            ceiling: Duration::from_secs(5),
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let created = wait_for_lifecycle(&policy, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(conflict())
                } else {
                    Ok(true)
                }
            }
        })
        .await
        .unwrap();
        assert!(created);
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let err = wait_for_lifecycle(&policy, || async {
            Err::<(), _>(StoreError::service(StatusCode::FORBIDDEN, "denied"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_lifecycle_wait_gives_up_with_original_failure() {
        let policy = LifecycleWaitPolicy {
            poll_interval: Duration::from_millis(5),
            ceiling: Duration::from_millis(20),
        };
        let err = wait_for_lifecycle(&policy, || async { Err::<(), _>(conflict()) })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn test_bounded_names_the_stalled_target() {
        let err = bounded(
            Duration::from_millis(5),
            "table 'orders'",
            std::future::pending::<Result<()>>(),
        )
        .await
        .unwrap_err();
        match err {
            StoreError::Timeout { message, source } => {
                assert!(message.contains("table 'orders'"));
                assert!(source.is_none());
            }
            other => panic!("expected a timeout, got {other:?}"),
        }

        let value = bounded(Duration::from_secs(1), "table 'orders'", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
