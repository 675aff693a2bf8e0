//! Retry loop for suspendable operations
//!
//! Same decisions as the blocking executor, but backoff is a
//! `tokio::time::sleep`. The engine submits the whole loop to the admission
//! controller as one task, so an operation keeps a single slot across all of
//! its attempts.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use super::observer::{NoOpObserver, RetryObserver};
use super::policy::{RetryPolicy, TransientError};

/// Runs an async operation under a [`RetryPolicy`]
pub struct ManagedRetryExecutor<O = NoOpObserver> {
    policy: Arc<RetryPolicy>,
    observer: O,
}

impl ManagedRetryExecutor<NoOpObserver> {
    /// Create a new executor with no observer
    pub fn new(policy: impl Into<Arc<RetryPolicy>>) -> Self {
        Self {
            policy: policy.into(),
            observer: NoOpObserver,
        }
    }
}

impl<O> ManagedRetryExecutor<O> {
    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> ManagedRetryExecutor<O2> {
        ManagedRetryExecutor {
            policy: self.policy,
            observer,
        }
    }

    /// The policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<O: RetryObserver> ManagedRetryExecutor<O> {
    /// Run `op` until it succeeds, fails terminally, or runs out of attempts
    ///
    /// The error from the last attempt is returned unchanged.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TransientError + Display,
    {
        let start = Instant::now();
        let ceiling = self.policy.attempt_ceiling();
        let mut attempt = 1;

        loop {
            self.observer.on_attempt_start(attempt, ceiling);

            let err = match op().await {
                Ok(value) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            let delay = self.policy.settle_failure(&self.observer, attempt, err)?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::observer::StatsObserver;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_linear() {
        let observer = Arc::new(StatsObserver::new());
        let executor =
            ManagedRetryExecutor::new(RetryPolicy::default()).with_observer(observer.clone());
        let calls = Arc::new(AtomicU32::new(0));

        let start = tokio::time::Instant::now();
        let result = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err(io::Error::from(io::ErrorKind::WouldBlock))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        // 50 + 100 + 150, within timer-wheel granularity
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(305), "{elapsed:?}");
        assert_eq!(
            observer.delays(),
            vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(150)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_makes_max_attempts() {
        let executor = ManagedRetryExecutor::new(RetryPolicy::default());
        let calls = Arc::new(AtomicU32::new(0));

        let result: io::Result<()> = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(io::Error::new(io::ErrorKind::ResourceBusy, format!("busy {n}")))
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(err.to_string(), "busy 10");
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let observer = Arc::new(StatsObserver::new());
        let executor =
            ManagedRetryExecutor::new(RetryPolicy::default()).with_observer(observer.clone());

        let result: io::Result<()> = executor
            .run(|| async { Err(io::Error::from(io::ErrorKind::NotFound)) })
            .await;

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.terminals(), 1);
    }
}
