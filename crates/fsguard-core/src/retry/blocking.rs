//! Retry executor for calls that must finish on the calling thread
//!
//! Backoff parks the calling thread with `std::thread::sleep`. Nothing here
//! touches the admission controller: blocking calls are unmanaged and uncapped.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use super::observer::{NoOpObserver, RetryObserver};
use super::policy::{RetryPolicy, TransientError};

/// Runs a blocking operation under a [`RetryPolicy`]
///
/// # Example
///
/// ```rust
/// use fsguard_core::retry::{BlockingRetryExecutor, RetryPolicy};
///
/// let executor = BlockingRetryExecutor::new(RetryPolicy::default());
/// let len = executor.run(|| std::fs::metadata(".").map(|m| m.len()));
/// assert!(len.is_ok());
/// ```
pub struct BlockingRetryExecutor<O = NoOpObserver> {
    policy: Arc<RetryPolicy>,
    observer: O,
}

impl BlockingRetryExecutor<NoOpObserver> {
    /// Create a new executor with no observer
    pub fn new(policy: impl Into<Arc<RetryPolicy>>) -> Self {
        Self {
            policy: policy.into(),
            observer: NoOpObserver,
        }
    }
}

impl<O> BlockingRetryExecutor<O> {
    /// Set the observer
    pub fn with_observer<O2>(self, observer: O2) -> BlockingRetryExecutor<O2> {
        BlockingRetryExecutor {
            policy: self.policy,
            observer,
        }
    }

    /// The policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<O: RetryObserver> BlockingRetryExecutor<O> {
    /// Run `op` until it succeeds, fails terminally, or runs out of attempts
    ///
    /// The error from the last attempt is returned unchanged.
    pub fn run<F, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: TransientError + Display,
    {
        let start = Instant::now();
        let ceiling = self.policy.attempt_ceiling();
        let mut attempt = 1;

        loop {
            self.observer.on_attempt_start(attempt, ceiling);

            let err = match op() {
                Ok(value) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            let delay = self.policy.settle_failure(&self.observer, attempt, err)?;
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            attempt += 1;
        }
    }
}
