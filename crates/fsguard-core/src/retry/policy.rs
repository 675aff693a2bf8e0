//! Retry eligibility and backoff
//!
//! A filesystem call is retried only when it fails with one of a small set of
//! transient resource-exhaustion errors. Anything else (not found, permission
//! denied, invalid input, ...) is surfaced on its first occurrence.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::observer::RetryObserver;
use crate::error::Error;

/// Default retry ceiling per operation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default backoff unit in milliseconds
pub const DEFAULT_BASE_DELAY_MS: u64 = 50;

/// A transient resource-exhaustion error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransientKind {
    /// EAGAIN: resource temporarily unavailable
    ResourceUnavailable,
    /// EMFILE: the process has run out of file handles
    TooManyOpenFiles,
    /// EBUSY: file or resource busy
    ResourceBusy,
}

impl TransientKind {
    /// Every transient kind, in declaration order
    pub const ALL: [TransientKind; 3] = [
        TransientKind::ResourceUnavailable,
        TransientKind::TooManyOpenFiles,
        TransientKind::ResourceBusy,
    ];

    /// The kebab-case name used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientKind::ResourceUnavailable => "resource-unavailable",
            TransientKind::TooManyOpenFiles => "too-many-open-files",
            TransientKind::ResourceBusy => "resource-busy",
        }
    }
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransientKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransientKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "unknown retryable error kind '{}'. Valid kinds: resource-unavailable, too-many-open-files, resource-busy",
                    s
                ))
            })
    }
}

/// Classifies an error as transient or not
///
/// Implemented for `std::io::Error`; other error types can opt in so they
/// can flow through the retry executors unchanged.
///
/// # Example
///
/// ```rust
/// use fsguard_core::retry::{TransientError, TransientKind};
/// use std::io;
///
/// let err = io::Error::from(io::ErrorKind::WouldBlock);
/// assert_eq!(err.transient_kind(), Some(TransientKind::ResourceUnavailable));
///
/// let err = io::Error::from(io::ErrorKind::NotFound);
/// assert_eq!(err.transient_kind(), None);
/// ```
pub trait TransientError {
    /// The transient kind of this error, or `None` for terminal errors
    fn transient_kind(&self) -> Option<TransientKind>;
}

impl TransientError for io::Error {
    fn transient_kind(&self) -> Option<TransientKind> {
        match self.kind() {
            io::ErrorKind::WouldBlock => return Some(TransientKind::ResourceUnavailable),
            io::ErrorKind::ResourceBusy => return Some(TransientKind::ResourceBusy),
            _ => {}
        }

        // EMFILE has no stable ErrorKind of its own
        match self.raw_os_error() {
            Some(code) if is_too_many_open_files(code) => Some(TransientKind::TooManyOpenFiles),
            _ => None,
        }
    }
}

impl<E: TransientError + ?Sized> TransientError for Box<E> {
    fn transient_kind(&self) -> Option<TransientKind> {
        (**self).transient_kind()
    }
}

impl<E: TransientError + ?Sized> TransientError for Arc<E> {
    fn transient_kind(&self) -> Option<TransientKind> {
        (**self).transient_kind()
    }
}

#[cfg(unix)]
fn is_too_many_open_files(code: i32) -> bool {
    code == libc::EMFILE
}

#[cfg(windows)]
fn is_too_many_open_files(code: i32) -> bool {
    // ERROR_TOO_MANY_OPEN_FILES
    code == 4
}

#[cfg(not(any(unix, windows)))]
fn is_too_many_open_files(_code: i32) -> bool {
    false
}

/// The set of transient kinds eligible for retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetryableKinds(BTreeSet<TransientKind>);

impl RetryableKinds {
    /// A set that retries nothing
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Check whether a kind is in the set
    pub fn contains(&self, kind: TransientKind) -> bool {
        self.0.contains(&kind)
    }

    /// Iterate over the kinds in the set
    pub fn iter(&self) -> impl Iterator<Item = TransientKind> + '_ {
        self.0.iter().copied()
    }

    /// Number of kinds in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set retries nothing
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for RetryableKinds {
    fn default() -> Self {
        TransientKind::ALL.into_iter().collect()
    }
}

impl FromIterator<TransientKind> for RetryableKinds {
    fn from_iter<I: IntoIterator<Item = TransientKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for RetryableKinds {
    type Err = Error;

    /// Parse a comma separated list such as `resource-busy,too-many-open-files`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(TransientKind::from_str)
            .collect()
    }
}

/// What an executor should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the given delay, then attempt again
    Retry(Duration),
    /// The error is not transient; surface it now
    Terminal,
    /// The error is transient but the attempt ceiling was reached
    Exhausted,
}

/// Retry policy: eligibility plus linear backoff
///
/// # Example
///
/// ```rust
/// use fsguard_core::retry::RetryPolicy;
/// use std::io;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// let busy = io::Error::from(io::ErrorKind::ResourceBusy);
///
/// assert!(policy.should_retry(&busy, 1));
/// assert!(!policy.should_retry(&busy, 10));
/// assert_eq!(policy.delay_for(3), Duration::from_millis(150));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `n * base_delay`
    pub base_delay: Duration,
    /// Transient kinds eligible for retry
    pub retryable_kinds: RetryableKinds,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            retryable_kinds: RetryableKinds::default(),
        }
    }
}

impl RetryPolicy {
    /// Set the attempt ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the backoff unit
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the retryable kinds
    pub fn with_retryable_kinds(mut self, kinds: RetryableKinds) -> Self {
        self.retryable_kinds = kinds;
        self
    }

    /// Attempt ceiling as seen by the executors; an operation always runs once
    pub fn attempt_ceiling(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Whether the error's kind is in the retryable set
    pub fn is_retryable<E: TransientError + ?Sized>(&self, error: &E) -> bool {
        error
            .transient_kind()
            .is_some_and(|kind| self.retryable_kinds.contains(kind))
    }

    /// Whether to retry after `attempts_so_far` attempts ended with `error`
    pub fn should_retry<E: TransientError + ?Sized>(&self, error: &E, attempts_so_far: u32) -> bool {
        self.is_retryable(error) && attempts_so_far < self.max_attempts
    }

    /// Wait before the attempt following attempt number `attempts_so_far`
    pub fn delay_for(&self, attempts_so_far: u32) -> Duration {
        self.base_delay.saturating_mul(attempts_so_far)
    }

    /// Decide what to do after attempt number `attempt` failed with `error`
    pub fn decide<E: TransientError + ?Sized>(&self, error: &E, attempt: u32) -> RetryDecision {
        if !self.is_retryable(error) {
            RetryDecision::Terminal
        } else if self.should_retry(error, attempt) {
            RetryDecision::Retry(self.delay_for(attempt))
        } else {
            RetryDecision::Exhausted
        }
    }

    /// Settle failed attempt number `attempt`
    ///
    /// Reports the outcome to `observer`, then returns the wait before the
    /// next attempt, or hands `error` back when no attempt follows.
    pub(crate) fn settle_failure<E, O>(
        &self,
        observer: &O,
        attempt: u32,
        error: E,
    ) -> Result<Duration, E>
    where
        E: TransientError + fmt::Display,
        O: RetryObserver + ?Sized,
    {
        match self.decide(&error, attempt) {
            RetryDecision::Retry(delay) => {
                observer.on_attempt_failed(attempt, &error, delay);
                Ok(delay)
            }
            RetryDecision::Terminal => {
                observer.on_terminal(attempt, &error);
                Err(error)
            }
            RetryDecision::Exhausted => {
                observer.on_exhausted(attempt, &error);
                Err(error)
            }
        }
    }
}
