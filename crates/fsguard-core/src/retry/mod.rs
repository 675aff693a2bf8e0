//! Retry policy and the two executors that apply it
//!
//! A failed attempt is retried only when its error classifies as one of the
//! policy's [`TransientKind`]s and the attempt ceiling has not been reached.
//! After attempt `n` the executor waits `n * base_delay`, so the default
//! policy (10 attempts, 50ms) waits 50ms, 100ms, ... 450ms between attempts.
//!
//! - [`BlockingRetryExecutor`] sleeps the calling thread between attempts
//! - [`ManagedRetryExecutor`] suspends the task between attempts
//!
//! Both report to a [`RetryObserver`]; [`TracingObserver`] logs each event.
//!
//! # Example
//!
//! ```rust
//! use fsguard_core::retry::{BlockingRetryExecutor, RetryPolicy, TracingObserver};
//!
//! let executor = BlockingRetryExecutor::new(RetryPolicy::default())
//!     .with_observer(TracingObserver::new("read manifest"));
//!
//! let manifest = executor.run(|| std::fs::read_to_string("Cargo.toml"));
//! assert!(manifest.is_ok());
//! ```

mod blocking;
mod managed;
mod observer;
mod policy;


pub use blocking::BlockingRetryExecutor;
pub use managed::ManagedRetryExecutor;
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use policy::{
    RetryDecision, RetryPolicy, RetryableKinds, TransientError, TransientKind,
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
};
