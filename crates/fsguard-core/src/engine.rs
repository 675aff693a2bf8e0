//! The fsguard engine
//!
//! An [`Engine`] owns one admission controller and one retry policy. It is an
//! ordinary value: construct as many as needed, they never share slots.
//! Filesystem primitives built on top of it live in [`crate::dispatch`].

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;

use crate::admission::{AdmissionController, PendingResult, DEFAULT_CAPACITY};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::retry::{
    BlockingRetryExecutor, ManagedRetryExecutor, RetryObserver, RetryPolicy, TracingObserver,
    TransientError,
};

struct EngineInner {
    policy: Arc<RetryPolicy>,
    admission: AdmissionController,
    observer: Arc<dyn RetryObserver>,
}

/// Admission-controlled, retrying executor for filesystem calls
///
/// Cloning is cheap and yields a handle onto the same engine.
///
/// # Example
///
/// ```rust
/// use fsguard_core::Engine;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::io::Result<()> {
/// let engine = Engine::default();
/// let exists = engine.try_exists("Cargo.toml").await?;
/// # let _ = exists;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine from a validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(EngineBuilder::new()
            .with_capacity(config.capacity)
            .with_policy(config.retry_policy())
            .build())
    }

    /// Start building an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Run a blocking operation on the calling thread, with retries
    ///
    /// Never touches the admission controller.
    pub fn run_blocking<F, T, E>(&self, op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> std::result::Result<T, E>,
        E: TransientError + Display,
    {
        BlockingRetryExecutor::new(Arc::clone(&self.inner.policy))
            .with_observer(Arc::clone(&self.inner.observer))
            .run(op)
    }

    /// Submit an async operation, with retries, to the admission controller
    ///
    /// The entire attempt loop is one admitted task, so a retrying operation
    /// holds exactly one slot until it finally succeeds or fails. The caller's
    /// current tracing span is carried into the task.
    pub fn run_managed<F, Fut, T, E>(&self, op: F) -> PendingResult<std::result::Result<T, E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: TransientError + Display + Send + 'static,
    {
        let executor = ManagedRetryExecutor::new(Arc::clone(&self.inner.policy))
            .with_observer(Arc::clone(&self.inner.observer));
        let attempt_loop = async move { executor.run(op).await };

        self.inner
            .admission
            .submit(attempt_loop.instrument(tracing::Span::current()))
    }

    /// The retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    /// The admission controller shared by all managed operations
    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }

    /// Maximum number of managed operations in flight
    pub fn capacity(&self) -> usize {
        self.inner.admission.capacity()
    }

    /// Managed operations currently holding a slot
    pub fn active_count(&self) -> usize {
        self.inner.admission.active_count()
    }

    /// Managed operations waiting for a slot
    pub fn queued_count(&self) -> usize {
        self.inner.admission.queued_count()
    }
}

impl Default for Engine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("policy", &self.inner.policy)
            .field("admission", &self.inner.admission)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring an [`Engine`]
///
/// # Example
///
/// ```rust
/// use fsguard_core::retry::{RetryPolicy, TracingObserver};
/// use fsguard_core::Engine;
/// use std::time::Duration;
///
/// let engine = Engine::builder()
///     .with_capacity(16)
///     .with_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(10)))
///     .with_observer(TracingObserver::new("uploads"))
///     .build();
///
/// assert_eq!(engine.capacity(), 16);
/// ```
pub struct EngineBuilder {
    capacity: usize,
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            policy: RetryPolicy::default(),
            observer: Arc::new(TracingObserver::default()),
        }
    }

    /// Set the maximum number of managed operations in flight
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the observer notified by both executors
    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                policy: Arc::new(self.policy),
                admission: AdmissionController::new(self.capacity),
                observer: self.observer,
            }),
        }
    }
}
