//! Admission control for managed filesystem operations
//!
//! At most `capacity` submitted tasks run at once. Tasks that arrive while
//! every slot is taken wait in a FIFO queue and are started, oldest first,
//! as running tasks settle.
//!
//! Slot bookkeeping lives behind one mutex. Releasing a slot and scanning the
//! queue for the next task happen under the same lock, so two settling tasks
//! can never both hand the same free slot to a waiter. Tasks are spawned only
//! after the lock is dropped.
//!
//! Spawning can drop a job on the spot (a runtime that is shutting down
//! discards it), and that drop releases a slot and launches the next waiter.
//! Launches started from inside another launch are queued on a per-thread
//! list and drained by the outermost one, so draining a long queue never
//! grows the call stack.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Default number of managed operations allowed in flight
pub const DEFAULT_CAPACITY: usize = 64;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A task waiting for a slot
///
/// `start` turns the slot it is given into the future that gets spawned; the
/// future owns the slot and releases it when the wrapped task settles.
struct QueuedTask {
    start: Box<dyn FnOnce(Slot) -> Job + Send + 'static>,
    runtime: Handle,
}

thread_local! {
    static LAUNCHING: Cell<bool> = const { Cell::new(false) };
    static DEFERRED: RefCell<VecDeque<(Arc<Inner>, QueuedTask)>> =
        const { RefCell::new(VecDeque::new()) };
}

/// Clears the per-thread launching flag, including on unwind
struct LaunchGuard;

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        let _ = LAUNCHING.try_with(|flag| flag.set(false));
    }
}

#[derive(Default)]
struct AdmissionState {
    active: usize,
    queue: VecDeque<QueuedTask>,
}

struct Inner {
    capacity: usize,
    state: Mutex<AdmissionState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        // Counters stay consistent even if a holder panicked: every mutation
        // is a single step under the lock.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop every task that fits under the capacity, claiming a slot for each
    fn take_ready(&self, state: &mut AdmissionState) -> Vec<QueuedTask> {
        let mut ready = Vec::new();
        while state.active < self.capacity {
            let Some(task) = state.queue.pop_front() else {
                break;
            };
            state.active += 1;
            ready.push(task);
        }
        ready
    }

    fn launch(self: &Arc<Self>, ready: Vec<QueuedTask>) {
        if ready.is_empty() {
            return;
        }

        let mut batch: Vec<_> = ready
            .into_iter()
            .map(|task| (Arc::clone(self), task))
            .collect();
        let deferred = DEFERRED
            .try_with(|list| list.borrow_mut().extend(batch.drain(..)))
            .is_ok();
        if !deferred {
            // Thread-local storage is already torn down
            for (inner, task) in batch {
                start_queued(inner, task);
            }
            return;
        }
        if LAUNCHING
            .try_with(|flag| flag.replace(true))
            .unwrap_or(false)
        {
            // The outer launch on this thread drains the list
            return;
        }

        let _guard = LaunchGuard;
        while let Some((inner, task)) = DEFERRED
            .try_with(|list| list.borrow_mut().pop_front())
            .ok()
            .flatten()
        {
            start_queued(inner, task);
        }
    }

    fn release(self: &Arc<Self>) {
        let ready = {
            let mut state = self.lock();
            state.active = state.active.saturating_sub(1);
            let ready = self.take_ready(&mut state);
            tracing::trace!(
                active = state.active,
                queued = state.queue.len(),
                admitted = ready.len(),
                "slot released"
            );
            ready
        };
        self.launch(ready);
    }
}

fn start_queued(inner: Arc<Inner>, task: QueuedTask) {
    let job = (task.start)(Slot { inner });
    task.runtime.spawn(job);
}

/// One claimed unit of capacity; dropping it frees the slot
///
/// Dropping happens on every way out of a task: normal settlement, panic
/// unwinding, or the runtime discarding the task.
struct Slot {
    inner: Arc<Inner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// Bounds the number of concurrently running managed tasks
///
/// Cloning yields another handle onto the same slots and queue.
///
/// # Example
///
/// ```rust
/// use fsguard_core::admission::AdmissionController;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let controller = AdmissionController::new(2);
/// let handle = controller.submit(async { 40 + 2 });
/// assert_eq!(handle.await.unwrap(), 42);
/// # }
/// ```
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

impl AdmissionController {
    /// Create a controller admitting at most `capacity` tasks at once
    ///
    /// A capacity of zero is raised to one so submitted work can always run.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: capacity.max(1),
                state: Mutex::new(AdmissionState::default()),
            }),
        }
    }

    /// Submit a task and get a handle to its eventual output
    ///
    /// The task is queued and, if a slot is free, started right away. This
    /// never waits; callers await the returned handle instead. Must be called
    /// from within a Tokio runtime; otherwise the handle resolves to
    /// [`Error::TaskAborted`] without the task ever running.
    pub fn submit<F, T>(&self, task: F) -> PendingResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let pending = PendingResult { rx };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!(error = %err, "managed task submitted outside a Tokio runtime");
                return pending;
            }
        };

        let start = move |slot: Slot| -> Job {
            Box::pin(async move {
                let output = task.await;
                // Free the slot before reporting, so the next waiter is
                // already admitted by the time the caller observes the result.
                drop(slot);
                let _ = tx.send(output);
            })
        };

        let ready = {
            let mut state = self.inner.lock();
            state.queue.push_back(QueuedTask {
                start: Box::new(start),
                runtime,
            });
            let ready = self.inner.take_ready(&mut state);
            if ready.is_empty() {
                tracing::debug!(
                    active = state.active,
                    queued = state.queue.len(),
                    "at capacity, task queued"
                );
            }
            ready
        };
        self.inner.launch(ready);

        pending
    }

    /// Maximum number of tasks running at once
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of tasks currently holding a slot
    pub fn active_count(&self) -> usize {
        self.inner.lock().active
    }

    /// Number of tasks waiting for a slot
    pub fn queued_count(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("AdmissionController")
            .field("capacity", &self.inner.capacity)
            .field("active", &state.active)
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// Handle to the output of a submitted task
///
/// Resolves once the task settles. If the task is dropped first (it
/// panicked, or its runtime shut down) the handle resolves to
/// [`Error::TaskAborted`]. Dropping the handle does not cancel the task.
#[must_use = "the task runs regardless, but its output is lost unless awaited"]
pub struct PendingResult<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for PendingResult<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map_err(|_| Error::TaskAborted)
    }
}

impl<T> fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResult").finish_non_exhaustive()
    }
}
