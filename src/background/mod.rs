//! Background work — a sequential, paced, fire-and-forget task queue.
//!
//! Request handlers hand slow work (typically a persistence write) to a
//! [`TaskQueue`] and answer their caller right away. A single worker then runs
//! the queued tasks one at a time, strictly in submission order, pausing for a
//! fixed pacing interval between tasks to throttle the downstream resource.
//!
//! ## Guarantees
//!
//! - At most one task executes at any instant, however many producers enqueue
//!   concurrently.
//! - Tasks run in the order they were appended to the backlog.
//! - A failing or panicking task is reported through the queue's
//!   [`FailureReporter`] and never stops the tasks behind it. A reporter that
//!   panics is logged and skipped as well.
//!
//! ## Limitations
//!
//! - The backlog is unbounded. A producer that outpaces the worker grows memory
//!   without limit; add a bound in front of the queue before relying on it in
//!   production.
//! - Nothing is persisted. Tasks still queued when the runtime shuts down are
//!   lost.
//! - Task execution has no timeout; a hanging task stalls the whole backlog.
//! - Results are discarded. Producers learn neither success nor failure.

pub mod report;
pub mod task;

pub use report::{FailureReporter, TracingReporter};
pub use task::{BoxError, TaskFailure, TaskId};

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::config::QueueConfig;
use task::{Task, panic_message};

/// Errors produced while constructing a queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no Tokio runtime available to drive the queue worker: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// Point-in-time snapshot of a queue.
///
/// Both fields are read under the same lock, but the queue may have moved on by
/// the time the caller looks at them.
///
/// Serializes as `{"pendingCount": 0, "isDraining": false}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Tasks accepted but not yet started.
    pub pending_count: usize,
    /// Whether a worker is currently running or about to pick up the next task.
    pub is_draining: bool,
}

/// Cumulative counters since the queue was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub completed: u64,
    pub failed: u64,
}

/// A sequential background task queue.
///
/// Cloning is cheap and every clone feeds the same backlog and the same worker,
/// so one queue can be built at startup and handed to every producer.
///
/// # Examples
///
/// ```rust,no_run
/// use tasklane::background::{BoxError, TaskQueue};
/// use tasklane::config::QueueConfig;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let queue = TaskQueue::new(QueueConfig::default())?;
///
///     let id = queue.enqueue(|| async {
///         // write to the database here
///         Ok::<_, BoxError>(())
///     });
///     println!("accepted {id}, status: {:?}", queue.status());
///
///     queue.wait_idle().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

struct Shared {
    config: QueueConfig,
    state: Mutex<State>,
    // Mirrors `State::draining`; only written while `state` is locked.
    draining_tx: watch::Sender<bool>,
    runtime: Handle,
    reporter: Arc<dyn FailureReporter>,
    completed: AtomicU64,
    failed: AtomicU64,
}

// The backlog and the draining flag live behind one lock so that deciding to
// start a worker and appending to the backlog happen atomically.
struct State {
    backlog: VecDeque<(TaskId, Task)>,
    draining: bool,
    last_id: u64,
}

impl TaskQueue {
    /// Creates a queue whose worker runs on the current Tokio runtime and whose
    /// failures are logged through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoRuntime`] when called outside a Tokio runtime.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        Self::with_reporter(config, TracingReporter)
    }

    /// Creates a queue on the current Tokio runtime with a custom failure sink.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NoRuntime`] when called outside a Tokio runtime.
    pub fn with_reporter(
        config: QueueConfig,
        reporter: impl FailureReporter,
    ) -> Result<Self, QueueError> {
        let runtime = Handle::try_current()?;
        Ok(Self::from_parts(config, runtime, Arc::new(reporter)))
    }

    /// Creates a queue whose worker is spawned on `runtime`.
    ///
    /// Useful when the queue is built outside the runtime that will drive it.
    pub fn with_handle(config: QueueConfig, runtime: Handle) -> Self {
        Self::from_parts(config, runtime, Arc::new(TracingReporter))
    }

    fn from_parts(
        config: QueueConfig,
        runtime: Handle,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        let (draining_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    backlog: VecDeque::new(),
                    draining: false,
                    last_id: 0,
                }),
                draining_tx,
                runtime,
                reporter,
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Appends an async task to the backlog and returns immediately.
    ///
    /// `task` is not called until the worker reaches it. Its success value is
    /// dropped and its error, if any, goes to the failure reporter.
    pub fn enqueue<F, Fut, T, E>(&self, task: F) -> TaskId
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: 'static,
        E: Into<BoxError> + 'static,
    {
        self.push(Task::from_async(task))
    }

    /// Appends a blocking task to the backlog and returns immediately.
    ///
    /// The closure runs on Tokio's blocking thread pool, still one task at a
    /// time and in order with async tasks.
    pub fn enqueue_blocking<F, T, E>(&self, task: F) -> TaskId
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: 'static,
        E: Into<BoxError> + 'static,
    {
        self.push(Task::from_blocking(task))
    }

    fn push(&self, task: Task) -> TaskId {
        let (id, pending, start_worker) = {
            let mut state = self.shared.lock();
            state.last_id += 1;
            let id = TaskId::new(state.last_id);
            state.backlog.push_back((id, task));

            let start_worker = !state.draining;
            if start_worker {
                state.draining = true;
                self.shared.draining_tx.send_replace(true);
            }
            (id, state.backlog.len(), start_worker)
        };

        debug!(queue = %self.shared.config.name, task_id = %id, pending, "task enqueued");

        if start_worker {
            self.shared.runtime.spawn(drain(Arc::clone(&self.shared)));
        }
        id
    }

    /// Returns the current backlog length and worker state.
    pub fn status(&self) -> QueueStatus {
        let state = self.shared.lock();
        QueueStatus {
            pending_count: state.backlog.len(),
            is_draining: state.draining,
        }
    }

    /// Returns cumulative counters.
    pub fn stats(&self) -> QueueStats {
        let enqueued = self.shared.lock().last_id;
        QueueStats {
            enqueued,
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Waits until the worker has drained the backlog and stopped.
    ///
    /// Returns immediately if the queue is already idle. The queue stays usable
    /// afterwards; a later enqueue starts a new worker.
    pub async fn wait_idle(&self) {
        let mut draining = self.shared.draining_tx.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot fail.
        let _ = draining.wait_for(|draining| !*draining).await;
    }

    /// Returns the configuration the queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.shared.config.name)
            .field("status", &self.status())
            .finish()
    }
}

impl Shared {
    // No task ever runs while the lock is held, so a poisoned lock still
    // guards consistent state.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Pops the head of the backlog, or marks the queue idle if there is none.
    fn next_task(&self) -> Option<(TaskId, Task)> {
        let mut state = self.lock();
        let next = state.backlog.pop_front();
        if next.is_none() {
            state.draining = false;
            self.draining_tx.send_replace(false);
        }
        next
    }
}

/// The worker loop. Exactly one instance runs while the queue is draining.
async fn drain(shared: Arc<Shared>) {
    let queue = shared.config.name.as_str();
    debug!(queue, "worker started");

    while let Some((id, task)) = shared.next_task() {
        match task.run().await {
            Ok(()) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
                debug!(queue, task_id = %id, "task completed");
            }
            Err(failure) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                let reported = panic::catch_unwind(AssertUnwindSafe(|| {
                    shared.reporter.report(queue, id, &failure);
                }));
                if let Err(payload) = reported {
                    error!(
                        queue,
                        task_id = %id,
                        error = %failure,
                        reporter_panic = %panic_message(payload),
                        "failure reporter panicked"
                    );
                }
            }
        }

        tokio::time::sleep(shared.config.pacing_interval).await;
    }

    debug!(queue, "backlog drained, worker idle");
}
