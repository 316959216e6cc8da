//! Where task failures go once the worker has caught them.

use tracing::error;

use super::task::{TaskFailure, TaskId};

/// Sink for failures of background tasks.
///
/// The worker calls [`report`](Self::report) once per failed task and then moves
/// on to the next one. Implementations run on the worker itself, so they should
/// be quick. A panic inside `report` is caught and logged; it does not stop the
/// worker.
///
/// # Examples
///
/// ```rust
/// use tasklane::background::{FailureReporter, TaskFailure, TaskId};
///
/// struct Stderr;
///
/// impl FailureReporter for Stderr {
///     fn report(&self, queue: &str, id: TaskId, failure: &TaskFailure) {
///         eprintln!("[{queue}] {id}: {failure}");
///     }
/// }
/// ```
pub trait FailureReporter: Send + Sync + 'static {
    /// Records that the task `id` on the queue named `queue` failed.
    fn report(&self, queue: &str, id: TaskId, failure: &TaskFailure);
}

/// Default reporter: emits one `tracing` error event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, queue: &str, id: TaskId, failure: &TaskFailure) {
        error!(queue, task_id = %id, error = %failure, "background task failed");
    }
}
