//! Deferred work items and the ways they can fail.
//!
//! A [`Task`] wraps a producer's closure without calling it. The closure runs
//! only when the worker pops the task off the backlog, on its own Tokio task, so
//! a panic inside it is contained and surfaces as [`TaskFailure::Panicked`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::task::JoinError;

/// Type-erased error returned by a failing task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

type TaskFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// Identifier assigned to every task at enqueue time.
///
/// Ids increase monotonically per queue, so they also reflect execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a task did not complete successfully.
///
/// Failures are handed to the queue's
/// [`FailureReporter`](super::FailureReporter) and then dropped; they never
/// reach the producer.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("task failed: {0}")]
    Failed(#[source] BoxError),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// A unit of deferred work owned by the queue.
pub(crate) enum Task {
    Async(Box<dyn FnOnce() -> TaskFuture + Send>),
    Blocking(Box<dyn FnOnce() -> Result<(), BoxError> + Send>),
}

impl Task {
    /// Wraps an async closure. Its success value is discarded.
    pub(crate) fn from_async<F, Fut, T, E>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: 'static,
        E: Into<BoxError> + 'static,
    {
        Task::Async(Box::new(move || {
            Box::pin(async move { f().await.map(drop).map_err(Into::into) })
        }))
    }

    /// Wraps a blocking closure to be run on the blocking thread pool.
    pub(crate) fn from_blocking<F, T, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: 'static,
        E: Into<BoxError> + 'static,
    {
        Task::Blocking(Box::new(move || f().map(drop).map_err(Into::into)))
    }

    /// Runs the task to completion on the current runtime.
    ///
    /// The work is spawned separately and awaited, so the caller keeps running
    /// even if the task panics.
    pub(crate) async fn run(self) -> Result<(), TaskFailure> {
        let joined = match self {
            Task::Async(make) => tokio::spawn(make()).await,
            Task::Blocking(work) => tokio::task::spawn_blocking(work).await,
        };

        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TaskFailure::Failed(e)),
            Err(e) => Err(join_failure(e)),
        }
    }
}

// Nothing aborts a running task, so a non-panic join error is unexpected; it is
// reported as an ordinary failure.
fn join_failure(err: JoinError) -> TaskFailure {
    if err.is_panic() {
        TaskFailure::Panicked(panic_message(err.into_panic()))
    } else {
        TaskFailure::Failed(Box::new(err))
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
