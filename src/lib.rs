//! # tasklane
//!
//! An in-process, strictly sequential background task queue for Tokio services.
//!
//! Write paths enqueue their slow work and respond immediately; one worker runs
//! the backlog in submission order with a fixed pause between tasks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tasklane::{BoxError, QueueConfig, TaskQueue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = TaskQueue::new(QueueConfig::from_env()?)?;
//!
//!     for title in ["Alien", "Heat", "Ran"] {
//!         queue.enqueue(move || async move {
//!             println!("inserting {title}");
//!             Ok::<_, BoxError>(())
//!         });
//!     }
//!
//!     println!("{:?}", queue.status());
//!     queue.wait_idle().await;
//!     Ok(())
//! }
//! ```

pub mod background;
pub mod config;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use background::{
    BoxError, FailureReporter, QueueError, QueueStats, QueueStatus, TaskFailure, TaskId,
    TaskQueue, TracingReporter,
};
pub use config::{ConfigError, QueueConfig};
