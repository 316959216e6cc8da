//! Simulated write path: a handler accepts movie records, answers at once, and
//! leaves the insert to the background queue.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=tasklane=debug TASKLANE_QUEUE_NAME=movies TASKLANE_PACING_MS=200 cargo run --example ingest
//! ```

use std::sync::{Arc, Mutex};

use tasklane::{BoxError, QueueConfig, TaskQueue};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Movie {
    title: String,
    year: u16,
}

type Store = Arc<Mutex<Vec<Movie>>>;

async fn insert(store: Store, movie: Movie) -> Result<(), BoxError> {
    if movie.title.trim().is_empty() {
        return Err("title is required".into());
    }
    // Stand-in for a slow database round trip.
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    store
        .lock()
        .map_err(|_| "store lock poisoned")?
        .push(movie);
    Ok(())
}

// What a POST handler would do: hand off the write and report acceptance only.
fn add_movie(queue: &TaskQueue, store: &Store, movie: Movie) -> serde_json::Value {
    let store = Arc::clone(store);
    let accepted = movie.title.clone();
    let id = queue.enqueue(move || insert(store, movie));
    serde_json::json!({
        "message": "Movie added to queue for processing",
        "task": id.as_u64(),
        "title": accepted,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let queue = TaskQueue::new(QueueConfig::from_env()?)?;
    let store = Store::default();

    let incoming = [
        Movie {
            title: "Alien".into(),
            year: 1979,
        },
        Movie {
            title: "".into(),
            year: 2001,
        },
        Movie {
            title: "Heat".into(),
            year: 1995,
        },
        Movie {
            title: "Ran".into(),
            year: 1985,
        },
    ];

    for movie in incoming {
        let response = add_movie(&queue, &store, movie);
        info!(%response, "responded to client");
    }
    info!(status = %serde_json::to_string(&queue.status())?, "queue status");

    queue.wait_idle().await;

    let stats = queue.stats();
    info!(
        completed = stats.completed,
        failed = stats.failed,
        "backlog drained"
    );
    for movie in store.lock().map_err(|_| "store lock poisoned")?.iter() {
        info!(title = %movie.title, year = movie.year, "stored");
    }
    Ok(())
}
