use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tasklane::{BoxError, FailureReporter, QueueConfig, TaskFailure, TaskId, TaskQueue};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn quick() -> QueueConfig {
    QueueConfig::default()
        .name("integration")
        .pacing_interval(Duration::from_millis(1))
}

fn record(queue: &TaskQueue, log: &Log, name: &'static str) -> TaskId {
    let log = Arc::clone(log);
    queue.enqueue(move || async move {
        log.lock().unwrap().push(name);
        Ok::<_, BoxError>(())
    })
}

fn explode() -> Result<(), BoxError> {
    panic!("kaboom")
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<(TaskId, String)>>>);

impl FailureReporter for Captured {
    fn report(&self, queue: &str, id: TaskId, failure: &TaskFailure) {
        assert_eq!(queue, "integration");
        self.0.lock().unwrap().push((id, failure.to_string()));
    }
}

#[tokio::test]
async fn runs_in_enqueue_order() {
    let queue = TaskQueue::new(quick()).unwrap();
    let log = Log::default();

    record(&queue, &log, "A");
    record(&queue, &log, "B");
    record(&queue, &log, "C");
    queue.wait_idle().await;

    assert_eq!(*log.lock().unwrap(), ["A", "B", "C"]);
}

#[tokio::test]
async fn long_backlog_keeps_fifo_order() {
    let queue = TaskQueue::new(quick().pacing_interval(Duration::ZERO)).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let order = Arc::clone(&order);
        queue.enqueue(move || async move {
            order.lock().unwrap().push(i);
            Ok::<_, BoxError>(())
        });
    }
    queue.wait_idle().await;

    assert_eq!(*order.lock().unwrap(), (0..100).collect::<Vec<_>>());
}

#[tokio::test]
async fn ids_increase_per_enqueue() {
    let queue = TaskQueue::new(quick()).unwrap();
    let log = Log::default();

    let first = record(&queue, &log, "A");
    let second = record(&queue, &log, "B");
    assert!(first < second);
    assert_eq!(second.as_u64(), first.as_u64() + 1);
    queue.wait_idle().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_task_at_a_time_under_concurrent_producers() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 25;

    let queue = TaskQueue::new(quick().pacing_interval(Duration::ZERO)).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
        let queue = queue.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let order = Arc::clone(&order);

        producers.push(tokio::spawn(async move {
            for seq in 0..PER_PRODUCER {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                let order = Arc::clone(&order);
                queue.enqueue(move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    order.lock().unwrap().push((producer, seq));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(())
                });
                tokio::task::yield_now().await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    queue.wait_idle().await;

    assert_eq!(peak.load(Ordering::SeqCst), 1);

    let order = order.lock().unwrap();
    assert_eq!(order.len(), PRODUCERS * PER_PRODUCER);
    for producer in 0..PRODUCERS {
        let seqs: Vec<usize> = order
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
    assert_eq!(queue.stats().completed, (PRODUCERS * PER_PRODUCER) as u64);
}

#[tokio::test]
async fn failure_does_not_stop_later_tasks() {
    let reporter = Captured::default();
    let queue = TaskQueue::with_reporter(quick(), reporter.clone()).unwrap();
    let log = Log::default();

    let failing = queue.enqueue(|| async { Err::<(), _>("title is required") });
    record(&queue, &log, "first");
    record(&queue, &log, "second");
    queue.wait_idle().await;

    assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    assert_eq!(
        *reporter.0.lock().unwrap(),
        [(failing, "task failed: title is required".to_owned())]
    );
    assert!(!queue.status().is_draining);
}

#[tokio::test]
async fn panic_is_reported_and_queue_recovers() {
    let reporter = Captured::default();
    let queue = TaskQueue::with_reporter(quick(), reporter.clone()).unwrap();
    let log = Log::default();

    let panicking = queue.enqueue(|| async { explode() });
    queue.wait_idle().await;
    assert!(!queue.status().is_draining);

    record(&queue, &log, "after");
    queue.wait_idle().await;

    assert_eq!(*log.lock().unwrap(), ["after"]);
    assert_eq!(
        *reporter.0.lock().unwrap(),
        [(panicking, "task panicked: kaboom".to_owned())]
    );
    let stats = queue.stats();
    assert_eq!((stats.completed, stats.failed), (1, 1));
}

#[tokio::test]
async fn consecutive_failures_still_drain_to_idle() {
    let reporter = Captured::default();
    let queue = TaskQueue::with_reporter(quick(), reporter.clone()).unwrap();

    for _ in 0..5 {
        queue.enqueue_blocking(|| Err::<(), _>(std::io::Error::other("disk full")));
    }
    queue.wait_idle().await;

    assert_eq!(reporter.0.lock().unwrap().len(), 5);
    assert_eq!(queue.status().pending_count, 0);
    assert!(!queue.status().is_draining);
}

#[tokio::test]
async fn idle_draining_cycle_repeats() {
    let queue = TaskQueue::new(quick()).unwrap();
    let log = Log::default();

    for name in ["one", "two"] {
        assert!(!queue.status().is_draining);
        record(&queue, &log, name);
        assert!(queue.status().is_draining);
        queue.wait_idle().await;
        assert!(!queue.status().is_draining);
    }

    assert_eq!(*log.lock().unwrap(), ["one", "two"]);
    assert_eq!(queue.stats().completed, 2);
}

#[tokio::test]
async fn blocking_and_async_tasks_share_one_order() {
    let queue = TaskQueue::new(quick()).unwrap();
    let log = Log::default();

    record(&queue, &log, "async-1");
    {
        let log = Arc::clone(&log);
        queue.enqueue_blocking(move || {
            std::thread::sleep(Duration::from_millis(5));
            log.lock().unwrap().push("blocking");
            Ok::<_, BoxError>(())
        });
    }
    record(&queue, &log, "async-2");
    queue.wait_idle().await;

    assert_eq!(*log.lock().unwrap(), ["async-1", "blocking", "async-2"]);
}

#[tokio::test]
async fn clones_share_one_backlog() {
    let queue = TaskQueue::new(quick()).unwrap();
    let other = queue.clone();
    let log = Log::default();

    record(&queue, &log, "A");
    record(&other, &log, "B");
    assert_eq!(queue.stats().enqueued, 2);
    assert!(other.status().is_draining);

    other.wait_idle().await;
    assert_eq!(*log.lock().unwrap(), ["A", "B"]);
    assert!(!queue.status().is_draining);
}
