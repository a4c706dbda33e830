//! Tests for the submission queue and worker pool — bounded admission and
//! at-most-one execution per task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use a2a_rs::server::{
    EventQueue, InMemoryTaskStore, QueueItem, TaskQueue, TaskRunner, TaskStore, WorkerPool,
};
use a2a_rs::types::{Message, Task, TaskState, TaskStatus};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

fn sample_task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        context_id: "ctx-1".to_string(),
        kind: "task".to_string(),
        status: TaskStatus::new(TaskState::Submitted),
        artifacts: None,
        history: None,
        metadata: None,
    }
}

fn sample_item(task_id: &str) -> QueueItem {
    QueueItem {
        task: sample_task(task_id),
        message: Message::user("m1", "hello"),
        configuration: None,
        event_queue: EventQueue::new(16),
    }
}

/// Records every task id it was asked to run, in the order received.
struct RecordingRunner {
    seen: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TaskRunner for RecordingRunner {
    async fn run(&self, item: QueueItem, _cancel: CancellationToken) {
        self.seen.lock().await.push(item.task.id.clone());
    }
}

#[tokio::test]
async fn worker_pool_runs_every_submitted_item() {
    let store = Arc::new(InMemoryTaskStore::new());
    let runner = Arc::new(RecordingRunner::new());
    let (pool, queue) = WorkerPool::spawn(2, 8, store, runner.clone());

    for i in 0..5 {
        queue.try_enqueue(sample_item(&format!("task-{i}"))).unwrap();
    }

    // Give the workers a moment to drain the queue.
    tokio::time::sleep(Duration::from_millis(200)).await;
    pool.shutdown().await;

    let seen = runner.seen.lock().await;
    let mut ids: Vec<String> = seen.clone();
    ids.sort();
    assert_eq!(
        ids,
        vec!["task-0", "task-1", "task-2", "task-3", "task-4"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn try_enqueue_fails_when_queue_is_full() {
    // A runner that never completes, so the single worker stays busy and the
    // bounded channel fills up.
    struct BlockingRunner;
    #[async_trait]
    impl TaskRunner for BlockingRunner {
        async fn run(&self, _item: QueueItem, _cancel: CancellationToken) {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    }

    let store = Arc::new(InMemoryTaskStore::new());
    let runner = Arc::new(BlockingRunner);
    let (pool, queue) = WorkerPool::spawn(1, 1, store, runner);

    // First item is taken by the single worker and blocks it.
    queue.try_enqueue(sample_item("task-a")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The channel has capacity 1; fill it, then overflow.
    queue.try_enqueue(sample_item("task-b")).unwrap();
    let result = queue.try_enqueue(sample_item("task-c"));
    assert!(result.is_err(), "expected QueueFull once channel saturates");

    pool.shutdown().await;
}

#[tokio::test]
async fn worker_respects_existing_lease_and_requeues() {
    // Two tasks with the same id: the store only grants one lease at a time,
    // so the second submission must wait for the first to release it before
    // the runner observes it.
    let store = Arc::new(InMemoryTaskStore::new());
    let run_count = Arc::new(AtomicUsize::new(0));

    struct CountingRunner {
        count: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl TaskRunner for CountingRunner {
        async fn run(&self, _item: QueueItem, _cancel: CancellationToken) {
            self.count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    let runner = Arc::new(CountingRunner {
        count: run_count.clone(),
    });
    let (pool, queue) = WorkerPool::spawn(4, 8, store.clone(), runner);

    for _ in 0..3 {
        queue.try_enqueue(sample_item("same-task")).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    pool.shutdown().await;

    // Every submission eventually runs — lease contention only serializes,
    // it never drops work silently.
    assert_eq!(run_count.load(Ordering::SeqCst), 3);
    // The store's lease must be released after the last run.
    assert!(store.try_acquire_lease("same-task").await);
}
