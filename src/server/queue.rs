//! Submission queue & worker pool — bounded admission and at-most-one
//! execution per task.
//!
//! Mirrors the producer/consumer shape of [`EventQueue`](super::event_queue::EventQueue)
//! but for work items rather than stream events: a bounded `mpsc` channel
//! carries submitted tasks, and a fixed-size pool of workers drains it,
//! acquiring each task's execution lease (see
//! [`TaskStore::try_acquire_lease`](super::task_store::TaskStore::try_acquire_lease))
//! before running it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{A2AError, A2AResult};
use crate::types::{Message, Task};

use super::request_handler::SendMessageConfiguration;
use super::event_queue::EventQueue;
use super::task_store::TaskStore;

/// Maximum number of in-process lease-contention retries before a worker
/// requeues an item at the back of the queue.
const MAX_LEASE_ATTEMPTS: u32 = 20;

/// One unit of submitted work: a task plus the message that triggered this
/// round of execution and the event queue its consumers are subscribed to.
#[derive(Clone)]
pub struct QueueItem {
    /// Snapshot of the task at submission time.
    pub task: Task,
    /// The message that triggered this execution.
    pub message: Message,
    /// Optional send configuration (history length, push config, ...).
    pub configuration: Option<SendMessageConfiguration>,
    /// The event queue the eventual [`AgentExecutor`](super::agent_executor::AgentExecutor)
    /// run should publish to; already subscribed to by callers awaiting the
    /// result, so it must exist before enqueue.
    pub event_queue: EventQueue,
}

/// Implemented by whatever actually drives a [`QueueItem`] to completion —
/// typically a [`DefaultRequestHandler`](super::request_handler::DefaultRequestHandler).
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run one queue item under the given cooperative cancellation token.
    async fn run(&self, item: QueueItem, cancel: CancellationToken);
}

/// Handle to the bounded submission queue.
///
/// Cloning is cheap — all clones share the same underlying channel.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<QueueItem>,
}

impl TaskQueue {
    /// Attempt to enqueue `item` without blocking.
    ///
    /// Fails with [`A2AError::QueueFull`] if the bounded channel has no free
    /// capacity — the caller should surface this as a distinguishable
    /// rejection rather than silently dropping the submission.
    pub fn try_enqueue(&self, item: QueueItem) -> A2AResult<()> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                A2AError::queue_full("submission queue is at capacity")
            }
            mpsc::error::TrySendError::Closed(_) => {
                A2AError::internal_error("submission queue is closed")
            }
        })
    }
}

/// A running pool of workers draining a [`TaskQueue`].
pub struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers sharing a bounded queue of `queue_size`,
    /// each acquiring the execution lease from `store` before invoking
    /// `runner`. Returns the pool (for later shutdown) and a handle to the
    /// queue callers submit work to.
    pub fn spawn(
        worker_count: usize,
        queue_size: usize,
        store: Arc<dyn TaskStore>,
        runner: Arc<dyn TaskRunner>,
    ) -> (Self, TaskQueue) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();

        let handles = (0..worker_count.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&rx),
                    tx.clone(),
                    Arc::clone(&store),
                    Arc::clone(&runner),
                    shutdown.clone(),
                ))
            })
            .collect();

        (Self { shutdown, handles }, TaskQueue { tx })
    }

    /// Signal every worker to stop taking new items and wait for in-flight
    /// work to drain.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
    tx: mpsc::Sender<QueueItem>,
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn TaskRunner>,
    shutdown: CancellationToken,
) {
    debug!(worker_id, "worker started");
    loop {
        let item = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(worker_id, "worker draining on shutdown signal");
                None
            }
            item = async { rx.lock().await.recv().await } => item,
        };

        let Some(item) = item else {
            break;
        };

        let task_id = item.task.id.clone();
        let mut attempts = 0u32;
        loop {
            if store.try_acquire_lease(&task_id).await {
                let cancel = CancellationToken::new();
                runner.run(item, cancel).await;
                store.release_lease(&task_id).await;
                break;
            }

            attempts += 1;
            if attempts > MAX_LEASE_ATTEMPTS {
                warn!(worker_id, task_id = %task_id, "lease contention exhausted, requeuing");
                if tx.try_send(item).is_err() {
                    warn!(worker_id, task_id = %task_id, "requeue failed, queue full — dropping round");
                }
                break;
            }

            let jitter_ms = 10 + jitter_from(worker_id, &task_id, attempts);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }
    }
    info!(worker_id, "worker stopped");
}

/// Deterministic pseudo-jitter in `0..40` ms, avoiding a dependency on a
/// random number generator crate for a single backoff call site.
fn jitter_from(worker_id: usize, task_id: &str, attempt: u32) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    worker_id.hash(&mut hasher);
    task_id.hash(&mut hasher);
    attempt.hash(&mut hasher);
    hasher.finish() % 40
}
