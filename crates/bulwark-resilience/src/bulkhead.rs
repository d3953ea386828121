use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::{CancellationToken, DropGuard};

use bulwark_common::ContextCarryingTask;

use crate::config::BulkheadConfig;
use crate::error::ResilienceError;

struct Job {
    run: BoxFuture<'static, ()>,
    // Held until the job finishes so queued + running never exceeds capacity.
    permit: OwnedSemaphorePermit,
}

#[derive(Debug, thiserror::Error)]
#[error("task was cancelled or panicked before producing a result")]
pub struct TaskAbandoned;

/// Result handle of a submitted task. Dropping the handle (or the future
/// returned by [`BulkheadHandle::join`]) cancels the task.
pub struct BulkheadHandle<T> {
    result: oneshot::Receiver<T>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl<T> BulkheadHandle<T> {
    /// Requests cooperative cancellation. A queued task is skipped; a running
    /// task is dropped at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn join(self) -> Result<T, TaskAbandoned> {
        let Self { result, _guard, .. } = self;
        result.await.map_err(|_| TaskAbandoned)
    }
}

/// Fixed pool of worker tasks with a bounded FIFO queue in front of it,
/// dedicated to one dependency.
///
/// Must be created inside a Tokio runtime; workers stop once the bulkhead is
/// dropped and the queue drains.
pub struct Bulkhead {
    name: Arc<str>,
    config: BulkheadConfig,
    permits: Arc<Semaphore>,
    queue: mpsc::UnboundedSender<Job>,
    active: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.name)
            .field("workers", &self.config.workers)
            .field("queue_capacity", &self.config.queue_capacity)
            .field("in_flight", &self.in_flight())
            .field("queued", &self.queued())
            .finish()
    }
}

impl Bulkhead {
    pub fn new(name: &str, config: BulkheadConfig) -> Self {
        let name: Arc<str> = Arc::from(name);
        let capacity = config.workers + config.queue_capacity;
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));
        let active = Arc::new(AtomicUsize::new(0));

        for id in 0..config.workers {
            tokio::spawn(worker_loop(name.clone(), id, rx.clone(), active.clone()));
        }
        tracing::debug!(bulkhead=%name, workers = config.workers, queue = config.queue_capacity, "bulkhead started");

        Self {
            name,
            config,
            permits: Arc::new(Semaphore::new(capacity)),
            queue: tx,
            active,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> usize {
        let capacity = self.config.workers + self.config.queue_capacity;
        let held = capacity.saturating_sub(self.permits.available_permits());
        held.saturating_sub(self.in_flight())
    }

    /// Enqueues `task` or fails immediately with
    /// [`ResilienceError::BulkheadRejected`] when workers and queue are full.
    pub fn submit<F>(
        &self,
        task: ContextCarryingTask<F>,
    ) -> Result<BulkheadHandle<F::Output>, ResilienceError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            return Err(self.rejected());
        };

        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let job_cancel = cancel.clone();
        let name = self.name.clone();

        let run = async move {
            tokio::select! {
                biased;
                _ = job_cancel.cancelled() => {
                    tracing::debug!(bulkhead=%name, "dropping cancelled task");
                }
                out = AssertUnwindSafe(task.run()).catch_unwind() => match out {
                    Ok(value) => {
                        let _ = tx.send(value);
                    }
                    Err(_) => {
                        tracing::error!(bulkhead=%name, "task panicked");
                    }
                },
            }
        }
        .boxed();

        self.queue
            .send(Job { run, permit })
            .map_err(|_| self.rejected())?;

        Ok(BulkheadHandle {
            result: rx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        })
    }

    fn rejected(&self) -> ResilienceError {
        ResilienceError::BulkheadRejected {
            dependency: self.name.to_string(),
            workers: self.config.workers,
            queue_capacity: self.config.queue_capacity,
        }
    }
}

async fn worker_loop(
    name: Arc<str>,
    id: usize,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    active: Arc<AtomicUsize>,
) {
    loop {
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(Job { run, permit }) = next else {
            break;
        };
        active.fetch_add(1, Ordering::Relaxed);
        run.await;
        active.fetch_sub(1, Ordering::Relaxed);
        drop(permit);
    }
    tracing::debug!(bulkhead=%name, worker = id, "bulkhead worker stopped");
}
