//! Bounded background task queue.
//!
//! Long-running operations (index requests, pip invocations) are spawned
//! through a [`TaskQueue`]. At most `limit` of them run at once, the number
//! of queued or running tasks can be observed, and every task can be cancelled.
//! Cancelling drops the task's future, which kills any child process it owns.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

/// Decrements the in-flight counter when a task ends, however it ends.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// How a queued task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult<T> {
    Completed(T),
    Cancelled,
    /// The task panicked; the message is the panic payload when it was a string.
    Panicked(String),
}

impl<T> TaskResult<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            TaskResult::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Handle to one queued task.
pub struct TaskHandle<T> {
    handle: JoinHandle<Option<T>>,
}

impl<T> TaskHandle<T> {
    /// Waits for the task to finish.
    pub async fn join(self) -> TaskResult<T> {
        match self.handle.await {
            Ok(Some(value)) => TaskResult::Completed(value),
            Ok(None) => TaskResult::Cancelled,
            Err(e) if e.is_cancelled() => TaskResult::Cancelled,
            Err(e) => {
                let payload = e.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "task panicked".to_string());
                TaskResult::Panicked(message)
            }
        }
    }

    /// Cancels this task only.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    cancel: Arc<watch::Sender<u64>>,
    limit: usize,
}

impl TaskQueue {
    /// Creates a queue running at most `limit` tasks at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (cancel, _) = watch::channel(0);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            cancel: Arc::new(cancel),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks queued or running right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queues `task`. It starts once a slot is free.
    pub fn spawn<F, T>(&self, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let permits = Arc::clone(&self.permits);
        // A fresh receiver ignores cancellations issued before this spawn.
        let mut cancelled = self.cancel.subscribe();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                result = async {
                    // The semaphore is owned by the queue and never closed.
                    let _permit = permits.acquire_owned().await.ok()?;
                    Some(task.await)
                } => result,
                // Also fires once the last queue handle is dropped.
                _ = cancelled.changed() => {
                    debug!("Task cancelled");
                    None
                }
            }
        });

        TaskHandle { handle }
    }

    /// Number of `cancel_all` calls so far. A caller running tasks one after
    /// another compares it between tasks to notice a cancellation that
    /// happened while nothing of its own was queued.
    pub fn generation(&self) -> u64 {
        *self.cancel.borrow()
    }

    /// Cancels every task spawned so far, running or still waiting for a slot.
    pub fn cancel_all(&self) {
        debug!("Cancelling {} task(s)", self.in_flight());
        self.cancel.send_modify(|generation| *generation += 1);
    }
}
