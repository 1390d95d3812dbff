//! Bounded worker pool with caller-runs backpressure.
//!
//! Admission follows the classic core / queue / max scheme:
//!
//! ```text
//! core worker free      -> start now
//! else queue slot free  -> wait for a core worker
//! else overflow free    -> start now (up to max_size running)
//! else                  -> the submitter runs the task itself
//! ```
//!
//! Submission never fails and never blocks indefinitely: under overload
//! the cost moves to the submitter's latency.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

/// Pool dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: 3,
            max_size: 10,
            queue_capacity: 50,
        }
    }
}

/// How submissions were admitted since the pool was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub submitted: u64,
    pub started: u64,
    pub queued: u64,
    pub overflow: u64,
    pub caller_ran: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    started: AtomicU64,
    queued: AtomicU64,
    overflow: AtomicU64,
    caller_ran: AtomicU64,
}

/// Result of `WorkerPool::submit`.
#[derive(Debug)]
pub enum TaskHandle<T> {
    /// Running (or queued) on the runtime.
    Spawned(JoinHandle<T>),
    /// Already executed by the submitter.
    Completed(T),
}

impl<T> TaskHandle<T> {
    /// Wait for the output.
    pub async fn join(self) -> Result<T, JoinError> {
        match self {
            TaskHandle::Spawned(handle) => handle.await,
            TaskHandle::Completed(output) => Ok(output),
        }
    }

    pub fn ran_on_caller(&self) -> bool {
        matches!(self, TaskHandle::Completed(_))
    }
}

/// Shared, request-independent executor for fetch tasks.
#[derive(Debug)]
pub struct WorkerPool {
    config: PoolConfig,
    core: Arc<Semaphore>,
    queue: Arc<Semaphore>,
    overflow: Arc<Semaphore>,
    counters: PoolCounters,
}

impl WorkerPool {
    /// `core_size` is raised to 1 and `max_size` to `core_size` if lower.
    pub fn new(config: PoolConfig) -> Self {
        let core_size = config.core_size.max(1);
        let max_size = config.max_size.max(core_size);
        let config = PoolConfig {
            core_size,
            max_size,
            queue_capacity: config.queue_capacity,
        };

        Self {
            config,
            core: Arc::new(Semaphore::new(core_size)),
            queue: Arc::new(Semaphore::new(config.queue_capacity)),
            overflow: Arc::new(Semaphore::new(max_size - core_size)),
            counters: PoolCounters::default(),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            started: self.counters.started.load(Ordering::Relaxed),
            queued: self.counters.queued.load(Ordering::Relaxed),
            overflow: self.counters.overflow.load(Ordering::Relaxed),
            caller_ran: self.counters.caller_ran.load(Ordering::Relaxed),
        }
    }

    /// Submit a task.
    ///
    /// # Returns
    /// A handle to join. When the pool is saturated the task has already
    /// run to completion on the caller by the time this returns.
    pub async fn submit<F>(&self, task: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        if let Ok(permit) = Arc::clone(&self.core).try_acquire_owned() {
            self.counters.started.fetch_add(1, Ordering::Relaxed);
            return TaskHandle::Spawned(tokio::spawn(async move {
                let _permit = permit;
                task.await
            }));
        }

        if let Ok(slot) = Arc::clone(&self.queue).try_acquire_owned() {
            self.counters.queued.fetch_add(1, Ordering::Relaxed);
            debug!("All core workers busy, task queued");
            let core = Arc::clone(&self.core);
            return TaskHandle::Spawned(tokio::spawn(async move {
                // Closed only if the pool is gone; run regardless.
                let _permit = core.acquire_owned().await.ok();
                drop(slot);
                task.await
            }));
        }

        if let Ok(permit) = Arc::clone(&self.overflow).try_acquire_owned() {
            self.counters.overflow.fetch_add(1, Ordering::Relaxed);
            debug!("Queue full, starting overflow worker");
            return TaskHandle::Spawned(tokio::spawn(async move {
                let _permit = permit;
                task.await
            }));
        }

        self.counters.caller_ran.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Worker pool saturated (max {}, queue {}), running task on the caller",
            self.config.max_size, self.config.queue_capacity
        );
        TaskHandle::Completed(task.await)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
