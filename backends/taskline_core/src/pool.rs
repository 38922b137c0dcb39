use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::{
    BoxedError, Execution, FutureHandle, PoolConfig, TaskError, TaskQueue, TaskResult,
    DEFAULT_THREAD_NAME,
};

/// Snapshot of a pool's execution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks that ran to completion with a value.
    pub executed: u64,
    /// Tasks that returned an error.
    pub failed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
}

#[derive(Default)]
struct Counters {
    executed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    fn record(&self, execution: Execution) {
        let counter = match execution {
            Execution::Completed => &self.executed,
            Execution::Failed => &self.failed,
            Execution::Panicked => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

struct Worker {
    name: String,
    handle: Option<JoinHandle<()>>,
}

/// A fixed set of worker threads consuming one [`TaskQueue`].
///
/// Workers run until the queue is shut down and (when draining) empty.
/// Failures and panics inside tasks are delivered through the task's future;
/// the worker itself keeps going.
///
/// Dropping a pool that was not joined shuts the queue down (draining unless
/// the config said otherwise) and joins every worker.
pub struct WorkerPool {
    queue: TaskQueue,
    workers: Vec<Worker>,
    counters: Arc<Counters>,
    drain_on_drop: bool,
}

impl WorkerPool {
    /// Starts `workers` threads over a fresh unbounded queue.
    ///
    /// # Errors
    ///
    /// [`TaskError::Spawn`] if the OS refuses a thread.
    pub fn start(workers: usize) -> TaskResult<Self> {
        Self::with_queue(TaskQueue::unbounded(), workers)
    }

    /// Starts `workers` threads over an existing queue.
    ///
    /// # Errors
    ///
    /// [`TaskError::Spawn`] if the OS refuses a thread.
    pub fn with_queue(queue: TaskQueue, workers: usize) -> TaskResult<Self> {
        let config = PoolConfig {
            workers,
            ..PoolConfig::default()
        };
        Self::spawn(queue, &config)
    }

    /// # Errors
    ///
    /// [`TaskError::Spawn`] if the OS refuses a thread.
    pub fn from_config(config: &PoolConfig) -> TaskResult<Self> {
        Self::spawn(TaskQueue::from_config(config), config)
    }

    fn spawn(queue: TaskQueue, config: &PoolConfig) -> TaskResult<Self> {
        let counters = Arc::new(Counters::default());
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.workers.max(1));

        let prefix = if config.thread_name.is_empty() {
            DEFAULT_THREAD_NAME
        } else {
            config.thread_name.as_str()
        };

        for index in 0..config.workers.max(1) {
            let name = format!("{prefix}-{index}");
            let mut builder = thread::Builder::new().name(name.clone());
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let worker_queue = queue.clone();
            let worker_counters = Arc::clone(&counters);
            let worker_stop = Arc::clone(&stop);
            let worker_name = name.clone();
            let spawned = builder.spawn(move || {
                worker_loop(&worker_name, &worker_queue, &worker_counters, &worker_stop);
            });

            match spawned {
                Ok(handle) => workers.push(Worker {
                    name,
                    handle: Some(handle),
                }),
                Err(err) => {
                    retire(&queue, &stop, workers);
                    taskline_logs::error!(worker = %name, "failed to spawn worker: {}", err);
                    return Err(TaskError::Spawn(err.to_string()));
                }
            }
        }

        taskline_logs::info!(workers = workers.len(), "worker pool started");
        Ok(Self {
            queue,
            workers,
            counters,
            drain_on_drop: config.drain_on_drop,
        })
    }

    /// See [`TaskQueue::submit`].
    ///
    /// # Errors
    ///
    /// [`TaskError::Closed`] after shutdown.
    pub fn submit<F, T>(&self, f: F) -> TaskResult<FutureHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.queue.submit(f)
    }

    /// See [`TaskQueue::submit_fallible`].
    ///
    /// # Errors
    ///
    /// [`TaskError::Closed`] after shutdown.
    pub fn submit_fallible<F, T, E>(&self, f: F) -> TaskResult<FutureHandle<T>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxedError>,
    {
        self.queue.submit_fallible(f)
    }

    /// See [`TaskQueue::try_submit`].
    ///
    /// # Errors
    ///
    /// [`TaskError::Full`] or [`TaskError::Closed`].
    pub fn try_submit<F, T>(&self, f: F) -> TaskResult<FutureHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.queue.try_submit(f)
    }

    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Number of worker threads started.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Shuts the queue down; see [`TaskQueue::shutdown`]. Returns the number
    /// of discarded tasks.
    pub fn shutdown(&self, drain: bool) -> usize {
        self.queue.shutdown(drain)
    }

    /// Waits for every worker to exit. Without a prior
    /// [`WorkerPool::shutdown`] this blocks until another handle to the
    /// queue shuts it down.
    ///
    /// # Errors
    ///
    /// [`TaskError::WorkerPanicked`] naming the first worker whose thread
    /// died; the remaining workers are still joined.
    pub fn join_all(&mut self) -> TaskResult<()> {
        let mut first_failure = None;
        for worker in &mut self.workers {
            let Some(handle) = worker.handle.take() else {
                continue;
            };
            if handle.join().is_err() {
                taskline_logs::error!(worker = %worker.name, "worker thread panicked");
                first_failure.get_or_insert_with(|| TaskError::WorkerPanicked {
                    worker: worker.name.clone(),
                });
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.workers.iter().all(|worker| worker.handle.is_none()) {
            return;
        }
        self.queue.shutdown(self.drain_on_drop);
        if let Err(err) = self.join_all() {
            taskline_logs::error!("dropping worker pool: {}", err);
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("queue", &self.queue)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Stops and joins workers of a pool that failed to start. The queue may be
/// shared with the caller, so it is left open.
fn retire(queue: &TaskQueue, stop: &AtomicBool, workers: Vec<Worker>) {
    stop.store(true, Ordering::Release);
    queue.wake_consumers();
    for worker in workers {
        if let Some(handle) = worker.handle {
            if handle.join().is_err() {
                taskline_logs::error!(worker = %worker.name, "worker thread panicked");
            }
        }
    }
}

fn worker_loop(name: &str, queue: &TaskQueue, counters: &Counters, stop: &AtomicBool) {
    let span = tracing::debug_span!("worker", name);
    let _entered = span.enter();
    taskline_logs::debug!("worker started");

    loop {
        let Ok(Some(task)) = queue.take_unless(stop) else {
            break;
        };
        let id = task.id();
        let execution = task.run();
        match execution {
            Execution::Completed => taskline_logs::trace!(%id, "task completed"),
            Execution::Failed => taskline_logs::warn!(%id, "task failed"),
            Execution::Panicked => taskline_logs::error!(%id, "task panicked"),
        }
        counters.record(execution);
    }

    taskline_logs::debug!("worker exiting");
}
