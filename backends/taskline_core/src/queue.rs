use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::{
    BoxedError, FutureHandle, PackagedTask, PoolConfig, Task, TaskError, TaskId, TaskResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// Pending tasks are still handed out until the queue runs dry.
    Drain,
    /// Pending tasks were dropped, abandoning their channels.
    Discard,
}

struct QueueState {
    tasks: VecDeque<Task>,
    shutdown: Option<Shutdown>,
    next_id: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    /// Signalled on every insertion and on shutdown.
    available: Condvar,
    /// Signalled when a bounded queue frees a slot and on shutdown.
    space: Condvar,
    capacity: Option<usize>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self, state: &QueueState) -> bool {
        self.capacity
            .is_some_and(|capacity| state.tasks.len() >= capacity)
    }
}

/// FIFO queue of tasks shared between producers and workers.
///
/// Cloning a `TaskQueue` yields another handle to the same queue. Tasks are
/// moved in on submit and moved out on take; a task is never handed to two
/// consumers.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl TaskQueue {
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// A queue holding at most `capacity` pending tasks; `submit` blocks on a
    /// full queue. A zero capacity is raised to one.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::with_capacity(config.capacity.map(|capacity| capacity.max(1)))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    tasks: VecDeque::new(),
                    shutdown: None,
                    next_id: 0,
                }),
                available: Condvar::new(),
                space: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Enqueues `f` and returns the future its result will arrive on.
    ///
    /// # Errors
    ///
    /// [`TaskError::Closed`] once the queue has been shut down, including
    /// when a shutdown happens while waiting for space.
    pub fn submit<F, T>(&self, f: F) -> TaskResult<FutureHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, future) = PackagedTask::new(f);
        self.submit_packaged(task)?;
        Ok(future)
    }

    /// Like [`TaskQueue::submit`], but an `Err` returned by `f` is delivered
    /// to the future as [`TaskError::TaskFailure`].
    ///
    /// # Errors
    ///
    /// [`TaskError::Closed`] once the queue has been shut down.
    pub fn submit_fallible<F, T, E>(&self, f: F) -> TaskResult<FutureHandle<T>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxedError>,
    {
        let (task, future) = PackagedTask::fallible(f);
        self.submit_packaged(task)?;
        Ok(future)
    }

    /// Enqueues an already packaged task whose future the caller holds.
    ///
    /// # Errors
    ///
    /// [`TaskError::Closed`] once the queue has been shut down; the task is
    /// dropped, which abandons its channel.
    pub fn submit_packaged<T: Send + 'static>(&self, task: PackagedTask<T>) -> TaskResult<TaskId> {
        let mut state = self.inner.state();
        state = self
            .inner
            .space
            .wait_while(state, |state| {
                state.shutdown.is_none() && self.inner.is_full(state)
            })
            .unwrap_or_else(PoisonError::into_inner);
        self.push(state, task)
    }

    /// Non-blocking submit.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Full`] when a bounded queue is at capacity.
    /// - [`TaskError::Closed`] once the queue has been shut down.
    pub fn try_submit<F, T>(&self, f: F) -> TaskResult<FutureHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let state = self.inner.state();
        if state.shutdown.is_none() && self.inner.is_full(&state) {
            return Err(TaskError::Full);
        }
        let (task, future) = PackagedTask::new(f);
        self.push(state, task)?;
        Ok(future)
    }

    fn push<T: Send + 'static>(
        &self,
        mut state: MutexGuard<'_, QueueState>,
        task: PackagedTask<T>,
    ) -> TaskResult<TaskId> {
        if state.shutdown.is_some() {
            drop(state);
            taskline_logs::debug!("rejected submission to closed queue");
            return Err(TaskError::Closed);
        }

        let id = TaskId(state.next_id);
        state.next_id += 1;
        state.tasks.push_back(task.into_task(id));
        drop(state);

        self.inner.available.notify_one();
        Ok(id)
    }

    /// Blocks until a task is available or the queue is closed.
    ///
    /// # Errors
    ///
    /// [`TaskError::Closed`] after shutdown once no pending task remains.
    pub fn take_blocking(&self) -> TaskResult<Task> {
        let state = self.inner.state();
        let mut state = self
            .inner
            .available
            .wait_while(state, |state| {
                state.tasks.is_empty() && state.shutdown.is_none()
            })
            .unwrap_or_else(PoisonError::into_inner);
        self.pop(&mut state).ok_or(TaskError::Closed)
    }

    /// [`TaskQueue::take_blocking`] for a consumer that can be retired
    /// without closing the queue. `Ok(None)` once `stop` is set; pending
    /// tasks stay queued for the remaining consumers.
    pub(crate) fn take_unless(&self, stop: &AtomicBool) -> TaskResult<Option<Task>> {
        let state = self.inner.state();
        let mut state = self
            .inner
            .available
            .wait_while(state, |state| {
                state.tasks.is_empty()
                    && state.shutdown.is_none()
                    && !stop.load(Ordering::Acquire)
            })
            .unwrap_or_else(PoisonError::into_inner);
        if stop.load(Ordering::Acquire) {
            return Ok(None);
        }
        self.pop(&mut state).map(Some).ok_or(TaskError::Closed)
    }

    /// Wakes every blocked consumer so it re-reads its stop flag.
    pub(crate) fn wake_consumers(&self) {
        let _state = self.inner.state();
        self.inner.available.notify_all();
    }

    /// Bounded take. `Ok(None)` means the wait expired with nothing to do.
    ///
    /// # Errors
    ///
    /// [`TaskError::Closed`] after shutdown once no pending task remains.
    pub fn take_timeout(&self, timeout: Duration) -> TaskResult<Option<Task>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.take_blocking().map(Some);
        };
        let mut state = self.inner.state();
        loop {
            if let Some(task) = self.pop(&mut state) {
                return Ok(Some(task));
            }
            if state.shutdown.is_some() {
                return Err(TaskError::Closed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (next, _) = self
                .inner
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
    }

    #[must_use]
    pub fn try_take(&self) -> Option<Task> {
        let mut state = self.inner.state();
        self.pop(&mut state)
    }

    fn pop(&self, state: &mut QueueState) -> Option<Task> {
        let task = state.tasks.pop_front()?;
        if self.inner.capacity.is_some() {
            self.inner.space.notify_one();
        }
        Some(task)
    }

    /// Closes the queue and wakes every blocked producer and consumer.
    ///
    /// With `drain` the pending tasks are still handed out; without it they
    /// are dropped, which abandons their channels. Returns how many tasks
    /// were discarded. A draining queue can later be shut down again without
    /// draining.
    pub fn shutdown(&self, drain: bool) -> usize {
        let mode = if drain {
            Shutdown::Drain
        } else {
            Shutdown::Discard
        };

        let mut state = self.inner.state();
        let pending = state.tasks.len();
        state.shutdown = match state.shutdown {
            Some(Shutdown::Discard) => Some(Shutdown::Discard),
            _ => Some(mode),
        };
        let discarded = if state.shutdown == Some(Shutdown::Discard) {
            std::mem::take(&mut state.tasks)
        } else {
            VecDeque::new()
        };
        drop(state);

        self.inner.available.notify_all();
        self.inner.space.notify_all();

        let count = discarded.len();
        // Abandon the channels outside the queue lock.
        drop(discarded);

        taskline_logs::info!(drain, pending, discarded = count, "task queue shut down");
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state().tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state().shutdown.is_some()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("TaskQueue")
            .field("pending", &state.tasks.len())
            .field("capacity", &self.inner.capacity)
            .field("shutdown", &state.shutdown)
            .finish()
    }
}
