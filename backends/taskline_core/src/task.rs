use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::{channel, BoxedError, FutureHandle, Promise, TaskFailure};

/// Identifier assigned by a queue at submission, increasing per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// How a task's computation ended. The outcome itself has already been
/// written to the task's channel; this only feeds logs and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Completed,
    Failed,
    Panicked,
}

type Job<T> = Box<dyn FnOnce() -> Result<T, BoxedError> + Send + 'static>;

/// A computation bound to the writer-end of its own channel.
///
/// Running it consumes it, so it executes at most once. Dropping it without
/// running abandons the channel.
pub struct PackagedTask<T> {
    job: Job<T>,
    promise: Promise<T>,
}

impl<T: Send + 'static> PackagedTask<T> {
    /// Packages an infallible computation.
    pub fn new<F>(f: F) -> (Self, FutureHandle<T>)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::from_job(Box::new(move || Ok(f())))
    }

    /// Packages a computation whose `Err` is delivered as the task's failure.
    pub fn fallible<F, E>(f: F) -> (Self, FutureHandle<T>)
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BoxedError>,
    {
        Self::from_job(Box::new(move || f().map_err(Into::into)))
    }

    fn from_job(job: Job<T>) -> (Self, FutureHandle<T>) {
        let (promise, future) = channel();
        (Self { job, promise }, future)
    }

    /// Runs the computation on the current thread and settles the channel.
    /// A panic is caught and delivered as a [`TaskFailure`].
    #[must_use = "the execution kind reports whether the task failed"]
    pub fn run(self) -> Execution {
        let Self { job, promise } = self;
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(value)) => {
                promise.fulfil(Ok(value));
                Execution::Completed
            }
            Ok(Err(err)) => {
                promise.fulfil(Err(TaskFailure::new(err)));
                Execution::Failed
            }
            Err(payload) => {
                promise.fulfil(Err(TaskFailure::from_panic(payload)));
                Execution::Panicked
            }
        }
    }

    /// Erases the result type so the task can sit in a queue.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            job: Box::new(move || self.run()),
        }
    }
}

impl<T> fmt::Debug for PackagedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagedTask")
            .field("promise", &self.promise)
            .finish_non_exhaustive()
    }
}

/// A type-erased queued task.
pub struct Task {
    id: TaskId,
    job: Box<dyn FnOnce() -> Execution + Send + 'static>,
}

impl Task {
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use = "the execution kind reports whether the task failed"]
    pub fn run(self) -> Execution {
        (self.job)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}
