use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use derive_more::derive::From;
use taskline_sync::SyncError;

pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Failure raised by a task's own computation, captured on the worker and
/// delivered through the task's channel.
///
/// Cheap to clone so that every reader of a shared future receives the same
/// failure.
#[derive(Clone)]
pub struct TaskFailure(Arc<dyn Error + Send + Sync + 'static>);

impl TaskFailure {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<BoxedError>,
    {
        let boxed: BoxedError = err.into();
        Self(Arc::from(boxed))
    }

    /// Converts a panic payload caught with `catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_owned()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            String::from("non-string panic payload")
        };
        Self(Arc::new(TaskPanic { message }))
    }

    #[must_use]
    pub fn is_panic(&self) -> bool {
        self.0.downcast_ref::<TaskPanic>().is_some()
    }

    /// The underlying error produced by the task.
    #[must_use]
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskFailure")
            .field(&format_args!("{}", self.0))
            .finish()
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Error for TaskFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.0)
    }
}

/// Error a task reports when it panicked instead of returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPanic {
    message: String,
}

impl TaskPanic {
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TaskPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task panicked: {}", self.message)
    }
}

impl Error for TaskPanic {}

/// Every failure the runtime reports.
#[derive(Debug, Clone, From)]
pub enum TaskError {
    /// A promise was written to twice.
    AlreadySatisfied,

    /// The writer-end was dropped before a value or error was set.
    BrokenChannel,

    /// The queue was shut down (and, when draining, has run dry).
    Closed,

    /// A non-blocking submit found the bounded queue at capacity.
    Full,

    /// A bounded lock acquisition expired.
    LockTimeout,

    /// The task's computation itself failed or panicked.
    #[from]
    TaskFailure(TaskFailure),

    /// A worker thread died outside of task execution.
    WorkerPanicked { worker: String },

    /// The OS refused to spawn a thread.
    Spawn(String),
}

impl TaskError {
    #[must_use]
    pub fn is_broken_channel(&self) -> bool {
        matches!(self, TaskError::BrokenChannel)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskError::Closed)
    }

    /// The task's own failure, when that is what this error carries.
    #[must_use]
    pub fn task_failure(&self) -> Option<&TaskFailure> {
        match self {
            TaskError::TaskFailure(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<SyncError> for TaskError {
    fn from(_: SyncError) -> Self {
        // `WouldBlock` is a zero-length wait that expired.
        TaskError::LockTimeout
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskError::TaskFailure(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::AlreadySatisfied => write!(f, "promise already satisfied"),
            TaskError::BrokenChannel => write!(f, "broken channel: writer dropped without a result"),
            TaskError::Closed => write!(f, "task queue is closed"),
            TaskError::Full => write!(f, "task queue is full"),
            TaskError::LockTimeout => write!(f, "lock acquisition timed out"),
            TaskError::TaskFailure(failure) => write!(f, "task failed: {failure}"),
            TaskError::WorkerPanicked { worker } => write!(f, "worker {worker} panicked"),
            TaskError::Spawn(reason) => write!(f, "failed to spawn thread: {reason}"),
        }
    }
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;
