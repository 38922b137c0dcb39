//! One-off launches outside a pool.
//!
//! [`spawn_async`] runs a computation on its own thread right away;
//! [`defer`] postpones it until the caller asks for the result and then runs
//! it on the caller's thread.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{FutureHandle, PackagedTask, TaskError, TaskFailure, TaskResult, WaitStatus};

const ASYNC_THREAD_NAME: &str = "taskline-async";

/// Handle to a computation running on a dedicated thread.
///
/// Dropping the handle joins the thread, so the computation never outlives
/// its handle.
#[must_use = "dropping an AsyncResult blocks until the computation finishes"]
pub struct AsyncResult<T> {
    future: Option<FutureHandle<T>>,
    thread: Option<JoinHandle<()>>,
}

/// Starts `f` on a new thread named `taskline-async`.
///
/// # Errors
///
/// [`TaskError::Spawn`] if the OS refuses the thread.
pub fn spawn_async<F, T>(f: F) -> TaskResult<AsyncResult<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (task, future) = PackagedTask::new(f);
    let thread = thread::Builder::new()
        .name(String::from(ASYNC_THREAD_NAME))
        .spawn(move || {
            let _ = task.run();
        })
        .map_err(|err| TaskError::Spawn(err.to_string()))?;

    Ok(AsyncResult {
        future: Some(future),
        thread: Some(thread),
    })
}

impl<T> AsyncResult<T> {
    /// Waits for the computation, joins its thread and returns the outcome.
    ///
    /// # Errors
    ///
    /// [`TaskError::TaskFailure`] when the computation panicked.
    pub fn get(mut self) -> TaskResult<T> {
        let outcome = match self.future.take() {
            Some(future) => future.get(),
            None => Err(TaskError::BrokenChannel),
        };
        self.join();
        outcome
    }

    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.future
            .as_ref()
            .map_or(WaitStatus::Abandoned, |future| future.wait_for(timeout))
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.future.as_ref().is_some_and(FutureHandle::is_ready)
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            // The task catches its own panics, so the thread cannot fail.
            let _ = thread.join();
        }
    }
}

impl<T> Drop for AsyncResult<T> {
    fn drop(&mut self) {
        self.join();
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// A computation that runs on the caller's thread when its result is
/// requested, and never if it is not.
#[must_use = "a deferred computation only runs when `get` is called"]
pub struct Deferred<T> {
    job: Box<dyn FnOnce() -> T + Send + 'static>,
}

pub fn defer<F, T>(f: F) -> Deferred<T>
where
    F: FnOnce() -> T + Send + 'static,
{
    Deferred { job: Box::new(f) }
}

impl<T> Deferred<T> {
    /// Runs the computation now.
    ///
    /// # Errors
    ///
    /// [`TaskError::TaskFailure`] when the computation panicked.
    pub fn get(self) -> TaskResult<T> {
        panic::catch_unwind(AssertUnwindSafe(self.job))
            .map_err(|payload| TaskError::TaskFailure(TaskFailure::from_panic(payload)))
    }

    /// Hands the computation to a channel so it can be read like any other
    /// future once run.
    pub fn into_packaged(self) -> (PackagedTask<T>, FutureHandle<T>)
    where
        T: Send + 'static,
    {
        PackagedTask::new(self.job)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}
