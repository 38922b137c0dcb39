//! One-shot promise/future channel.
//!
//! [`channel`] returns the writer-end ([`Promise`]) and the reader-end
//! ([`FutureHandle`]). Exactly one outcome is ever recorded per channel:
//! a value, an error, or abandonment (the promise dropped unwritten).
//! The outcome lives behind a mutex and readers park on a condition
//! variable, so the write happens-before every read that observes it.
//!
//! A [`FutureHandle`] is read once: [`FutureHandle::get`] consumes it.
//! Call [`FutureHandle::share`] to get a clonable [`SharedFuture`] whose
//! readers all observe the same outcome.

use std::fmt;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::{BoxedError, TaskError, TaskFailure, TaskResult};

/// Result of a bounded wait on a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// A value or an error is available.
    Ready,

    /// The bound expired; nothing was consumed or changed.
    Timeout,

    /// The promise was dropped without being completed.
    Abandoned,
}

enum Slot<T> {
    Pending,
    Value(T),
    Failed(TaskFailure),
    Abandoned,
    /// The single reader already took the outcome.
    Taken,
}

impl<T> Slot<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    fn status(&self) -> WaitStatus {
        match self {
            Slot::Pending => WaitStatus::Timeout,
            Slot::Abandoned => WaitStatus::Abandoned,
            Slot::Value(_) | Slot::Failed(_) | Slot::Taken => WaitStatus::Ready,
        }
    }
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    completed: Condvar,
}

impl<T> Shared<T> {
    fn slot(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self) -> MutexGuard<'_, Slot<T>> {
        let slot = self.slot();
        self.completed
            .wait_while(slot, |slot| slot.is_pending())
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until(&self, deadline: Instant) -> WaitStatus {
        let mut slot = self.slot();
        while slot.is_pending() {
            let now = Instant::now();
            if now >= deadline {
                return WaitStatus::Timeout;
            }
            let (next, _) = self
                .completed
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = next;
        }
        slot.status()
    }

    /// A timeout too large to express as a deadline waits without one.
    fn wait_for(&self, timeout: Duration) -> WaitStatus {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => self.wait().status(),
        }
    }

    /// Records the outcome unless one is already there.
    fn complete(&self, outcome: Slot<T>) -> TaskResult<()> {
        let mut slot = self.slot();
        if !slot.is_pending() {
            return Err(TaskError::AlreadySatisfied);
        }
        *slot = outcome;
        drop(slot);
        self.completed.notify_all();
        Ok(())
    }
}

/// Creates a connected promise/future pair.
#[must_use]
pub fn channel<T>() -> (Promise<T>, FutureHandle<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        completed: Condvar::new(),
    });
    (
        Promise {
            shared: Arc::clone(&shared),
            satisfied: false,
        },
        FutureHandle { shared },
    )
}

/// Writer-end of a channel. Write it once; dropping it unwritten abandons
/// the channel and readers get [`TaskError::BrokenChannel`].
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
    satisfied: bool,
}

impl<T> Promise<T> {
    /// Completes the channel with `value`.
    ///
    /// # Errors
    ///
    /// [`TaskError::AlreadySatisfied`] when a value or error was already set.
    pub fn set_value(&mut self, value: T) -> TaskResult<()> {
        self.settle(Slot::Value(value))
    }

    /// Completes the channel with a failure instead of a value.
    ///
    /// # Errors
    ///
    /// [`TaskError::AlreadySatisfied`] when a value or error was already set.
    pub fn set_error<E>(&mut self, err: E) -> TaskResult<()>
    where
        E: Into<BoxedError>,
    {
        self.settle(Slot::Failed(TaskFailure::new(err)))
    }

    /// # Errors
    ///
    /// [`TaskError::AlreadySatisfied`] when a value or error was already set.
    pub fn set_failure(&mut self, failure: TaskFailure) -> TaskResult<()> {
        self.settle(Slot::Failed(failure))
    }

    /// Consumes the promise and records `outcome`; a fresh promise can
    /// always be settled, so nothing is returned.
    pub(crate) fn fulfil(mut self, outcome: Result<T, TaskFailure>) {
        let slot = match outcome {
            Ok(value) => Slot::Value(value),
            Err(failure) => Slot::Failed(failure),
        };
        if self.settle(slot).is_err() {
            taskline_logs::warn!("promise settled twice, dropping second outcome");
        }
    }

    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    fn settle(&mut self, outcome: Slot<T>) -> TaskResult<()> {
        if self.satisfied {
            return Err(TaskError::AlreadySatisfied);
        }
        self.shared.complete(outcome)?;
        self.satisfied = true;
        Ok(())
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.satisfied {
            // Fails only if already completed, which `satisfied` rules out.
            let _ = self.shared.complete(Slot::Abandoned);
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("satisfied", &self.satisfied)
            .finish()
    }
}

/// Single-reader end of a channel.
#[must_use = "a future does nothing unless its outcome is read"]
pub struct FutureHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> FutureHandle<T> {
    /// Blocks until the channel completes and returns its outcome.
    ///
    /// # Errors
    ///
    /// - [`TaskError::TaskFailure`] when the writer stored an error.
    /// - [`TaskError::BrokenChannel`] when the writer was dropped unwritten.
    pub fn get(self) -> TaskResult<T> {
        let mut slot = self.shared.wait();
        match mem::replace(&mut *slot, Slot::Taken) {
            Slot::Value(value) => Ok(value),
            Slot::Failed(failure) => Err(TaskError::TaskFailure(failure)),
            Slot::Abandoned | Slot::Pending | Slot::Taken => Err(TaskError::BrokenChannel),
        }
    }

    /// Takes the outcome if the channel already completed, otherwise hands
    /// the handle back.
    ///
    /// # Errors
    ///
    /// `Err(self)` while the channel is still pending.
    pub fn try_get(self) -> Result<TaskResult<T>, Self> {
        if self.is_ready() {
            Ok(self.get())
        } else {
            Err(self)
        }
    }

    /// Blocks until the channel completes without consuming the outcome.
    pub fn wait(&self) {
        drop(self.shared.wait());
    }

    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.shared.wait_for(timeout)
    }

    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        self.shared.wait_until(deadline)
    }

    /// Non-blocking check for a completed (or abandoned) channel.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.shared.slot().is_pending()
    }

    /// Converts into a reader that can be cloned and read many times.
    pub fn share(self) -> SharedFuture<T> {
        SharedFuture {
            shared: self.shared,
        }
    }
}

impl<T> fmt::Debug for FutureHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Multi-reader end of a channel. Every clone observes the same outcome.
pub struct SharedFuture<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> SharedFuture<T> {
    /// Blocks until completion and returns a copy of the outcome.
    ///
    /// # Errors
    ///
    /// Same as [`FutureHandle::get`]; every reader receives the same error.
    pub fn get(&self) -> TaskResult<T> {
        let slot = self.shared.wait();
        match &*slot {
            Slot::Value(value) => Ok(value.clone()),
            Slot::Failed(failure) => Err(TaskError::TaskFailure(failure.clone())),
            Slot::Abandoned | Slot::Pending | Slot::Taken => Err(TaskError::BrokenChannel),
        }
    }

    /// Non-blocking [`SharedFuture::get`]; `None` while pending.
    #[must_use]
    pub fn try_get(&self) -> Option<TaskResult<T>> {
        if self.is_ready() {
            Some(self.get())
        } else {
            None
        }
    }
}

impl<T> SharedFuture<T> {
    pub fn wait(&self) {
        drop(self.shared.wait());
    }

    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.shared.wait_for(timeout)
    }

    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        self.shared.wait_until(deadline)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.shared.slot().is_pending()
    }
}

impl<T> fmt::Debug for SharedFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}
