//! One-time initialization with a blocking wait for late arrivals.
//!
//! The state machine follows `std::sync::Once`:
//! `NOT_STARTED -> IN_PROGRESS -> DONE`, plus a terminal `FAILED` state that
//! only [`OncePolicy::Sticky`] uses. The state lives in an `AtomicU8` so the
//! completed case is a single `Acquire` load; `DONE` is stored with `Release`
//! after the initializer returns, so any thread that reads `DONE` also sees
//! everything the initializer wrote.
//!
//! Threads that arrive while another thread is running the initializer
//! block on a condition variable until it finishes; they never spin and
//! never observe a half-initialized value.

use core::convert::Infallible;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::OnceError;

const NOT_STARTED: u8 = 0;
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;
const FAILED: u8 = 3;

const PANICKED: &str = "initializer panicked";

/// What happens after the initializer returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OncePolicy {
    /// Go back to `NotStarted`; the next caller runs its initializer again.
    #[default]
    Retry,

    /// Remember the failure; every later call returns
    /// [`OnceError::Poisoned`] without running anything.
    Sticky,
}

/// Observable progress of a [`OnceInitializer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnceState {
    NotStarted,
    InProgress,
    Done,
    Failed,
}

/// Runs an initializer exactly once across every concurrent caller.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use taskline_sync::OnceInitializer;
///
/// static OPENED: AtomicUsize = AtomicUsize::new(0);
/// let once = OnceInitializer::new();
///
/// for _ in 0..3 {
///     once.run(|| {
///         OPENED.fetch_add(1, Ordering::SeqCst);
///         Ok::<(), std::io::Error>(())
///     })
///     .expect("initializer succeeds");
/// }
/// assert_eq!(OPENED.load(Ordering::SeqCst), 1);
/// ```
pub struct OnceInitializer {
    state: AtomicU8,
    policy: OncePolicy,
    /// Guards state transitions for waiters and holds the sticky failure.
    gate: Mutex<Option<String>>,
    finished: Condvar,
}

impl OnceInitializer {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_policy(OncePolicy::Retry)
    }

    #[must_use]
    pub const fn with_policy(policy: OncePolicy) -> Self {
        Self {
            state: AtomicU8::new(NOT_STARTED),
            policy,
            gate: Mutex::new(None),
            finished: Condvar::new(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> OncePolicy {
        self.policy
    }

    #[must_use]
    pub fn state(&self) -> OnceState {
        match self.state.load(Ordering::Acquire) {
            NOT_STARTED => OnceState::NotStarted,
            IN_PROGRESS => OnceState::InProgress,
            DONE => OnceState::Done,
            _ => OnceState::Failed,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    fn gate(&self) -> MutexGuard<'_, Option<String>> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `init` unless it already completed.
    ///
    /// Exactly one caller at a time executes an initializer; callers arriving
    /// meanwhile block until it finishes and then either return `Ok(())`
    /// (success), run their own `init` (failure under [`OncePolicy::Retry`])
    /// or return [`OnceError::Poisoned`] (failure under
    /// [`OncePolicy::Sticky`]).
    ///
    /// # Errors
    ///
    /// [`OnceError::Failed`] carries the error `init` returned on this call;
    /// [`OnceError::Poisoned`] reports an earlier sticky failure.
    pub fn run<F, E>(&self, init: F) -> Result<(), OnceError<E>>
    where
        F: FnOnce() -> Result<(), E>,
        E: fmt::Display,
    {
        if self.is_done() {
            return Ok(());
        }

        let mut gate = self.gate();
        loop {
            match self.state.load(Ordering::Acquire) {
                DONE => return Ok(()),
                FAILED => {
                    return Err(OnceError::Poisoned(
                        gate.clone().unwrap_or_else(|| String::from(PANICKED)),
                    ))
                }
                IN_PROGRESS => {
                    gate = self
                        .finished
                        .wait(gate)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                _ => break,
            }
        }

        // Claimed while holding the gate, so no other caller can also see
        // NOT_STARTED here.
        self.state.store(IN_PROGRESS, Ordering::Relaxed);
        drop(gate);

        let bail = FinishOnPanic(self);
        let outcome = init();
        core::mem::forget(bail);

        match outcome {
            Ok(()) => {
                self.finish(DONE, None);
                Ok(())
            }
            Err(err) => {
                taskline_logs::warn!(policy = ?self.policy, "once initializer failed: {}", err);
                match self.policy {
                    OncePolicy::Retry => self.finish(NOT_STARTED, None),
                    OncePolicy::Sticky => self.finish(FAILED, Some(err.to_string())),
                }
                Err(OnceError::Failed(err))
            }
        }
    }

    /// Infallible convenience over [`OnceInitializer::run`].
    ///
    /// # Errors
    ///
    /// Only [`OnceError::Poisoned`] is possible, after a sticky initializer
    /// panicked.
    pub fn call_once(&self, init: impl FnOnce()) -> Result<(), OnceError<Infallible>> {
        self.run(|| {
            init();
            Ok::<(), Infallible>(())
        })
    }

    fn finish(&self, next: u8, failure: Option<String>) {
        let mut gate = self.gate();
        if failure.is_some() {
            *gate = failure;
        }
        self.state.store(next, Ordering::Release);
        drop(gate);
        self.finished.notify_all();
    }
}

impl Default for OnceInitializer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OnceInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceInitializer")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Leaves the initializer in a consistent state when `init` unwinds.
struct FinishOnPanic<'a>(&'a OnceInitializer);

impl Drop for FinishOnPanic<'_> {
    fn drop(&mut self) {
        taskline_logs::error!("once initializer panicked");
        match self.0.policy {
            OncePolicy::Retry => self.0.finish(NOT_STARTED, None),
            OncePolicy::Sticky => self.0.finish(FAILED, Some(String::from(PANICKED))),
        }
    }
}
