//! Lock that the owning thread may acquire again while already holding it.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::{SyncError, SyncResult};

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<ThreadId>,
    depth: usize,
}

/// A mutual-exclusion lock allowing nested acquisition from the thread that
/// already holds it.
///
/// Only shared access to the value is handed out, since two nested guards on
/// one thread would otherwise alias a `&mut`. Wrap the value in a `Cell` or
/// `RefCell` when it needs mutation.
pub struct ReentrantLock<T: ?Sized> {
    ownership: Mutex<Ownership>,
    released: Condvar,
    data: T,
}

// SAFETY: only one thread at a time can observe `data` through a guard.
unsafe impl<T: ?Sized + Send> Send for ReentrantLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for ReentrantLock<T> {}

impl<T> ReentrantLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            ownership: Mutex::new(Ownership::default()),
            released: Condvar::new(),
            data: value,
        }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T: ?Sized> ReentrantLock<T> {
    fn ownership(&self) -> MutexGuard<'_, Ownership> {
        self.ownership
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the lock, or deepens the current hold when the calling
    /// thread already owns it.
    pub fn lock(&self) -> ReentrantGuard<'_, T> {
        let me = thread::current().id();
        let mut state = self.ownership();
        loop {
            match state.owner {
                Some(owner) if owner == me => break,
                None => {
                    state.owner = Some(me);
                    break;
                }
                Some(_) => {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        state.depth += 1;
        ReentrantGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError::WouldBlock`] when another thread holds the lock.
    pub fn try_lock(&self) -> SyncResult<ReentrantGuard<'_, T>> {
        let me = thread::current().id();
        let mut state = self.ownership();
        match state.owner {
            Some(owner) if owner != me => return Err(SyncError::WouldBlock),
            _ => {
                state.owner = Some(me);
                state.depth += 1;
            }
        }
        Ok(ReentrantGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// How many guards the owning thread currently holds.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.ownership().depth
    }

    fn release(&self) {
        let mut state = self.ownership();
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for ReentrantLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrantLock")
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

/// Scoped hold on a [`ReentrantLock`]. Bound to the acquiring thread.
#[must_use = "the hold is released as soon as the guard is dropped"]
pub struct ReentrantGuard<'a, T: ?Sized + 'a> {
    lock: &'a ReentrantLock<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T: ?Sized> Deref for ReentrantGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.lock.data
    }
}

impl<T: ?Sized> Drop for ReentrantGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
