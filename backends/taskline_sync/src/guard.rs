//! Scoped mutual exclusion with deferred and timed acquisition.
//!
//! [`SyncLock`] bundles the protected value with the lock itself, so the
//! only way to reach the value is through a [`SyncGuard`] (or the
//! [`SyncLock::with`] helper, which holds a guard for the duration of the
//! closure). The guard releases the lock when it goes out of scope on any
//! exit path: normal return, early return via `?`, or unwinding.
//!
//! Locking is built on a `std::sync::Mutex<bool>` "held" flag paired with a
//! `Condvar`; the inner std mutex is only ever held for the few instructions
//! needed to flip the flag, never while user code runs. This is what allows
//! timed acquisition (`try_lock_for`, `try_lock_until`), which
//! `std::sync::Mutex` does not offer.
//!
//! Re-acquiring a `SyncLock` from the thread that already holds it
//! deadlocks. Avoiding that is the caller's responsibility; use
//! [`crate::ReentrantLock`] where nested acquisition is intended.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::{SyncError, SyncResult};

/// Source of the process-wide lock ordering used by multi-lock acquisition.
static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// A mutual-exclusion lock owning the value it protects.
///
/// # Examples
///
/// ```
/// use taskline_sync::SyncLock;
///
/// let counter = SyncLock::new(0_u32);
/// {
///     let mut value = counter.lock();
///     *value += 1;
/// } // released here
/// assert_eq!(counter.with(|value| *value), 1);
/// ```
pub struct SyncLock<T: ?Sized> {
    id: u64,
    held: Mutex<bool>,
    released: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by the `held` flag; only the guard
// that flipped it to `true` dereferences the cell.
unsafe impl<T: ?Sized + Send> Send for SyncLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SyncLock<T> {}

impl<T> SyncLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
            held: Mutex::new(false),
            released: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for SyncLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> SyncLock<T> {
    /// Position of this lock in the global acquisition order.
    #[must_use]
    pub fn order(&self) -> u64 {
        self.id
    }

    /// Blocks until the lock is held by the caller.
    pub fn lock(&self) -> SyncGuard<'_, T> {
        self.raw_lock();
        SyncGuard::adopt(self)
    }

    /// Acquires the lock only if it is free right now.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WouldBlock`] when another guard holds the lock.
    pub fn try_lock(&self) -> SyncResult<SyncGuard<'_, T>> {
        if self.raw_try_lock() {
            Ok(SyncGuard::adopt(self))
        } else {
            Err(SyncError::WouldBlock)
        }
    }

    /// Waits at most `timeout` for the lock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockTimeout`] when the lock stayed held for the
    /// whole duration.
    pub fn try_lock_for(&self, timeout: Duration) -> SyncResult<SyncGuard<'_, T>> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.try_lock_until(deadline),
            None => Ok(self.lock()),
        }
    }

    /// Waits until `deadline` for the lock.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LockTimeout`] when the deadline passes first.
    pub fn try_lock_until(&self, deadline: Instant) -> SyncResult<SyncGuard<'_, T>> {
        if self.raw_lock_until(deadline) {
            Ok(SyncGuard::adopt(self))
        } else {
            Err(SyncError::LockTimeout)
        }
    }

    /// Returns a guard bound to this lock that does not hold it yet.
    ///
    /// Call [`SyncGuard::lock`] (or one of its `try_` variants) on the
    /// returned guard to acquire it later within the same scope.
    pub fn lock_deferred(&self) -> SyncGuard<'_, T> {
        SyncGuard {
            lock: self,
            owns: false,
            _marker: PhantomData,
        }
    }

    /// Runs `f` with the lock held and releases it before returning.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Mutable access without locking; the borrow checker already proves
    /// exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Reports whether some guard currently holds the lock. The answer can
    /// be stale by the time the caller looks at it.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        *self.flag()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn raw_lock(&self) {
        let mut held = self.flag();
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    pub(crate) fn raw_try_lock(&self) -> bool {
        let mut held = self.flag();
        if *held {
            return false;
        }
        *held = true;
        true
    }

    pub(crate) fn raw_lock_until(&self, deadline: Instant) -> bool {
        let mut held = self.flag();
        while *held {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = next;
        }
        *held = true;
        true
    }

    pub(crate) fn raw_unlock(&self) {
        let mut held = self.flag();
        *held = false;
        drop(held);
        self.released.notify_one();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SyncLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SyncLock");
        debug.field("order", &self.id);
        match self.try_lock() {
            Ok(guard) => debug.field("data", &&*guard),
            Err(_) => debug.field("data", &format_args!("<locked>")),
        };
        debug.finish()
    }
}

/// Scoped acquisition of a [`SyncLock`].
///
/// A guard is movable, so it can be handed back from a function to transfer
/// ownership of the critical section, but it is never cloned. It may hold
/// the lock or not ([`SyncGuard::owns_lock`]); dereferencing a guard that
/// does not hold the lock is a contract violation and panics.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SyncGuard<'a, T: ?Sized + 'a> {
    lock: &'a SyncLock<T>,
    owns: bool,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T: ?Sized> SyncGuard<'a, T> {
    /// Wraps a lock the caller has already acquired through `raw_lock`.
    pub(crate) fn adopt(lock: &'a SyncLock<T>) -> Self {
        Self {
            lock,
            owns: true,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn owns_lock(&self) -> bool {
        self.owns
    }

    /// Acquires the underlying lock if this guard does not already hold it.
    pub fn lock(&mut self) {
        if !self.owns {
            self.lock.raw_lock();
            self.owns = true;
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError::WouldBlock`] when the lock is held elsewhere.
    pub fn try_lock(&mut self) -> SyncResult<()> {
        if !self.owns {
            if !self.lock.raw_try_lock() {
                return Err(SyncError::WouldBlock);
            }
            self.owns = true;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SyncError::LockTimeout`] when `timeout` elapses first.
    pub fn try_lock_for(&mut self, timeout: Duration) -> SyncResult<()> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.try_lock_until(deadline),
            None => {
                self.lock();
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError::LockTimeout`] when `deadline` passes first.
    pub fn try_lock_until(&mut self, deadline: Instant) -> SyncResult<()> {
        if !self.owns {
            if !self.lock.raw_lock_until(deadline) {
                return Err(SyncError::LockTimeout);
            }
            self.owns = true;
        }
        Ok(())
    }

    /// Releases the lock early while keeping the guard around for a later
    /// [`SyncGuard::lock`]. No-op when the lock is not held.
    pub fn unlock(&mut self) {
        if self.owns {
            self.owns = false;
            self.lock.raw_unlock();
        }
    }

    /// The lock this guard belongs to.
    #[must_use]
    pub fn source(&self) -> &'a SyncLock<T> {
        self.lock
    }
}

impl<T: ?Sized> Deref for SyncGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        assert!(self.owns, "SyncGuard accessed without holding its lock");
        // SAFETY: `owns` means this guard flipped the held flag.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SyncGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        assert!(self.owns, "SyncGuard accessed without holding its lock");
        // SAFETY: as above, and `&mut self` keeps the access unique.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SyncGuard<'_, T> {
    fn drop(&mut self) {
        self.unlock();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SyncGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.owns {
            fmt::Debug::fmt(&**self, f)
        } else {
            f.write_str("SyncGuard(<not held>)")
        }
    }
}
