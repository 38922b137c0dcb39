//! Atomic acquisition of more than one lock.
//!
//! Locking two resources one by one from different call sites in different
//! orders is the classic circular-wait deadlock: thread A holds `x` and waits
//! for `y` while thread B holds `y` and waits for `x`. Every function in this
//! module acquires its locks in the global order given by
//! [`SyncLock::order`], whatever order the caller names them in, and then
//! hands back guards that adopt the already-held locks.
//!
//! When two resources must always be used together prefer [`LockPair`]: it
//! owns both locks and has no way to lock one of them on its own.

use std::time::{Duration, Instant};

use crate::{SyncError, SyncGuard, SyncLock, SyncResult};

/// Locks `a` and `b` together, returning the guards in argument order.
///
/// # Panics
///
/// Panics when `a` and `b` are the same lock, which would otherwise
/// deadlock on itself.
pub fn lock_both<'a, 'b, A: ?Sized, B: ?Sized>(
    a: &'a SyncLock<A>,
    b: &'b SyncLock<B>,
) -> (SyncGuard<'a, A>, SyncGuard<'b, B>) {
    assert_ne!(a.order(), b.order(), "lock_both called with the same lock twice");

    if a.order() < b.order() {
        a.raw_lock();
        b.raw_lock();
    } else {
        b.raw_lock();
        a.raw_lock();
    }

    (SyncGuard::adopt(a), SyncGuard::adopt(b))
}

/// Bounded variant of [`lock_both`]. Either both locks are acquired before
/// `deadline` or neither is held when this returns.
///
/// # Errors
///
/// Returns [`SyncError::LockTimeout`] when `deadline` passes first.
///
/// # Panics
///
/// Panics when `a` and `b` are the same lock.
pub fn try_lock_both_until<'a, 'b, A: ?Sized, B: ?Sized>(
    a: &'a SyncLock<A>,
    b: &'b SyncLock<B>,
    deadline: Instant,
) -> SyncResult<(SyncGuard<'a, A>, SyncGuard<'b, B>)> {
    assert_ne!(a.order(), b.order(), "lock_both called with the same lock twice");

    let a_first = a.order() < b.order();
    let acquired = if a_first {
        acquire_pair(a, b, deadline)
    } else {
        acquire_pair(b, a, deadline)
    };

    if acquired {
        Ok((SyncGuard::adopt(a), SyncGuard::adopt(b)))
    } else {
        Err(SyncError::LockTimeout)
    }
}

/// # Errors
///
/// Returns [`SyncError::LockTimeout`] when `timeout` elapses first.
///
/// # Panics
///
/// Panics when `a` and `b` are the same lock.
pub fn try_lock_both_for<'a, 'b, A: ?Sized, B: ?Sized>(
    a: &'a SyncLock<A>,
    b: &'b SyncLock<B>,
    timeout: Duration,
) -> SyncResult<(SyncGuard<'a, A>, SyncGuard<'b, B>)> {
    match Instant::now().checked_add(timeout) {
        Some(deadline) => try_lock_both_until(a, b, deadline),
        None => Ok(lock_both(a, b)),
    }
}

fn acquire_pair<X: ?Sized, Y: ?Sized>(
    first: &SyncLock<X>,
    second: &SyncLock<Y>,
    deadline: Instant,
) -> bool {
    if !first.raw_lock_until(deadline) {
        return false;
    }
    if !second.raw_lock_until(deadline) {
        first.raw_unlock();
        return false;
    }
    true
}

/// Locks every lock in `locks` together; the guards come back in the same
/// order as `locks`.
///
/// # Panics
///
/// Panics when the same lock appears more than once.
pub fn lock_all<'a, T: ?Sized>(locks: &[&'a SyncLock<T>]) -> Vec<SyncGuard<'a, T>> {
    let mut ordered: Vec<usize> = (0..locks.len()).collect();
    ordered.sort_by_key(|index| locks[*index].order());

    for pair in ordered.windows(2) {
        assert_ne!(
            locks[pair[0]].order(),
            locks[pair[1]].order(),
            "lock_all called with the same lock twice"
        );
    }

    for index in &ordered {
        locks[*index].raw_lock();
    }

    locks.iter().map(|lock| SyncGuard::adopt(*lock)).collect()
}

/// Two resources that are only ever locked together.
///
/// # Examples
///
/// ```
/// use taskline_sync::LockPair;
///
/// let accounts = LockPair::new(100_i64, 0_i64);
/// accounts.with(|from, to| {
///     *from -= 40;
///     *to += 40;
/// });
/// assert_eq!(accounts.into_inner(), (60, 40));
/// ```
pub struct LockPair<A, B> {
    first: SyncLock<A>,
    second: SyncLock<B>,
}

impl<A, B> LockPair<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self {
            first: SyncLock::new(first),
            second: SyncLock::new(second),
        }
    }

    pub fn lock(&self) -> (SyncGuard<'_, A>, SyncGuard<'_, B>) {
        lock_both(&self.first, &self.second)
    }

    /// # Errors
    ///
    /// Returns [`SyncError::LockTimeout`] when `timeout` elapses first.
    pub fn try_lock_for(
        &self,
        timeout: Duration,
    ) -> SyncResult<(SyncGuard<'_, A>, SyncGuard<'_, B>)> {
        try_lock_both_for(&self.first, &self.second, timeout)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut A, &mut B) -> R) -> R {
        let (mut first, mut second) = self.lock();
        f(&mut first, &mut second)
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first.into_inner(), self.second.into_inner())
    }
}

impl<A: Default, B: Default> Default for LockPair<A, B> {
    fn default() -> Self {
        Self::new(A::default(), B::default())
    }
}
