use core::fmt;

/// Failures returned directly by lock acquisition attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A bounded acquisition (`try_lock_for`, `try_lock_until`) expired
    /// before the lock became free.
    #[error("lock acquisition timed out")]
    LockTimeout,

    /// A non-blocking acquisition found the lock held.
    #[error("lock is currently held")]
    WouldBlock,
}

impl SyncError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::LockTimeout)
    }
}

pub type SyncResult<T> = core::result::Result<T, SyncError>;

/// Outcome of a failed [`crate::OnceInitializer::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnceError<E> {
    /// The initializer ran on this call and returned `E`.
    Failed(E),

    /// A previous attempt failed under [`crate::OncePolicy::Sticky`]; the
    /// initializer will not run again. Carries the rendered original error.
    Poisoned(String),
}

impl<E> OnceError<E> {
    /// Returns the error produced by this call's own attempt, if any.
    pub fn into_failure(self) -> Option<E> {
        match self {
            OnceError::Failed(err) => Some(err),
            OnceError::Poisoned(_) => None,
        }
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        matches!(self, OnceError::Poisoned(_))
    }
}

impl<E: fmt::Display> fmt::Display for OnceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnceError::Failed(err) => write!(f, "initialization failed: {err}"),
            OnceError::Poisoned(reason) => {
                write!(f, "initialization previously failed: {reason}")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for OnceError<E> {}
