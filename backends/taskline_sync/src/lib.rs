//! Synchronization primitives used by the taskline runtime.
//!
//! - [`SyncLock`] / [`SyncGuard`]: a mutex whose guard releases on every exit
//!   path and which supports deferred, timed and non-blocking acquisition.
//! - [`ReentrantLock`]: the variant for intentional nested acquisition on the
//!   same thread.
//! - [`lock_both`], [`lock_all`] and [`LockPair`]: atomic multi-lock
//!   acquisition in a global order so that two call sites can never
//!   circular-wait on each other.
//! - [`OnceInitializer`] and [`OnceRegistry`]: run initialization logic
//!   exactly once regardless of how many threads race to trigger it.

mod error;
mod guard;
mod multi;
mod once;
mod reentrant;
mod registry;

pub use error::*;
pub use guard::*;
pub use multi::*;
pub use once::*;
pub use reentrant::*;
pub use registry::*;
