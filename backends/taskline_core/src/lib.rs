//! # taskline_core
//!
//! A small concurrent runtime: producers submit closures to a [`TaskQueue`],
//! a fixed [`WorkerPool`] executes them, and every submission hands back a
//! [`FutureHandle`] through which the result (or the task's failure) is
//! delivered.
//!
//! ```
//! use taskline_core::WorkerPool;
//!
//! let mut pool = WorkerPool::start(2).expect("spawn workers");
//! let answer = pool.submit(|| 6 * 7).expect("queue is open");
//! assert_eq!(answer.get().expect("task succeeds"), 42);
//!
//! pool.shutdown(true);
//! pool.join_all().expect("workers exit cleanly");
//! ```

mod channel;
mod config;
mod error;
mod launch;
mod pool;
mod queue;
mod sink;
mod task;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use launch::*;
pub use pool::*;
pub use queue::*;
pub use sink::*;
pub use task::*;

pub use taskline_sync::{OnceError, OncePolicy, OnceRegistry, SyncError};
