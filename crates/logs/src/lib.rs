//! Logging macros for the taskline crates.
//!
//! Every macro forwards to `tracing` under the `taskline` target, but only
//! when the *calling* crate enables the matching feature (`log_info`,
//! `log_debug`, `log_warnings`, `log_errors`). With the feature off the
//! arguments are still type-checked, nothing is emitted.
//!
//! See similar: <https://doc.rust-lang.org/src/std/macros.rs.html#138-145>.

#[doc(hidden)]
pub use tracing;

/// Target every taskline event is emitted under.
pub const TARGET: &str = "taskline";

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => {
        if cfg!(feature = "log_info") {
            $crate::tracing::info!(target: $crate::TARGET, $($t)*);
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {
        if cfg!(feature = "log_warnings") {
            $crate::tracing::warn!(target: $crate::TARGET, $($t)*);
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => {
        if cfg!(feature = "log_debug") {
            $crate::tracing::debug!(target: $crate::TARGET, $($t)*);
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => {
        if cfg!(feature = "log_errors") {
            $crate::tracing::error!(target: $crate::TARGET, $($t)*);
        }
    };
}

/// Emits at `TRACE` level; shares the `log_debug` switch since trace output
/// is only wanted alongside debug builds of the runtime.
#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => {
        if cfg!(feature = "log_debug") {
            $crate::tracing::trace!(target: $crate::TARGET, $($t)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn emits_plain_messages() {
        info!("worker started");
        debug!("worker parked");
        warn!("queue is filling up");
        error!("task failed");
        trace!("tick");

        assert!(logs_contain("worker started"));
        assert!(logs_contain("task failed"));
    }

    #[test]
    #[traced_test]
    fn emits_structured_fields() {
        info!(worker = 3, "worker {} started", "taskline-worker-3");
        warn!(pending = 5_usize, "discarding tasks");

        assert!(logs_contain("taskline-worker-3"));
        assert!(logs_contain("pending=5"));
    }
}
