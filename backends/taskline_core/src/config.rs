use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use derive_more::derive::From;
use serde::Deserialize;

/// Environment variable overriding [`PoolConfig::workers`].
pub const NUM_WORKERS_ENV: &str = "TASKLINE_NUM_WORKERS";

pub const DEFAULT_THREAD_NAME: &str = "taskline-worker";

#[derive(Debug, From)]
pub enum ConfigError {
    IOError(std::io::Error),

    DeserializationFailed(toml::de::Error),

    #[from(ignore)]
    Invalid(String),
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IOError(err) => Some(err),
            ConfigError::DeserializationFailed(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid(reason) => write!(f, "invalid pool configuration: {reason}"),
            _ => write!(f, "{self:?}"),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for a [`crate::WorkerPool`] and its queue.
///
/// Every field is optional in TOML:
///
/// ```toml
/// workers = 4
/// capacity = 128
/// thread_name = "ingest"
/// stack_size = 1048576
/// drain_on_drop = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub workers: usize,
    /// Bounded queue capacity; unbounded when absent.
    pub capacity: Option<usize>,
    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,
    pub stack_size: Option<usize>,
    /// Whether dropping an unjoined pool drains (true) or discards the queue.
    pub drain_on_drop: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: max_workers(),
            capacity: None,
            thread_name: String::from(DEFAULT_THREAD_NAME),
            stack_size: None,
            drain_on_drop: true,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Reads a TOML file, applies the environment override and validates.
    ///
    /// # Errors
    ///
    /// Io, parse and validation failures.
    pub fn from_path<V: Into<PathBuf>>(target: V) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(target.into())?;
        Self::parse(&content)
    }

    /// Parses TOML text, applies the environment override and validates.
    ///
    /// # Errors
    ///
    /// Parse and validation failures.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Replaces `workers` with [`NUM_WORKERS_ENV`] when it holds a positive
    /// number.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(workers @ 1..) = env::var(NUM_WORKERS_ENV)
            .ok()
            .and_then(|value| usize::from_str(value.trim()).ok())
        {
            tracing::debug!("Retrieved worker count {} from {}", workers, NUM_WORKERS_ENV);
            self.workers = workers;
        }
        self
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for zero workers, zero capacity, an empty
    /// thread name or a zero stack size.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid(String::from("workers must be at least 1")));
        }
        if self.capacity == Some(0) {
            return Err(ConfigError::Invalid(String::from("capacity must be at least 1")));
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::Invalid(String::from("thread_name must not be empty")));
        }
        if self.stack_size == Some(0) {
            return Err(ConfigError::Invalid(String::from("stack_size must be at least 1")));
        }
        Ok(())
    }
}

/// Worker count the platform reports, falling back to 1.
pub(crate) fn max_workers() -> usize {
    match std::thread::available_parallelism()
        .ok()
        .map(std::num::NonZeroUsize::get)
    {
        Some(system_value) => {
            tracing::debug!("thread::available_parallelism() reported: {}", system_value);
            system_value
        }
        None => 1,
    }
}
