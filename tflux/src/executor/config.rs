//! Executor configuration.

use crate::errors::{FluxError, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`ExecutorConfig::queue_capacity`].
pub const ENV_QUEUE_CAPACITY: &str = "TFLUX_QUEUE_CAPACITY";
/// Environment variable overriding [`ExecutorConfig::blocking_pool`].
pub const ENV_BLOCKING_POOL: &str = "TFLUX_BLOCKING_POOL";
/// Environment variable overriding [`ExecutorConfig::worker_name`].
pub const ENV_WORKER_NAME: &str = "TFLUX_WORKER_NAME";

/// Configuration for the shared executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Capacity of the delivery channel between dispatch loops and the worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Run task functions on the blocking thread pool instead of the worker task.
    #[serde(default = "default_blocking_pool")]
    pub blocking_pool: bool,
    /// Name reported in log fields.
    #[serde(default = "default_worker_name")]
    pub worker_name: String,
}

fn default_queue_capacity() -> usize {
    1
}

fn default_blocking_pool() -> bool {
    true
}

fn default_worker_name() -> String {
    "tflux-executor".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            blocking_pool: default_blocking_pool(),
            worker_name: default_worker_name(),
        }
    }
}

impl ExecutorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a value cannot be parsed or fails validation.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            self.queue_capacity = raw.trim().parse().map_err(|_| {
                FluxError::Config(format!("{ENV_QUEUE_CAPACITY} must be a positive integer, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup(ENV_BLOCKING_POOL) {
            self.blocking_pool = parse_bool(&raw).ok_or_else(|| {
                FluxError::Config(format!("{ENV_BLOCKING_POOL} must be a boolean, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup(ENV_WORKER_NAME) {
            self.worker_name = raw;
        }
        self.validate()?;
        Ok(self)
    }

    /// Sets the delivery channel capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Chooses between the blocking pool and inline execution.
    #[must_use]
    pub fn with_blocking_pool(mut self, enabled: bool) -> Self {
        self.blocking_pool = enabled;
        self
    }

    /// Sets the worker name.
    #[must_use]
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero capacity or an empty worker name.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(FluxError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.worker_name.trim().is_empty() {
            return Err(FluxError::Config("worker_name must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
