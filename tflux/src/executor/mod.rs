//! Running pipelines.
//!
//! This module provides:
//! - [`RunQueue`]: the per-run sequencer over a cloned graph
//! - [`Executor`]: the shared single-worker dispatcher
//! - [`RunHandle`] and [`RunReport`] to observe runs
//! - [`ExecutorConfig`] with environment overrides

mod config;
mod dispatcher;
mod handle;
mod report;
mod run_queue;

pub use config::{ExecutorConfig, ENV_BLOCKING_POOL, ENV_QUEUE_CAPACITY, ENV_WORKER_NAME};
pub use dispatcher::Executor;
pub use handle::RunHandle;
pub use report::{RunReport, TaskReport};
pub use run_queue::{NextTask, RunQueue};

#[cfg(test)]
mod integration_tests;
