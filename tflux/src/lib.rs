//! # tflux
//!
//! A lightweight workflow engine for directed acyclic task graphs.
//!
//! Tasks are linked into a graph that encodes execution order. A run clones
//! the graph and executes each task only after all of its upstream tasks
//! succeeded; a failure marks every downstream task as skipped.
//!
//! - **Cycle-safe construction**: links that would close a cycle are refused
//!   and rolled back
//! - **Stages**: the graph is layered into ordered execution stages
//! - **Independent runs**: every run works on its own clone of the graph
//! - **Shared executor**: one worker executes tasks of all runs one at a time
//! - **Schedules**: random, pattern and cron fire-time generators
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tflux::prelude::*;
//!
//! let mut pipeline = Pipeline::new("etl");
//! let extract = pipeline.task_fn("extract", || Ok("rows fetched".into()));
//! let clean = pipeline.task_fn("clean", || Ok(String::new()));
//! let load = pipeline.task_fn("load", || Ok(String::new()));
//! let _ = pipeline.from(extract).go_to(clean).go_to(load);
//!
//! let executor = Executor::start(ExecutorConfig::default())?;
//! let report = executor.run(pipeline.queue()).wait().await?;
//! assert!(report.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod observability;
pub mod pipeline;
pub mod schedule;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{Task, TaskFn, TaskId, TaskOutcome, TaskStatus};
    pub use crate::errors::{CycleDetectedError, FluxError, Result, ScheduleError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{
        Executor, ExecutorConfig, NextTask, RunHandle, RunQueue, RunReport, TaskReport,
    };
    pub use crate::observability::{init_tracing, SpanTimer};
    pub use crate::pipeline::{ExecutionStages, Pipeline, TaskGraph, TaskLinker};
    pub use crate::schedule::{CronSchedule, PatternSchedule, RandomSchedule, Schedule, TimeScale};
    pub use crate::utils::{generate_uuid, iso_timestamp};
}
