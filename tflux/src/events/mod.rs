//! Run lifecycle events.
//!
//! The executor reports what happens to each run through an [`EventSink`].
//! Event names are dotted strings; payloads are JSON objects carrying the
//! run, pipeline and task identities.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A run was handed to the executor.
pub const RUN_STARTED: &str = "run.started";
/// A task was marked queued and sent to the worker.
pub const TASK_QUEUED: &str = "task.queued";
/// The worker started executing a task.
pub const TASK_STARTED: &str = "task.started";
/// A task function returned successfully.
pub const TASK_SUCCEEDED: &str = "task.succeeded";
/// A task function returned an error or panicked.
pub const TASK_FAILED: &str = "task.failed";
/// A task was skipped because an upstream task failed.
pub const TASK_UPSTREAM_FAILED: &str = "task.upstream_failed";
/// A dispatch loop finished.
pub const RUN_COMPLETED: &str = "run.completed";
