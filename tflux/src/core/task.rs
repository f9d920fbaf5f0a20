//! The task entity: identity, status, wrapped function and edges.

use super::TaskStatus;
use crate::utils::generate_uuid;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

/// The function a task wraps.
///
/// Returns an informational string on success.
pub type TaskFn = Arc<dyn Fn() -> anyhow::Result<String> + Send + Sync>;

/// Handle of a task inside a [`TaskGraph`](crate::pipeline::TaskGraph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Returns the arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of invoking a task function once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The function returned `Ok` with its informational string.
    Success(String),
    /// The function returned an error or panicked.
    Failed(String),
}

impl TaskOutcome {
    /// Runs a task function, converting panics into failures.
    pub fn capture(func: &TaskFn) -> Self {
        match catch_unwind(AssertUnwindSafe(|| func())) {
            Ok(Ok(info)) => Self::Success(info),
            Ok(Err(e)) => Self::Failed(format!("{e:#}")),
            Err(panic) => Self::Failed(panic_message(panic.as_ref())),
        }
    }

    /// Returns the status this outcome settles a task into.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Success(_) => TaskStatus::Success,
            Self::Failed(_) => TaskStatus::Failed,
        }
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

/// A unit of work.
///
/// Identity is the generated [`Uuid`], never structural equality: two tasks
/// wrapping the same function are different entities.
pub struct Task {
    id: Uuid,
    name: String,
    status: TaskStatus,
    func: TaskFn,
    pub(crate) upstream: Vec<TaskId>,
    pub(crate) downstream: Vec<TaskId>,
    output: Option<String>,
    error: Option<String>,
}

impl Task {
    /// Creates a new task wrapping `func`.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::from_fn(name, Arc::new(func))
    }

    /// Creates a new task from an already shared function.
    #[must_use]
    pub fn from_fn(name: impl Into<String>, func: TaskFn) -> Self {
        Self {
            id: generate_uuid(),
            name: name.into(),
            status: TaskStatus::None,
            func,
            upstream: Vec::new(),
            downstream: Vec::new(),
            output: None,
            error: None,
        }
    }

    /// Returns the task identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns true if the task settled into a final status.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    /// Upstream edges (prerequisites).
    #[must_use]
    pub fn upstream(&self) -> &[TaskId] {
        &self.upstream
    }

    /// Downstream edges (dependents), in insertion order.
    #[must_use]
    pub fn downstream(&self) -> &[TaskId] {
        &self.downstream
    }

    /// Informational string returned by the last successful execution.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Error message of the last failed execution.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns a handle to the wrapped function.
    #[must_use]
    pub fn func(&self) -> TaskFn {
        Arc::clone(&self.func)
    }

    /// Produces a copy for a new run.
    ///
    /// Shares the name and function, gets a fresh identity, status `None` and
    /// no edges. Callers rewire edges through their clone map.
    #[must_use]
    pub fn clone_for_run(&self) -> Self {
        Self::from_fn(self.name.clone(), Arc::clone(&self.func))
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub(crate) fn record(&mut self, outcome: TaskOutcome) {
        self.status = outcome.status();
        match outcome {
            TaskOutcome::Success(info) => {
                self.output = Some(info);
                self.error = None;
            }
            TaskOutcome::Failed(err) => {
                self.output = None;
                self.error = Some(err);
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("upstream", &self.upstream)
            .field("downstream", &self.downstream)
            .finish_non_exhaustive()
    }
}
