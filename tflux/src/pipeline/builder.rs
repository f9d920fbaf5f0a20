//! Pipeline: a named task graph builder.

use super::{ExecutionStages, TaskGraph};
use crate::core::{Task, TaskId};
use crate::errors::Result;
use crate::executor::RunQueue;
use crate::utils::generate_uuid;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// A named graph of tasks that can be queued for any number of runs.
#[derive(Debug)]
pub struct Pipeline {
    /// Pipeline identity.
    id: Uuid,
    /// Human readable name.
    name: String,
    /// The owned task graph.
    graph: TaskGraph,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_uuid(),
            name: name.into(),
            graph: TaskGraph::new(),
        }
    }

    /// Returns the pipeline identity.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying graph.
    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Returns a task by handle.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.graph.task(id)
    }

    /// Adds a task to the pipeline without linking it.
    pub fn add_task(&mut self, task: Task) -> TaskId {
        self.graph.insert(task)
    }

    /// Builds a task from a name and function and adds it.
    pub fn task_fn<F>(&mut self, name: impl Into<String>, func: F) -> TaskId
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.graph.insert(Task::new(name, func))
    }

    /// Registers the start task.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or another start task is
    /// already registered.
    pub fn add_start(&mut self, task: TaskId) -> Result<()> {
        self.graph.register_root(task)
    }

    /// Links `upstream -> task`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `upstream` is not part of the graph yet, `CyclicGraph`
    /// if the link would create a cycle.
    pub fn add_link(&mut self, upstream: TaskId, task: TaskId) -> Result<()> {
        self.graph.try_add_link(upstream, task)
    }

    /// Removes the link `upstream -> task`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the link does not exist, `InvalidArgument` if it is
    /// the last link keeping `task` attached to the start task.
    pub fn remove_link(&mut self, upstream: TaskId, task: TaskId) -> Result<()> {
        self.graph.remove_link(upstream, task)
    }

    /// Starts a fluent chain of links from `task`.
    ///
    /// Registers `task` as the start task if none exists yet.
    ///
    /// # Panics
    ///
    /// Panics if `task` is not a handle of this pipeline.
    pub fn from(&mut self, task: TaskId) -> TaskLinker<'_> {
        if self.graph.root().is_none() {
            if let Err(e) = self.graph.register_root(task) {
                panic!("invalid pipeline definition for '{}': {e}", self.name);
            }
        }
        TaskLinker {
            pipeline: self,
            task,
        }
    }

    /// Computes the execution stages from the start task.
    #[must_use]
    pub fn execution_stages(&self) -> ExecutionStages {
        ExecutionStages::build(&self.graph)
    }

    /// Clones the current topology into a fresh run queue.
    #[must_use]
    pub fn queue(&self) -> RunQueue {
        let graph = self.graph.clone_for_run();
        debug!(
            pipeline = %self.name,
            tasks = graph.registered().len(),
            "cloned pipeline for a new run"
        );
        RunQueue::new(self.id, self.name.clone(), graph)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self
            .graph
            .root()
            .and_then(|id| self.graph.task(id))
            .map_or("<none>", Task::name);
        write!(
            f,
            "Pipeline '{}' ({} tasks, start: {root})",
            self.name,
            self.graph.registered().len()
        )
    }
}

/// Fluent linking cursor returned by [`Pipeline::from`].
///
/// Linking errors are treated as programming errors in the pipeline
/// definition and panic.
#[derive(Debug)]
pub struct TaskLinker<'a> {
    pipeline: &'a mut Pipeline,
    task: TaskId,
}

impl<'a> TaskLinker<'a> {
    /// Links the current task to `next` and moves the cursor to `next`.
    ///
    /// # Panics
    ///
    /// Panics if the link is refused (unknown task, unregistered upstream,
    /// or a cycle).
    #[must_use = "the returned linker continues the chain"]
    pub fn go_to(self, next: TaskId) -> TaskLinker<'a> {
        if let Err(e) = self.pipeline.graph.try_add_link(self.task, next) {
            panic!(
                "invalid pipeline definition for '{}': {e}",
                self.pipeline.name
            );
        }
        TaskLinker {
            pipeline: self.pipeline,
            task: next,
        }
    }

    /// Links the current task to every task of `next`, keeping the cursor.
    ///
    /// # Panics
    ///
    /// Panics if any link is refused.
    #[must_use = "the returned linker continues the chain"]
    pub fn fan_out(self, next: &[TaskId]) -> TaskLinker<'a> {
        for &task in next {
            if let Err(e) = self.pipeline.graph.try_add_link(self.task, task) {
                panic!(
                    "invalid pipeline definition for '{}': {e}",
                    self.pipeline.name
                );
            }
        }
        self
    }

    /// The task under the cursor.
    #[must_use]
    pub fn task(&self) -> TaskId {
        self.task
    }
}
