//! Per-run sequencer over a cloned task graph.

use super::RunReport;
use crate::core::{Task, TaskFn, TaskId, TaskOutcome, TaskStatus};
use crate::errors::{FluxError, Result};
use crate::pipeline::{ExecutionStages, TaskGraph};
use crate::utils::generate_uuid_v7;
use tracing::{debug, warn};
use uuid::Uuid;

/// Answer of [`RunQueue::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTask {
    /// This task may be dispatched now.
    Ready(TaskId),
    /// Nothing is runnable until an in-flight task finishes.
    Blocked,
    /// Every task of the run is done.
    Exhausted,
}

/// The run queue of a single pipeline invocation.
///
/// Owns a deep clone of the pipeline graph, so statuses never leak into the
/// pipeline definition or into other runs.
#[derive(Debug)]
pub struct RunQueue {
    run_id: Uuid,
    pipeline_id: Uuid,
    pipeline_name: String,
    graph: TaskGraph,
    stages: ExecutionStages,
}

impl RunQueue {
    /// Creates a run queue over an already cloned graph.
    #[must_use]
    pub fn new(pipeline_id: Uuid, pipeline_name: impl Into<String>, graph: TaskGraph) -> Self {
        let stages = ExecutionStages::build(&graph);
        Self {
            run_id: generate_uuid_v7(),
            pipeline_id,
            pipeline_name: pipeline_name.into(),
            graph,
            stages,
        }
    }

    /// Creates a run holding a single task.
    #[must_use]
    pub fn single(task: Task) -> Self {
        let name = task.name().to_string();
        let (graph, _) = TaskGraph::with_root(task);
        Self::new(Uuid::nil(), name, graph)
    }

    /// Run identity.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Identity of the pipeline this run was cloned from.
    #[must_use]
    pub fn pipeline_id(&self) -> Uuid {
        self.pipeline_id
    }

    /// Name of the pipeline this run was cloned from.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// The cloned graph.
    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// The cloned execution stages.
    #[must_use]
    pub fn stages(&self) -> &ExecutionStages {
        &self.stages
    }

    /// Returns a cloned task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.graph.task(id)
    }

    /// Returns the status of a cloned task.
    #[must_use]
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.graph.status(id)
    }

    /// Looks a cloned task up by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.graph.find(name)
    }

    /// Returns the next task to dispatch.
    ///
    /// Scans stages in order and tasks in stage order, skipping done and
    /// in-flight tasks, and returns the first pending task that can run.
    #[must_use]
    pub fn next(&self) -> NextTask {
        for id in self.stages.iter() {
            let Some(status) = self.graph.status(id) else {
                continue;
            };
            if status.is_pending() && self.graph.can_run(id) {
                return NextTask::Ready(id);
            }
        }
        if self.all_done() {
            NextTask::Exhausted
        } else {
            NextTask::Blocked
        }
    }

    /// Returns true once every cloned task is done.
    #[must_use]
    pub fn all_done(&self) -> bool {
        self.graph
            .registered()
            .iter()
            .all(|id| self.graph.task(*id).is_some_and(Task::is_done))
    }

    /// Number of tasks handed to the executor and not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.graph
            .registered()
            .iter()
            .filter(|id| self.graph.status(**id).is_some_and(|s| s.is_in_flight()))
            .count()
    }

    /// Marks a pending task `Queued` and its pending dependents `UpstreamQueued`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the task is unknown or not pending.
    pub fn mark_queued(&mut self, id: TaskId) -> Result<()> {
        let task = self
            .graph
            .task(id)
            .ok_or_else(|| FluxError::InvalidArgument(format!("unknown task {id}")))?;
        if !task.status().is_pending() {
            return Err(FluxError::InvalidArgument(format!(
                "task '{}' cannot be queued from status {}",
                task.name(),
                task.status()
            )));
        }
        let dependents = task.downstream().to_vec();

        self.graph.set_status(id, TaskStatus::Queued)?;
        for down in dependents {
            if self.graph.status(down) == Some(TaskStatus::None) {
                self.graph.set_status(down, TaskStatus::UpstreamQueued)?;
            }
        }
        Ok(())
    }

    /// Moves a queued task to `Executing` and hands out its function.
    ///
    /// Returns `None` if the task is no longer queued, for instance because
    /// an upstream failure reached it meanwhile.
    pub fn begin(&mut self, id: TaskId) -> Option<TaskFn> {
        match self.graph.status(id) {
            Some(TaskStatus::Queued) => {
                self.graph.set_status(id, TaskStatus::Executing).ok()?;
                self.graph.task(id).map(Task::func)
            }
            Some(status) => {
                debug!(task = %id, %status, "skipping task that is no longer queued");
                None
            }
            None => None,
        }
    }

    /// Records the outcome of an execution.
    ///
    /// Returns the tasks a failure cascaded into.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the handle is unknown.
    pub fn complete(&mut self, id: TaskId, outcome: TaskOutcome) -> Result<Vec<TaskId>> {
        self.graph.record_outcome(id, outcome)
    }

    /// Dispatches and runs the next task on the calling thread.
    ///
    /// Returns what [`next`](Self::next) answered before running.
    ///
    /// # Errors
    ///
    /// Propagates bookkeeping errors; task failures only show in statuses.
    pub fn run_next(&mut self) -> Result<NextTask> {
        let next = self.next();
        if let NextTask::Ready(id) = next {
            self.mark_queued(id)?;
            self.graph.run_task(id)?;
        }
        Ok(next)
    }

    /// Runs every task on the calling thread, bypassing any executor.
    ///
    /// # Errors
    ///
    /// Propagates bookkeeping errors; task failures only show in statuses.
    pub fn run_to_completion(&mut self) -> Result<RunReport> {
        loop {
            match self.run_next()? {
                NextTask::Ready(_) => {}
                NextTask::Exhausted => break,
                NextTask::Blocked => {
                    warn!(run_id = %self.run_id, "run stalled with nothing in flight");
                    break;
                }
            }
        }
        Ok(RunReport::from_queue(self, 0.0))
    }
}
