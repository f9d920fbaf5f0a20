//! Caller side of a running pipeline.

use super::dispatcher::RunShared;
use super::RunReport;
use crate::core::{TaskId, TaskStatus};
use crate::errors::{FluxError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to a run started with [`Executor::run`](super::Executor::run).
///
/// Task handles of the pipeline are not valid here: the run owns a clone
/// with its own arena. Look tasks up by name with [`find`](Self::find).
pub struct RunHandle {
    shared: Arc<RunShared>,
    run_id: Uuid,
    pipeline_name: String,
    dispatch: JoinHandle<Result<RunReport>>,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("run_id", &self.run_id)
            .field("pipeline_name", &self.pipeline_name)
            .field("finished", &self.dispatch.is_finished())
            .finish_non_exhaustive()
    }
}

impl RunHandle {
    pub(crate) fn new(
        shared: Arc<RunShared>,
        run_id: Uuid,
        pipeline_name: String,
        dispatch: JoinHandle<Result<RunReport>>,
    ) -> Self {
        Self {
            shared,
            run_id,
            pipeline_name,
            dispatch,
        }
    }

    /// Run identity.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Name of the pipeline being run.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// Looks a cloned task up by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.shared.queue.lock().find(name)
    }

    /// Current status of a cloned task.
    #[must_use]
    pub fn status_of(&self, task: TaskId) -> Option<TaskStatus> {
        self.shared.queue.lock().status(task)
    }

    /// Current status of the first cloned task named `name`.
    #[must_use]
    pub fn status_by_name(&self, name: &str) -> Option<TaskStatus> {
        let queue = self.shared.queue.lock();
        queue.find(name).and_then(|id| queue.status(id))
    }

    /// Report over the current, possibly unfinished, state of the run.
    #[must_use]
    pub fn snapshot(&self) -> RunReport {
        self.shared.report()
    }

    /// Returns true once the dispatch loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.dispatch.is_finished()
    }

    /// Waits for the dispatch loop and returns the final report.
    ///
    /// # Errors
    ///
    /// `ExecutorClosed` if the executor stopped before the run finished or
    /// the dispatch loop was aborted.
    pub async fn wait(self) -> Result<RunReport> {
        let run_id = self.run_id;
        self.dispatch.await.map_err(|e| {
            FluxError::ExecutorClosed(format!("dispatch loop of run {run_id} ended abnormally: {e}"))
        })?
    }
}
