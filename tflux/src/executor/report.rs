//! Run reports.

use super::RunQueue;
use crate::core::TaskStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final (or current) state of one task in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Task name.
    pub name: String,
    /// Identity of the cloned task.
    pub task_id: Uuid,
    /// Status at the time of the report.
    pub status: TaskStatus,
    /// Informational output of a successful execution.
    pub output: Option<String>,
    /// Error message of a failed execution.
    pub error: Option<String>,
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identity.
    pub run_id: Uuid,
    /// Pipeline identity.
    pub pipeline_id: Uuid,
    /// Pipeline name.
    pub pipeline_name: String,
    /// Per-task state in stage order.
    pub tasks: Vec<TaskReport>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Builds a report from the current state of a run queue.
    #[must_use]
    pub fn from_queue(queue: &RunQueue, duration_ms: f64) -> Self {
        let tasks = queue
            .stages()
            .iter()
            .filter_map(|id| queue.task(id))
            .map(|task| TaskReport {
                name: task.name().to_string(),
                task_id: task.id(),
                status: task.status(),
                output: task.output().map(str::to_string),
                error: task.error().map(str::to_string),
            })
            .collect();

        Self {
            run_id: queue.run_id(),
            pipeline_id: queue.pipeline_id(),
            pipeline_name: queue.pipeline_name().to_string(),
            tasks,
            duration_ms,
        }
    }

    /// Returns true if every task succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Success)
    }

    /// Returns true if every task reached a done status.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_done())
    }

    /// Status of the first task with the given name.
    #[must_use]
    pub fn status_of(&self, name: &str) -> Option<TaskStatus> {
        self.tasks.iter().find(|t| t.name == name).map(|t| t.status)
    }

    /// Names of tasks that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> Vec<&str> {
        self.names_with(TaskStatus::Success)
    }

    /// Names of tasks whose function failed.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.names_with(TaskStatus::Failed)
    }

    /// Names of tasks skipped because an upstream task failed.
    #[must_use]
    pub fn upstream_failed(&self) -> Vec<&str> {
        self.names_with(TaskStatus::UpstreamFailed)
    }

    fn names_with(&self, status: TaskStatus) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use anyhow::anyhow;

    #[test]
    fn test_report_partitions_statuses() {
        let mut pipeline = Pipeline::new("report");
        let a = pipeline.task_fn("a", || Ok("fine".to_string()));
        let b = pipeline.task_fn("b", || Err(anyhow!("broken")));
        let c = pipeline.task_fn("c", || Ok(String::new()));
        let _ = pipeline.from(a).go_to(b).go_to(c);

        let report = pipeline.queue().run_to_completion().unwrap();

        assert_eq!(report.pipeline_name, "report");
        assert_eq!(report.pipeline_id, pipeline.id());
        assert_eq!(report.succeeded(), vec!["a"]);
        assert_eq!(report.failed(), vec!["b"]);
        assert_eq!(report.upstream_failed(), vec!["c"]);
        assert_eq!(report.status_of("b"), Some(TaskStatus::Failed));
        assert!(report.is_done());
        assert!(!report.is_success());

        let b_report = &report.tasks[1];
        assert_eq!(b_report.error.as_deref(), Some("broken"));
        assert!(b_report.output.is_none());
    }

    #[test]
    fn test_report_serializes() {
        let mut pipeline = Pipeline::new("json");
        let a = pipeline.task_fn("a", || Ok(String::new()));
        pipeline.add_start(a).unwrap();

        let report = pipeline.queue().run_to_completion().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tasks"][0]["status"], "success");
        assert_eq!(json["pipeline_name"], "json");
    }
}
