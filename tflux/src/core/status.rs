//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a task.
///
/// Variants are declared in order of severity, so `Ord` compares severity.
/// `Failed` and `UpstreamFailed` are contagious: setting either on a task
/// marks every transitive downstream task `UpstreamFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has not been touched yet.
    None,
    /// An upstream task has been queued.
    UpstreamQueued,
    /// Task was handed to the executor.
    Queued,
    /// Task function is running.
    Executing,
    /// Task function returned successfully.
    Success,
    /// A transitive upstream task failed, so this task never ran.
    UpstreamFailed,
    /// Task function returned an error or panicked.
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::UpstreamQueued => write!(f, "upstream_queued"),
            Self::Queued => write!(f, "queued"),
            Self::Executing => write!(f, "executing"),
            Self::Success => write!(f, "success"),
            Self::UpstreamFailed => write!(f, "upstream_failed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl TaskStatus {
    /// Returns true if the task will not change status again within a run.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Success | Self::UpstreamFailed | Self::Failed)
    }

    /// Returns true if the status cascades `UpstreamFailed` downstream.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::UpstreamFailed | Self::Failed)
    }

    /// Returns true if the task was handed to the executor and has not finished.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Queued | Self::Executing)
    }

    /// Returns true if the task is still waiting to be dispatched.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::None | Self::UpstreamQueued)
    }
}
