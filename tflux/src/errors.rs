//! Error types for the tflux engine.
//!
//! Graph and pipeline construction errors are returned to the caller of the
//! mutation API. Task execution failures are never surfaced as errors: they
//! are recorded on the task as a [`TaskStatus::Failed`](crate::core::TaskStatus)
//! status together with the failure message.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, FluxError>;

/// The main error type for tflux operations.
#[derive(Debug, Clone, Error)]
pub enum FluxError {
    /// A task handle or argument was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced task or edge is not registered in the graph.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Adding an edge would have created a cycle.
    #[error("{0}")]
    CyclicGraph(#[from] CycleDetectedError),

    /// The executor worker is gone and cannot accept more tasks.
    #[error("Executor closed: {0}")]
    ExecutorClosed(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid schedule definition.
    #[error("{0}")]
    Schedule(#[from] ScheduleError),
}

impl FluxError {
    /// Returns a stable, machine readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "FLUX-001-INVALID_ARGUMENT",
            Self::NotFound(_) => "FLUX-002-NOT_FOUND",
            Self::CyclicGraph(_) => "FLUX-003-CYCLE",
            Self::ExecutorClosed(_) => "FLUX-004-EXECUTOR_CLOSED",
            Self::Config(_) => "FLUX-005-CONFIG",
            Self::Schedule(_) => "FLUX-006-SCHEDULE",
        }
    }

    /// Returns true if the error is a rejected cyclic edge.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CyclicGraph(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        if let Self::CyclicGraph(cycle) = self {
            map.insert("upstream".to_string(), serde_json::json!(cycle.upstream));
            map.insert("downstream".to_string(), serde_json::json!(cycle.downstream));
        }

        map
    }
}

/// Error raised when a link would make the task graph cyclic.
///
/// Names both endpoints of the rejected edge.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Link '{upstream}' -> '{downstream}' causes a cyclic graph")]
pub struct CycleDetectedError {
    /// Name of the upstream endpoint.
    pub upstream: String,
    /// Name of the downstream endpoint.
    pub downstream: String,
    /// Identity of the upstream endpoint.
    pub upstream_id: Uuid,
    /// Identity of the downstream endpoint.
    pub downstream_id: Uuid,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(
        upstream: impl Into<String>,
        upstream_id: Uuid,
        downstream: impl Into<String>,
        downstream_id: Uuid,
    ) -> Self {
        Self {
            upstream: upstream.into(),
            downstream: downstream.into(),
            upstream_id,
            downstream_id,
        }
    }
}

/// Errors raised while building a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Random interval bounds are inverted.
    #[error("The lower bound of a random interval ({lower}) must not exceed the upper bound ({upper})")]
    InvertedBounds {
        /// Lower bound.
        lower: u32,
        /// Upper bound.
        upper: u32,
    },

    /// A pattern schedule needs at least one delta.
    #[error("A pattern schedule needs at least one interval")]
    EmptyPattern,

    /// A cron expression does not have exactly five fields.
    #[error("A cron expression has five fields, got {0}")]
    FieldCount(usize),

    /// A cron field value could not be parsed as an integer.
    #[error("Invalid {field} value '{value}'")]
    Parse {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },

    /// A cron field value is outside the allowed range.
    #[error("Invalid {field} {value}, must be between {min} and {max} inclusive")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u32,
        /// Inclusive minimum.
        min: u32,
        /// Inclusive maximum.
        max: u32,
    },

    /// A cron range has its lower bound above its upper bound.
    #[error("Lower bound is larger than upper bound in {field} range {lower}-{upper}")]
    InvertedRange {
        /// Field name.
        field: &'static str,
        /// Lower bound.
        lower: u32,
        /// Upper bound.
        upper: u32,
    },
}
