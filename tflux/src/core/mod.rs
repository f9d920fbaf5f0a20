//! Core domain model types for tflux.
//!
//! - Task status enum and its done/failure predicates
//! - The task entity and arena handle
//! - Task function outcomes

mod status;
mod task;

pub use status::TaskStatus;
pub use task::{Task, TaskFn, TaskId, TaskOutcome};
