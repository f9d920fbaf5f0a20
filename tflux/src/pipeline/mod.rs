//! Pipeline building.
//!
//! This module provides:
//! - The task graph arena with cycle-safe linking
//! - Execution stage computation
//! - The pipeline builder with its fluent linking API

mod builder;
mod graph;
mod stages;

pub use builder::{Pipeline, TaskLinker};
pub use graph::TaskGraph;
pub use stages::ExecutionStages;
