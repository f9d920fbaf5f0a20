//! Testing utilities for tflux pipelines.
//!
//! This module provides:
//! - Task fixtures that succeed, fail, panic or record their execution
//! - Ready-made pipeline shapes (linear, diamond, wide)

mod fixtures;
mod mocks;

pub use fixtures::{diamond_pipeline, linear_pipeline, wide_pipeline, Diamond};
pub use mocks::{failing_task, panicking_task, succeeding_task, ExecutionRecorder};
