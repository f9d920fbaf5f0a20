//! Pipeline shapes used across tests and benchmarks.

use super::ExecutionRecorder;
use crate::core::TaskId;
use crate::pipeline::Pipeline;

/// Handles of a diamond pipeline `a -> {b, c} -> d`.
#[derive(Debug, Clone, Copy)]
pub struct Diamond {
    /// Start task.
    pub a: TaskId,
    /// Left branch.
    pub b: TaskId,
    /// Right branch.
    pub c: TaskId,
    /// Join task.
    pub d: TaskId,
}

/// Builds `a -> {b, c} -> d` from recording tasks. `c` fails if `c_fails`.
#[must_use]
pub fn diamond_pipeline(recorder: &ExecutionRecorder, c_fails: bool) -> (Pipeline, Diamond) {
    let mut pipeline = Pipeline::new("diamond");
    let a = pipeline.add_task(recorder.task("a"));
    let b = pipeline.add_task(recorder.task("b"));
    let c = if c_fails {
        pipeline.add_task(recorder.failing_task("c"))
    } else {
        pipeline.add_task(recorder.task("c"))
    };
    let d = pipeline.add_task(recorder.task("d"));

    let _ = pipeline.from(a).fan_out(&[b, c]);
    let _ = pipeline.from(b).go_to(d);
    let _ = pipeline.from(c).go_to(d);
    (pipeline, Diamond { a, b, c, d })
}

/// Builds a chain of recording tasks in the order of `names`.
#[must_use]
pub fn linear_pipeline(
    name: &str,
    recorder: &ExecutionRecorder,
    names: &[&str],
) -> (Pipeline, Vec<TaskId>) {
    let mut pipeline = Pipeline::new(name);
    let ids: Vec<TaskId> = names
        .iter()
        .map(|n| pipeline.add_task(recorder.task(*n)))
        .collect();
    if let Some((&first, rest)) = ids.split_first() {
        let mut linker = pipeline.from(first);
        for &next in rest {
            linker = linker.go_to(next);
        }
    }
    (pipeline, ids)
}

/// Builds `layers` layers of `width` no-op tasks, each task linked to every
/// task of the next layer, below a single start task.
#[must_use]
pub fn wide_pipeline(width: usize, layers: usize) -> Pipeline {
    let mut pipeline = Pipeline::new("wide");
    let start = pipeline.task_fn("start", || Ok(String::new()));
    let _ = pipeline.from(start);
    let mut previous = vec![start];
    for layer in 0..layers {
        let current: Vec<TaskId> = (0..width)
            .map(|i| pipeline.task_fn(format!("t{layer}_{i}"), || Ok(String::new())))
            .collect();
        for &up in &previous {
            let _ = pipeline.from(up).fan_out(&current);
        }
        previous = current;
    }
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diamond_shape() {
        let recorder = ExecutionRecorder::new();
        let (pipeline, ids) = diamond_pipeline(&recorder, false);
        assert_eq!(
            pipeline.execution_stages().stages(),
            &[vec![ids.a], vec![ids.b, ids.c], vec![ids.d]]
        );
    }

    #[test]
    fn test_linear_shape() {
        let recorder = ExecutionRecorder::new();
        let (pipeline, ids) = linear_pipeline("chain", &recorder, &["x", "y", "z"]);
        assert_eq!(ids.len(), 3);
        assert_eq!(pipeline.execution_stages().len(), 3);
    }

    #[test]
    fn test_wide_shape() {
        let pipeline = wide_pipeline(4, 3);
        let stages = pipeline.execution_stages();
        assert_eq!(stages.len(), 4);
        assert_eq!(stages.task_count(), 13);
    }
}
