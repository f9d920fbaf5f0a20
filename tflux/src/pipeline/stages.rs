//! Execution stages: a layered topological order of the task graph.

use super::TaskGraph;
use crate::core::TaskId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Tasks grouped by depth from the root.
///
/// Stage 0 holds the root. Every task appears in exactly one stage, the one
/// at its longest forward distance from the root, so all upstream tasks of a
/// task live in earlier stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStages {
    stages: Vec<Vec<TaskId>>,
    task_count: usize,
}

impl ExecutionStages {
    /// Computes the stages of the tasks reachable from the graph root.
    #[must_use]
    pub fn build(graph: &TaskGraph) -> Self {
        let Some(root) = graph.root() else {
            return Self::default();
        };

        let reachable = reachable_from(graph, root);

        // Count incoming edges from reachable tasks only.
        let mut remaining: HashMap<TaskId, usize> = reachable
            .iter()
            .map(|&id| {
                let count = graph
                    .task(id)
                    .map_or(0, |t| t.upstream().iter().filter(|u| reachable.contains(*u)).count());
                (id, count)
            })
            .collect();

        let mut stages = vec![vec![root]];
        loop {
            let mut next = Vec::new();
            let current = stages.last().map_or(&[][..], Vec::as_slice);
            for &id in current {
                let Some(task) = graph.task(id) else { continue };
                for &down in task.downstream() {
                    if let Some(count) = remaining.get_mut(&down) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next.push(down);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            stages.push(next);
        }

        let task_count = stages.iter().map(Vec::len).sum();
        Self { stages, task_count }
    }

    /// The stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Vec<TaskId>] {
        &self.stages
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if there is no stage (no root registered).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of distinct tasks across all stages.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.task_count
    }

    /// Iterates over every task, stage by stage.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.stages.iter().flatten().copied()
    }

    /// Returns the stage index of a task.
    #[must_use]
    pub fn stage_of(&self, id: TaskId) -> Option<usize> {
        self.stages.iter().position(|stage| stage.contains(&id))
    }
}

fn reachable_from(graph: &TaskGraph, root: TaskId) -> HashSet<TaskId> {
    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        let Some(task) = graph.task(id) else { continue };
        for &down in task.downstream() {
            if seen.insert(down) {
                queue.push_back(down);
            }
        }
    }
    seen
}
