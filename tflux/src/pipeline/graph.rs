//! Task graph: an index-addressed arena of tasks with cycle-safe linking.
//!
//! Tasks are inserted into the arena first and become *registered* members
//! either as the root or as the destination of an accepted edge. Every
//! upstream of a registered task is itself registered, so every registered
//! task is reachable from the root.

use crate::core::{Task, TaskId, TaskOutcome, TaskStatus};
use crate::errors::{CycleDetectedError, FluxError, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A directed acyclic graph of tasks.
#[derive(Debug, Default)]
pub struct TaskGraph {
    /// Task arena, addressed by [`TaskId`].
    tasks: Vec<Task>,
    /// Registered members in registration order.
    registered: Vec<TaskId>,
    /// Fast membership lookup for `registered`.
    members: HashSet<TaskId>,
    /// The first registered task.
    root: Option<TaskId>,
}

impl TaskGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph holding `task` as its registered root.
    pub(crate) fn with_root(task: Task) -> (Self, TaskId) {
        let mut graph = Self::new();
        let id = graph.insert(task);
        graph.root = Some(id);
        graph.mark_registered(id);
        (graph, id)
    }

    /// Moves a task into the arena. The task is not registered yet.
    pub fn insert(&mut self, task: Task) -> TaskId {
        let id = TaskId(self.tasks.len());
        self.tasks.push(task);
        id
    }

    /// Number of tasks in the arena, registered or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the arena holds no task.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns the task behind a handle.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    /// Returns the status of a task.
    #[must_use]
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.task(id).map(Task::status)
    }

    /// Iterates over every task of the arena with its handle.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks.iter().enumerate().map(|(i, t)| (TaskId(i), t))
    }

    /// Looks a task up by name, first match in arena order.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.tasks().find(|(_, t)| t.name() == name).map(|(id, _)| id)
    }

    /// The designated root, once registered.
    #[must_use]
    pub fn root(&self) -> Option<TaskId> {
        self.root
    }

    /// Registered members in registration order.
    #[must_use]
    pub fn registered(&self) -> &[TaskId] {
        &self.registered
    }

    /// Returns true if the task is a registered member.
    #[must_use]
    pub fn is_registered(&self, id: TaskId) -> bool {
        self.members.contains(&id)
    }

    /// Returns true if the edge `upstream -> downstream` exists.
    #[must_use]
    pub fn has_link(&self, upstream: TaskId, downstream: TaskId) -> bool {
        self.task(upstream)
            .is_some_and(|t| t.downstream.contains(&downstream))
    }

    /// Registers `id` as the root.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the handle is unknown or a different root is
    /// already registered. Registering the same root again is a no-op.
    pub fn register_root(&mut self, id: TaskId) -> Result<()> {
        self.check_handle(id)?;
        match self.root {
            Some(root) if root == id => Ok(()),
            Some(root) => Err(FluxError::InvalidArgument(format!(
                "graph already has root '{}', cannot register '{}' as root",
                self.tasks[root.0].name(),
                self.tasks[id.0].name()
            ))),
            None => {
                self.root = Some(id);
                self.mark_registered(id);
                debug!(task = %self.tasks[id.0].name(), "registered root task");
                Ok(())
            }
        }
    }

    /// Links `upstream -> downstream`, refusing edges that create a cycle.
    ///
    /// Re-adding an existing edge is a no-op. Any other edge is inserted
    /// tentatively and checked for cycles; on a cycle the edge lists of both
    /// endpoints are restored exactly.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if either handle is unknown.
    /// - `NotFound` if `upstream` is not registered.
    /// - `CyclicGraph` if the edge would close a cycle.
    pub fn try_add_link(&mut self, upstream: TaskId, downstream: TaskId) -> Result<()> {
        self.check_handle(upstream)?;
        self.check_handle(downstream)?;

        if !self.is_registered(upstream) {
            return Err(FluxError::NotFound(format!(
                "task '{}' ({upstream}) is not registered in the graph",
                self.tasks[upstream.0].name()
            )));
        }
        if self.has_link(upstream, downstream) {
            return Ok(());
        }

        self.tasks[upstream.0].downstream.push(downstream);
        self.tasks[downstream.0].upstream.push(upstream);

        if self.causes_cycle(downstream) {
            self.tasks[upstream.0].downstream.pop();
            self.tasks[downstream.0].upstream.pop();

            let up = &self.tasks[upstream.0];
            let down = &self.tasks[downstream.0];
            warn!(upstream = %up.name(), downstream = %down.name(), "rejected cyclic link");
            return Err(CycleDetectedError::new(up.name(), up.id(), down.name(), down.id()).into());
        }

        self.mark_registered(downstream);
        debug!(
            upstream = %self.tasks[upstream.0].name(),
            downstream = %self.tasks[downstream.0].name(),
            "linked tasks"
        );
        Ok(())
    }

    /// Removes the edge `upstream -> downstream`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if a handle is unknown, or if the removal would
    ///   leave a registered non-root task without any upstream.
    /// - `NotFound` if the edge does not exist.
    pub fn remove_link(&mut self, upstream: TaskId, downstream: TaskId) -> Result<()> {
        self.check_handle(upstream)?;
        self.check_handle(downstream)?;

        if !self.has_link(upstream, downstream) {
            return Err(FluxError::NotFound(format!(
                "no link '{}' -> '{}'",
                self.tasks[upstream.0].name(),
                self.tasks[downstream.0].name()
            )));
        }
        if self.is_registered(downstream)
            && self.root != Some(downstream)
            && self.tasks[downstream.0].upstream.len() == 1
        {
            return Err(FluxError::InvalidArgument(format!(
                "removing '{}' -> '{}' would orphan '{}' from the root",
                self.tasks[upstream.0].name(),
                self.tasks[downstream.0].name(),
                self.tasks[downstream.0].name()
            )));
        }

        remove_first(&mut self.tasks[upstream.0].downstream, downstream);
        remove_first(&mut self.tasks[downstream.0].upstream, upstream);
        Ok(())
    }

    /// Sets a task status.
    ///
    /// `Failed` and `UpstreamFailed` mark every transitive downstream task
    /// `UpstreamFailed` before returning. Returns the handles whose status
    /// the cascade changed.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the handle is unknown.
    pub fn set_status(&mut self, id: TaskId, status: TaskStatus) -> Result<Vec<TaskId>> {
        self.check_handle(id)?;
        self.tasks[id.0].set_status(status);
        if status.is_failure() {
            Ok(self.cascade_failure(id))
        } else {
            Ok(Vec::new())
        }
    }

    /// Records the outcome of an execution, cascading on failure.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the handle is unknown.
    pub fn record_outcome(&mut self, id: TaskId, outcome: TaskOutcome) -> Result<Vec<TaskId>> {
        self.check_handle(id)?;
        let failed = matches!(outcome, TaskOutcome::Failed(_));
        self.tasks[id.0].record(outcome);
        if failed {
            Ok(self.cascade_failure(id))
        } else {
            Ok(Vec::new())
        }
    }

    /// Runs a task synchronously and records its outcome.
    ///
    /// Errors and panics of the wrapped function end up in the task status,
    /// never in the return value.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the handle is unknown.
    pub fn run_task(&mut self, id: TaskId) -> Result<()> {
        self.check_handle(id)?;
        self.tasks[id.0].set_status(TaskStatus::Executing);
        let func = self.tasks[id.0].func();
        let outcome = TaskOutcome::capture(&func);
        self.record_outcome(id, outcome)?;
        Ok(())
    }

    /// Returns true if the task may run now.
    ///
    /// False for `UpstreamFailed` tasks; otherwise true iff every upstream
    /// task is exactly `Success`. Unknown handles are never runnable.
    #[must_use]
    pub fn can_run(&self, id: TaskId) -> bool {
        let Some(task) = self.task(id) else {
            return false;
        };
        if task.status() == TaskStatus::UpstreamFailed {
            return false;
        }
        task.upstream
            .iter()
            .all(|up| self.tasks[up.0].status() == TaskStatus::Success)
    }

    /// Deep-clones the registered tasks for an independent run.
    ///
    /// Every clone gets a fresh identity and status `None`; edges are
    /// rewired clone-to-clone in their original order. Registration order
    /// and the root carry over.
    #[must_use]
    pub fn clone_for_run(&self) -> Self {
        let mut clone = Self::new();
        let mut mapping: HashMap<TaskId, TaskId> = HashMap::with_capacity(self.registered.len());

        for &id in &self.registered {
            let new_id = clone.insert(self.tasks[id.0].clone_for_run());
            mapping.insert(id, new_id);
            clone.mark_registered(new_id);
        }

        for &id in &self.registered {
            let original = &self.tasks[id.0];
            let new_id = mapping[&id];
            let task = &mut clone.tasks[new_id.0];
            task.upstream = original
                .upstream
                .iter()
                .filter_map(|up| mapping.get(up).copied())
                .collect();
            task.downstream = original
                .downstream
                .iter()
                .filter_map(|down| mapping.get(down).copied())
                .collect();
        }

        clone.root = self.root.and_then(|root| mapping.get(&root).copied());
        clone
    }

    fn check_handle(&self, id: TaskId) -> Result<()> {
        if id.0 < self.tasks.len() {
            Ok(())
        } else {
            Err(FluxError::InvalidArgument(format!(
                "task handle {id} does not belong to this graph"
            )))
        }
    }

    fn mark_registered(&mut self, id: TaskId) {
        if self.members.insert(id) {
            self.registered.push(id);
        }
    }

    /// Walks upstream edges from `node` looking for `node` itself.
    ///
    /// The root is never expanded: it has no upstream.
    fn causes_cycle(&self, node: TaskId) -> bool {
        let mut stack: Vec<TaskId> = self.tasks[node.0].upstream.clone();
        let mut visited: HashSet<TaskId> = HashSet::new();

        while let Some(current) = stack.pop() {
            if current == node {
                return true;
            }
            if Some(current) == self.root || !visited.insert(current) {
                continue;
            }
            stack.extend(self.tasks[current.0].upstream.iter().copied());
        }
        false
    }

    fn cascade_failure(&mut self, origin: TaskId) -> Vec<TaskId> {
        let mut changed = Vec::new();
        let mut stack: Vec<TaskId> = self.tasks[origin.0].downstream.clone();

        while let Some(current) = stack.pop() {
            let task = &mut self.tasks[current.0];
            if task.status().is_failure() {
                continue;
            }
            task.set_status(TaskStatus::UpstreamFailed);
            changed.push(current);
            stack.extend(task.downstream.iter().copied());
        }

        if !changed.is_empty() {
            debug!(
                origin = %self.tasks[origin.0].name(),
                count = changed.len(),
                "cascaded upstream failure"
            );
        }
        changed
    }
}

fn remove_first(list: &mut Vec<TaskId>, id: TaskId) {
    if let Some(pos) = list.iter().position(|t| *t == id) {
        list.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;

    fn ok_task(name: &str) -> Task {
        Task::new(name, || Ok(String::new()))
    }

    fn graph_with(names: &[&str]) -> (TaskGraph, Vec<TaskId>) {
        let mut graph = TaskGraph::new();
        let ids = names.iter().map(|n| graph.insert(ok_task(n))).collect();
        (graph, ids)
    }

    fn edges(graph: &TaskGraph) -> Vec<(Vec<TaskId>, Vec<TaskId>)> {
        graph
            .tasks()
            .map(|(_, t)| (t.upstream().to_vec(), t.downstream().to_vec()))
            .collect()
    }

    fn assert_inverse_edges(graph: &TaskGraph) {
        for (id, task) in graph.tasks() {
            for down in task.downstream() {
                assert!(graph.task(*down).unwrap().upstream().contains(&id));
            }
            for up in task.upstream() {
                assert!(graph.task(*up).unwrap().downstream().contains(&id));
            }
        }
    }

    #[test]
    fn test_register_root() {
        let (mut graph, ids) = graph_with(&["a", "b"]);
        graph.register_root(ids[0]).unwrap();
        assert_eq!(graph.root(), Some(ids[0]));
        assert!(graph.is_registered(ids[0]));

        graph.register_root(ids[0]).unwrap();
        let err = graph.register_root(ids[1]).unwrap_err();
        assert!(matches!(err, FluxError::InvalidArgument(_)));
        assert_eq!(graph.root(), Some(ids[0]));
    }

    #[test]
    fn test_register_root_unknown_handle() {
        let mut graph = TaskGraph::new();
        let err = graph.register_root(TaskId(7)).unwrap_err();
        assert!(matches!(err, FluxError::InvalidArgument(_)));
    }

    #[test]
    fn test_with_root_registers_the_task() {
        let (mut graph, root) = TaskGraph::with_root(ok_task("solo"));
        assert_eq!(graph.root(), Some(root));
        assert_eq!(graph.registered(), &[root]);
        graph.register_root(root).unwrap();

        let other = graph.insert(ok_task("other"));
        graph.try_add_link(root, other).unwrap();
        assert!(graph.is_registered(other));
    }

    #[test]
    fn test_link_requires_registered_upstream() {
        let (mut graph, ids) = graph_with(&["a", "b", "c"]);
        graph.register_root(ids[0]).unwrap();

        let err = graph.try_add_link(ids[1], ids[2]).unwrap_err();
        assert!(matches!(err, FluxError::NotFound(_)));
        assert_eq!(graph.registered(), &[ids[0]]);
    }

    #[test]
    fn test_link_unknown_handle() {
        let (mut graph, ids) = graph_with(&["a"]);
        graph.register_root(ids[0]).unwrap();
        let err = graph.try_add_link(ids[0], TaskId(42)).unwrap_err();
        assert!(matches!(err, FluxError::InvalidArgument(_)));
    }

    #[test]
    fn test_acyclic_links_are_mutual_inverses() {
        let (mut graph, ids) = graph_with(&["a", "b", "c", "d", "e"]);
        graph.register_root(ids[0]).unwrap();
        for (up, down) in [(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (1, 4)] {
            graph.try_add_link(ids[up], ids[down]).unwrap();
        }

        assert_inverse_edges(&graph);
        assert_eq!(graph.registered().len(), 5);
        assert_eq!(graph.task(ids[3]).unwrap().upstream(), &[ids[1], ids[2]]);
    }

    #[test]
    fn test_relink_is_idempotent() {
        let (mut graph, ids) = graph_with(&["a", "b"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();

        assert_eq!(graph.task(ids[0]).unwrap().downstream(), &[ids[1]]);
        assert_eq!(graph.task(ids[1]).unwrap().upstream(), &[ids[0]]);
    }

    #[test]
    fn test_back_edge_is_rejected_and_rolled_back() {
        let (mut graph, ids) = graph_with(&["a", "b"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();
        let before = edges(&graph);

        let err = graph.try_add_link(ids[1], ids[0]).unwrap_err();
        match err {
            FluxError::CyclicGraph(cycle) => {
                assert_eq!(cycle.upstream, "b");
                assert_eq!(cycle.downstream, "a");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
        assert_eq!(edges(&graph), before);
        assert!(graph.has_link(ids[0], ids[1]));
    }

    #[test]
    fn test_cycle_between_registered_tasks_is_checked() {
        // a -> b -> c -> d, then d -> b must be refused even though b is
        // already registered.
        let (mut graph, ids) = graph_with(&["a", "b", "c", "d"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();
        graph.try_add_link(ids[1], ids[2]).unwrap();
        graph.try_add_link(ids[2], ids[3]).unwrap();
        let before = edges(&graph);

        let err = graph.try_add_link(ids[3], ids[1]).unwrap_err();
        assert!(err.is_cycle());
        assert_eq!(edges(&graph), before);
    }

    #[test]
    fn test_self_link_is_cycle() {
        let (mut graph, ids) = graph_with(&["a", "b"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();

        assert!(graph.try_add_link(ids[1], ids[1]).unwrap_err().is_cycle());
        assert!(graph.task(ids[1]).unwrap().downstream().is_empty());
    }

    #[test]
    fn test_cross_link_between_branches_is_allowed() {
        let (mut graph, ids) = graph_with(&["a", "b", "c"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();
        graph.try_add_link(ids[0], ids[2]).unwrap();
        graph.try_add_link(ids[1], ids[2]).unwrap();
        assert!(graph.try_add_link(ids[2], ids[1]).unwrap_err().is_cycle());
        assert_inverse_edges(&graph);
    }

    #[test]
    fn test_remove_link() {
        let (mut graph, ids) = graph_with(&["a", "b", "c"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();
        graph.try_add_link(ids[0], ids[2]).unwrap();
        graph.try_add_link(ids[1], ids[2]).unwrap();

        graph.remove_link(ids[1], ids[2]).unwrap();
        assert!(!graph.has_link(ids[1], ids[2]));
        assert_eq!(graph.task(ids[2]).unwrap().upstream(), &[ids[0]]);
        assert_inverse_edges(&graph);

        let err = graph.remove_link(ids[1], ids[2]).unwrap_err();
        assert!(matches!(err, FluxError::NotFound(_)));
    }

    #[test]
    fn test_remove_last_upstream_is_refused() {
        let (mut graph, ids) = graph_with(&["a", "b"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();

        let err = graph.remove_link(ids[0], ids[1]).unwrap_err();
        assert!(matches!(err, FluxError::InvalidArgument(_)));
        assert!(graph.has_link(ids[0], ids[1]));
    }

    #[test]
    fn test_can_run() {
        let (mut graph, ids) = graph_with(&["a", "b", "c"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[2]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();
        graph.try_add_link(ids[1], ids[2]).unwrap();

        assert!(graph.can_run(ids[0]));
        assert!(!graph.can_run(ids[1]));

        graph.set_status(ids[0], TaskStatus::Success).unwrap();
        assert!(graph.can_run(ids[1]));
        assert!(!graph.can_run(ids[2]));

        graph.set_status(ids[1], TaskStatus::Executing).unwrap();
        assert!(!graph.can_run(ids[2]));
        graph.set_status(ids[1], TaskStatus::Success).unwrap();
        assert!(graph.can_run(ids[2]));

        graph.set_status(ids[2], TaskStatus::UpstreamFailed).unwrap();
        assert!(!graph.can_run(ids[2]));
        assert!(!graph.can_run(TaskId(99)));
    }

    #[test]
    fn test_failure_cascades_transitively() {
        let (mut graph, ids) = graph_with(&["a", "b", "c", "d", "e"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[1]).unwrap();
        graph.try_add_link(ids[1], ids[2]).unwrap();
        graph.try_add_link(ids[2], ids[3]).unwrap();
        graph.try_add_link(ids[0], ids[4]).unwrap();

        let changed = graph.set_status(ids[1], TaskStatus::Failed).unwrap();
        assert_eq!(changed.len(), 2);
        assert_eq!(graph.status(ids[1]), Some(TaskStatus::Failed));
        assert_eq!(graph.status(ids[2]), Some(TaskStatus::UpstreamFailed));
        assert_eq!(graph.status(ids[3]), Some(TaskStatus::UpstreamFailed));
        assert_eq!(graph.status(ids[0]), Some(TaskStatus::None));
        assert_eq!(graph.status(ids[4]), Some(TaskStatus::None));
    }

    #[test]
    fn test_run_task_records_outcome() {
        let mut graph = TaskGraph::new();
        let a = graph.insert(Task::new("a", || Ok("rows=3".to_string())));
        let b = graph.insert(Task::new("b", || Err(anyhow!("timeout"))));
        let c = graph.insert(ok_task("c"));
        graph.register_root(a).unwrap();
        graph.try_add_link(a, b).unwrap();
        graph.try_add_link(b, c).unwrap();

        graph.run_task(a).unwrap();
        assert_eq!(graph.status(a), Some(TaskStatus::Success));
        assert_eq!(graph.task(a).unwrap().output(), Some("rows=3"));

        graph.run_task(b).unwrap();
        assert_eq!(graph.status(b), Some(TaskStatus::Failed));
        assert_eq!(graph.task(b).unwrap().error(), Some("timeout"));
        assert_eq!(graph.status(c), Some(TaskStatus::UpstreamFailed));
    }

    #[test]
    fn test_run_task_catches_panics() {
        let mut graph = TaskGraph::new();
        let a = graph.insert(Task::new("a", || panic!("unexpected fault")));
        let b = graph.insert(ok_task("b"));
        graph.register_root(a).unwrap();
        graph.try_add_link(a, b).unwrap();

        graph.run_task(a).unwrap();
        assert_eq!(graph.status(a), Some(TaskStatus::Failed));
        assert_eq!(graph.status(b), Some(TaskStatus::UpstreamFailed));
    }

    #[test]
    fn test_clone_for_run_is_isomorphic_and_isolated() {
        let (mut graph, ids) = graph_with(&["a", "b", "c", "d"]);
        graph.register_root(ids[0]).unwrap();
        for (up, down) in [(0, 1), (0, 2), (1, 3), (2, 3)] {
            graph.try_add_link(ids[up], ids[down]).unwrap();
        }

        let mut clone = graph.clone_for_run();
        assert_eq!(clone.registered().len(), 4);
        assert_eq!(edges(&clone), edges(&graph));
        for ((_, original), (_, copy)) in graph.tasks().zip(clone.tasks()) {
            assert_ne!(original.id(), copy.id());
            assert_eq!(original.name(), copy.name());
            assert_eq!(copy.status(), TaskStatus::None);
        }

        let root = clone.root().unwrap();
        clone.set_status(root, TaskStatus::Failed).unwrap();
        assert!(graph.tasks().all(|(_, t)| t.status() == TaskStatus::None));
    }

    #[test]
    fn test_clone_skips_unregistered_tasks() {
        let (mut graph, ids) = graph_with(&["a", "loose", "b"]);
        graph.register_root(ids[0]).unwrap();
        graph.try_add_link(ids[0], ids[2]).unwrap();

        let clone = graph.clone_for_run();
        assert_eq!(clone.len(), 2);
        assert!(clone.find("loose").is_none());
        let b = clone.find("b").unwrap();
        assert_eq!(clone.task(b).unwrap().upstream(), &[clone.root().unwrap()]);
    }
}
