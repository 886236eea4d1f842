//! Dependency readiness.

use casework_core::TaskId;

use crate::types::{Task, TaskStatus};

/// Whether a task's required dependencies let it start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Every required dependency is in an accepted status.
    Ready,
    /// Some required dependencies have not got there yet (or are unknown).
    Waiting(Vec<TaskId>),
    /// A required dependency finished in a status it does not accept; the
    /// task can never become ready.
    Blocked(TaskId),
}

impl Readiness {
    /// Whether the task may start.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Evaluate `task`'s required dependencies, resolving each dependency's
/// current status through `status_of`. An unknown dependency counts as
/// unmet. Optional dependencies are ignored.
pub fn readiness(task: &Task, status_of: impl Fn(&TaskId) -> Option<TaskStatus>) -> Readiness {
    let mut waiting = Vec::new();
    for dep in task.required_dependencies() {
        match status_of(&dep.task_id) {
            Some(status) if dep.accepted.contains(&status) => {}
            Some(status) if status.is_terminal() => return Readiness::Blocked(dep.task_id.clone()),
            _ => waiting.push(dep.task_id.clone()),
        }
    }
    if waiting.is_empty() {
        Readiness::Ready
    } else {
        Readiness::Waiting(waiting)
    }
}
