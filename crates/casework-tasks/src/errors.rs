//! Task queue error types.

use casework_core::{Classified, ErrorCategory, ErrorSeverity, TaskId};
use thiserror::Error;

use crate::types::{TaskStatus, WorkerCategory};

/// Errors from task queue operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// No pending or in-flight task has this id.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// The task cannot start while required dependencies are unmet.
    #[error("Task {id} cannot move to {requested}: waiting on {}", join_ids(.unmet))]
    DependenciesUnmet {
        /// Task being started.
        id: TaskId,
        /// Requested status.
        requested: TaskStatus,
        /// Required dependencies not yet in an accepted status.
        unmet: Vec<TaskId>,
    },

    /// The task's queue is paused or has no free slot.
    #[error("Queue {category} cannot take task {id}: {}", unavailable_reason(.paused, .at_capacity))]
    QueueUnavailable {
        /// Task being started.
        id: TaskId,
        /// Its queue.
        category: WorkerCategory,
        /// The queue is paused.
        paused: bool,
        /// The in-flight set is full.
        at_capacity: bool,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn unavailable_reason(paused: &bool, at_capacity: &bool) -> &'static str {
    match (*paused, *at_capacity) {
        (true, true) => "paused and at capacity",
        (true, false) => "paused",
        _ => "at capacity",
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(", ")
}

impl Classified for TaskError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Task
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound(_) => ErrorSeverity::Error,
            Self::DependenciesUnmet { .. } => ErrorSeverity::Warning,
            Self::QueueUnavailable { .. } => ErrorSeverity::Transient,
        }
    }
}
