//! Task lifecycle notifications.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::Task;

const DEFAULT_CAPACITY: usize = 512;

/// A change to a task, carrying its state after the change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "task")]
pub enum TaskEvent {
    /// Task entered a queue.
    #[serde(rename = "taskCreated")]
    Created(Task),
    /// Task moved into the in-flight set.
    #[serde(rename = "taskAssigned")]
    Assigned(Task),
    /// Status, progress or error changed.
    #[serde(rename = "taskUpdated")]
    Updated(Task),
    /// A failed task went back to pending with its retry count bumped.
    #[serde(rename = "taskRetried")]
    Retried(Task),
}

impl TaskEvent {
    /// The task.
    pub fn task(&self) -> &Task {
        match self {
            Self::Created(t) | Self::Assigned(t) | Self::Updated(t) | Self::Retried(t) => t,
        }
    }

    /// Event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "taskCreated",
            Self::Assigned(_) => "taskAssigned",
            Self::Updated(_) => "taskUpdated",
            Self::Retried(_) => "taskRetried",
        }
    }
}

/// Broadcast emitter for [`TaskEvent`]s.
///
/// `emit` never waits; lagging receivers miss events rather than slowing the
/// queue down.
pub struct TaskEvents {
    tx: broadcast::Sender<TaskEvent>,
    emitted: AtomicU64,
}

impl Default for TaskEvents {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TaskEvents {
    /// Emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            emitted: AtomicU64::new(0),
        }
    }

    /// Send to every subscriber. Returns how many received it.
    pub fn emit(&self, event: TaskEvent) -> usize {
        let _ = self.emitted.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Receive events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    /// Events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::build_task;
    use crate::types::{NewTask, TaskType};
    use serde_json::Value;

    fn sample() -> Task {
        build_task(NewTask::new(TaskType::ClientAnalysis, Value::Null), 3)
    }

    #[test]
    fn emit_without_subscribers() {
        let events = TaskEvents::default();
        assert_eq!(events.emit(TaskEvent::Created(sample())), 0);
        assert_eq!(events.emitted(), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let events = TaskEvents::default();
        let mut rx = events.subscribe();
        let task = sample();
        assert_eq!(events.emit(TaskEvent::Assigned(task.clone())), 1);
        let got = rx.recv().await.unwrap();
        assert_eq!(got.name(), "taskAssigned");
        assert_eq!(got.task().id, task.id);
    }

    #[test]
    fn serializes_with_event_name() {
        let v = serde_json::to_value(TaskEvent::Retried(sample())).unwrap();
        assert_eq!(v["event"], "taskRetried");
        assert_eq!(v["task"]["type"], "CLIENT_ANALYSIS");
    }
}
