//! One queue per worker category.
//!
//! A task lives in exactly one of `pending`, `in_flight` or `finished`.
//! `pending` is kept sorted: highest priority first, then oldest first.

use casework_core::TaskId;
use chrono::{DateTime, Utc};

use crate::types::{NewTask, QueueMetrics, QueueStatus, Task, TaskStatus, WorkerCategory};

/// Where a task currently sits in its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Waiting.
    Pending,
    /// Assigned or running.
    InFlight,
    /// Terminal, kept for history.
    Finished,
}

/// Pending, in-flight and finished tasks of one category plus its metrics.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    category: WorkerCategory,
    pending: Vec<Task>,
    in_flight: Vec<Task>,
    finished: Vec<Task>,
    capacity: usize,
    paused: bool,
    metrics: QueueMetrics,
}

/// Stamp a new pending task.
pub(crate) fn build_task(new: NewTask, default_max_retries: u32) -> Task {
    let now = Utc::now();
    Task {
        id: TaskId::new(),
        task_type: new.task_type,
        priority: new.priority,
        case_id: new.case_id,
        data: new.data,
        status: TaskStatus::Pending,
        assigned_agent: None,
        dependencies: new.dependencies,
        created: now,
        updated: now,
        assigned_at: None,
        deadline: new.deadline,
        progress: None,
        retry_count: 0,
        max_retries: new.max_retries.unwrap_or(default_max_retries),
        error: None,
    }
}

impl TaskQueue {
    /// Empty, running queue.
    pub fn new(category: WorkerCategory, capacity: usize) -> Self {
        Self {
            category,
            pending: Vec::new(),
            in_flight: Vec::new(),
            finished: Vec::new(),
            capacity: capacity.max(1),
            paused: false,
            metrics: QueueMetrics::default(),
        }
    }

    /// Category served.
    pub fn category(&self) -> WorkerCategory {
        self.category
    }

    /// Pending tasks in service order.
    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    /// In-flight tasks in assignment order.
    pub fn in_flight(&self) -> &[Task] {
        &self.in_flight
    }

    /// Finished tasks in completion order.
    pub fn finished(&self) -> &[Task] {
        &self.finished
    }

    /// Every task of the queue.
    pub fn all(&self) -> impl Iterator<Item = &Task> {
        self.pending
            .iter()
            .chain(self.in_flight.iter())
            .chain(self.finished.iter())
    }

    /// Whether the in-flight set is below capacity.
    pub fn has_capacity(&self) -> bool {
        self.in_flight.len() < self.capacity
    }

    /// Whether the queue is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Current metrics.
    pub fn metrics(&self) -> QueueMetrics {
        self.metrics
    }

    /// Snapshot for display.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            category: self.category,
            pending: self.pending.len(),
            processing: self.in_flight.len(),
            capacity: self.capacity,
            paused: self.paused,
            metrics: self.metrics,
        }
    }

    /// Locate a task.
    pub fn find(&self, id: &TaskId) -> Option<(Slot, &Task)> {
        if let Some(t) = self.pending.iter().find(|t| &t.id == id) {
            return Some((Slot::Pending, t));
        }
        if let Some(t) = self.in_flight.iter().find(|t| &t.id == id) {
            return Some((Slot::InFlight, t));
        }
        self.finished
            .iter()
            .find(|t| &t.id == id)
            .map(|t| (Slot::Finished, t))
    }

    pub(crate) fn find_mut(&mut self, id: &TaskId) -> Option<(Slot, &mut Task)> {
        if let Some(t) = self.pending.iter_mut().find(|t| &t.id == id) {
            return Some((Slot::Pending, t));
        }
        self.in_flight
            .iter_mut()
            .find(|t| &t.id == id)
            .map(|t| (Slot::InFlight, t))
    }

    /// Insert into `pending` and restore service order.
    pub(crate) fn enqueue(&mut self, task: Task) {
        self.pending.push(task);
        self.sort_pending();
    }

    fn sort_pending(&mut self) {
        // stable: equal (priority, created) keep insertion order
        self.pending.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| a.created.cmp(&b.created))
        });
    }

    /// Remove a task from `pending` or `in_flight`.
    pub(crate) fn take(&mut self, id: &TaskId) -> Option<(Slot, Task)> {
        if let Some(pos) = self.pending.iter().position(|t| &t.id == id) {
            return Some((Slot::Pending, self.pending.remove(pos)));
        }
        self.in_flight
            .iter()
            .position(|t| &t.id == id)
            .map(|pos| (Slot::InFlight, self.in_flight.remove(pos)))
    }

    pub(crate) fn push_in_flight(&mut self, task: Task) {
        self.in_flight.push(task);
    }

    /// Move a terminal task into history and fold it into the metrics.
    pub(crate) fn finish(&mut self, task: Task, now: DateTime<Utc>) {
        let started = task.assigned_at.unwrap_or(task.created);
        #[allow(clippy::cast_precision_loss)]
        let elapsed_ms = (now - started).num_milliseconds().max(0) as f64;
        self.record(task.status == TaskStatus::Completed, elapsed_ms);
        self.finished.push(task);
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&mut self, success: bool, elapsed_ms: f64) {
        let m = &mut self.metrics;
        m.total_processed += 1;
        let n = m.total_processed as f64;
        let outcome = if success { 100.0 } else { 0.0 };
        m.success_rate = (m.success_rate * (n - 1.0) + outcome) / n;
        m.average_processing_time_ms = (m.average_processing_time_ms * (n - 1.0) + elapsed_ms) / n;
    }
}
