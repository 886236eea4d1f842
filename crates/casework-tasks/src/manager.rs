//! The task queue manager.
//!
//! Owns one [`TaskQueue`] per [`WorkerCategory`] and enforces the queue
//! rules:
//!
//! - **Ordering**: pending tasks are served highest priority first, oldest
//!   first among equals
//! - **Dependency gating**: a task with unmet required dependencies never
//!   enters the in-flight set; if a required dependency finishes in a status
//!   it does not accept, the task is marked `BLOCKED`
//! - **Capacity and pause**: nothing enters the in-flight set of a paused or
//!   full queue, whether through [`TaskManager::next_task`] or a status
//!   update
//! - **Retries**: with auto-retry on, a failed task goes back to pending
//!   until its retry budget is spent; only the final outcome counts toward
//!   the metrics
//! - **History**: terminal tasks are moved to the finished set, never deleted

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use casework_core::TaskId;
use casework_settings::QueueSettings;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::deps::{Readiness, readiness};
use crate::errors::TaskError;
use crate::events::{TaskEvent, TaskEvents};
use crate::queue::{Slot, TaskQueue, build_task};
use crate::types::{
    NewTask, QueueMetrics, QueueStatus, Task, TaskPriority, TaskStatus, TaskType, WorkerCategory,
};

struct State {
    queues: BTreeMap<WorkerCategory, TaskQueue>,
    index: HashMap<TaskId, WorkerCategory>,
}

impl State {
    fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        let category = self.index.get(id)?;
        self.queues
            .get(category)?
            .find(id)
            .map(|(_, t)| t.status)
    }

    fn readiness_of(&self, task: &Task) -> Readiness {
        readiness(task, |id| self.status_of(id))
    }

    /// Mark pending tasks whose required dependency can no longer be met.
    fn block_unreachable(&mut self, now: DateTime<Utc>) -> Vec<TaskEvent> {
        let view: &Self = self;
        let doomed: Vec<(WorkerCategory, TaskId, TaskId)> = view
            .queues
            .values()
            .flat_map(|q| {
                q.pending()
                    .iter()
                    .filter(|t| t.status != TaskStatus::Blocked)
                    .filter_map(move |t| match view.readiness_of(t) {
                        Readiness::Blocked(dep) => Some((q.category(), t.id.clone(), dep)),
                        Readiness::Ready | Readiness::Waiting(_) => None,
                    })
            })
            .collect();

        let mut events = Vec::with_capacity(doomed.len());
        for (category, id, dep) in doomed {
            let Some((_, task)) = self
                .queues
                .get_mut(&category)
                .and_then(|q| q.find_mut(&id))
            else {
                continue;
            };
            task.status = TaskStatus::Blocked;
            task.updated = now;
            task.error = Some(format!("dependency {dep} did not reach an accepted status"));
            warn!(task_id = %id, dependency = %dep, "task blocked by failed dependency");
            events.push(TaskEvent::Updated(task.clone()));
        }
        events
    }
}

/// Per-category task queues.
pub struct TaskManager {
    state: Mutex<State>,
    settings: QueueSettings,
    events: TaskEvents,
}

impl TaskManager {
    /// One empty queue per category, sized by `settings.capacity`.
    pub fn new(settings: QueueSettings) -> Self {
        let queues = WorkerCategory::ALL
            .into_iter()
            .map(|c| (c, TaskQueue::new(c, settings.capacity)))
            .collect();
        Self {
            state: Mutex::new(State {
                queues,
                index: HashMap::new(),
            }),
            settings,
            events: TaskEvents::default(),
        }
    }

    /// Queue settings in effect.
    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Subscribe to task events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a pending task and queue it for its category.
    pub fn create_task(
        &self,
        task_type: TaskType,
        data: Value,
        priority: TaskPriority,
        case_id: Option<String>,
    ) -> Task {
        let mut new = NewTask::new(task_type, data).priority(priority);
        new.case_id = case_id;
        self.submit(new)
    }

    /// Create a pending task from full parameters.
    pub fn submit(&self, new: NewTask) -> Task {
        let task = build_task(new, self.settings.max_retries);
        let category = task.category();
        {
            let mut state = self.state.lock();
            let _ = state.index.insert(task.id.clone(), category);
            if let Some(queue) = state.queues.get_mut(&category) {
                queue.enqueue(task.clone());
            }
        }
        info!(
            task_id = %task.id,
            task_type = %task.task_type,
            category = %category,
            priority = %task.priority,
            "task created"
        );
        let _ = self.events.emit(TaskEvent::Created(task.clone()));
        task
    }

    /// Change a pending or in-flight task's status.
    ///
    /// `progress` is clamped to 0..=100; `error` replaces the last error.
    /// Moving a pending task to ASSIGNED or IN_PROGRESS puts it in flight,
    /// which requires its required dependencies to be met and its queue to
    /// be running with a free slot. COMPLETED and
    /// FAILED are terminal: the task moves to history and the queue metrics
    /// are updated, unless a failure is retried.
    pub fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
        progress: Option<f64>,
        error: Option<String>,
    ) -> Result<Task, TaskError> {
        let now = Utc::now();
        let (task, events) = {
            let mut state = self.state.lock();
            let category = *state
                .index
                .get(id)
                .ok_or_else(|| TaskError::NotFound(id.clone()))?;

            let (slot, current) = state
                .queues
                .get(&category)
                .and_then(|q| q.find(id))
                .filter(|(slot, _)| *slot != Slot::Finished)
                .ok_or_else(|| TaskError::NotFound(id.clone()))?;
            let previous = current.status;

            if status.is_active() && slot == Slot::Pending {
                let unmet = match state.readiness_of(current) {
                    Readiness::Ready => Vec::new(),
                    Readiness::Waiting(unmet) => unmet,
                    Readiness::Blocked(dep) => vec![dep],
                };
                if !unmet.is_empty() {
                    return Err(TaskError::DependenciesUnmet {
                        id: id.clone(),
                        requested: status,
                        unmet,
                    });
                }
                if let Some(queue) = state.queues.get(&category) {
                    let paused = queue.is_paused();
                    let at_capacity = !queue.has_capacity();
                    if paused || at_capacity {
                        return Err(TaskError::QueueUnavailable {
                            id: id.clone(),
                            category,
                            paused,
                            at_capacity,
                        });
                    }
                }
            }

            let queue = state
                .queues
                .get_mut(&category)
                .ok_or_else(|| TaskError::NotFound(id.clone()))?;
            let (_, mut task) = queue
                .take(id)
                .ok_or_else(|| TaskError::NotFound(id.clone()))?;
            apply(&mut task, status, progress, error, now);

            let mut events = Vec::new();
            if status == TaskStatus::Failed
                && self.settings.auto_retry
                && previous != TaskStatus::Blocked
                && task.retry_count < task.max_retries
            {
                task.retry_count += 1;
                task.status = TaskStatus::Pending;
                task.assigned_at = None;
                task.assigned_agent = None;
                task.progress = None;
                warn!(
                    task_id = %task.id,
                    retry = task.retry_count,
                    max_retries = task.max_retries,
                    error = task.error.as_deref().unwrap_or(""),
                    "task failed, requeueing"
                );
                queue.enqueue(task.clone());
                events.push(TaskEvent::Retried(task.clone()));
            } else if status.is_terminal() {
                queue.finish(task.clone(), now);
                info!(task_id = %task.id, status = %status, category = %category, "task finished");
                events.push(TaskEvent::Updated(task.clone()));
                events.extend(state.block_unreachable(now));
            } else if status.is_active() {
                if slot == Slot::Pending {
                    task.assigned_at = Some(now);
                    let _ = task.assigned_agent.get_or_insert_with(|| category.agent_id());
                    events.push(TaskEvent::Assigned(task.clone()));
                }
                queue.push_in_flight(task.clone());
                events.push(TaskEvent::Updated(task.clone()));
            } else {
                task.assigned_at = None;
                queue.enqueue(task.clone());
                events.push(TaskEvent::Updated(task.clone()));
                events.extend(state.block_unreachable(now));
                if let Some((_, current)) = state.queues.get(&category).and_then(|q| q.find(id)) {
                    task = current.clone();
                }
            }
            (task, events)
        };

        debug!(task_id = %task.id, status = %task.status, progress = ?task.progress, "task updated");
        for event in events {
            let _ = self.events.emit(event);
        }
        Ok(task)
    }

    /// Hand the next ready task of `category` to its worker.
    ///
    /// Returns `None` when the queue is paused, at capacity, or has no
    /// pending task whose required dependencies are met.
    pub fn next_task(&self, category: WorkerCategory) -> Option<Task> {
        let now = Utc::now();
        let task = {
            let mut state = self.state.lock();
            let queue = state.queues.get(&category)?;
            if queue.is_paused() || !queue.has_capacity() {
                return None;
            }
            let id = queue
                .pending()
                .iter()
                .filter(|t| t.status != TaskStatus::Blocked)
                .find(|t| state.readiness_of(t).is_ready())
                .map(|t| t.id.clone())?;

            let queue = state.queues.get_mut(&category)?;
            let (_, mut task) = queue.take(&id)?;
            task.status = TaskStatus::Assigned;
            task.updated = now;
            task.assigned_at = Some(now);
            task.assigned_agent = Some(category.agent_id());
            queue.push_in_flight(task.clone());
            task
        };
        debug!(task_id = %task.id, category = %category, "task assigned");
        let _ = self.events.emit(TaskEvent::Assigned(task.clone()));
        Some(task)
    }

    /// Stop handing out work for `category`. Returns `false` if it was
    /// already paused.
    pub fn pause_queue(&self, category: WorkerCategory) -> bool {
        self.set_paused(category, true)
    }

    /// Resume handing out work for `category`. Returns `false` if it was
    /// not paused.
    pub fn resume_queue(&self, category: WorkerCategory) -> bool {
        self.set_paused(category, false)
    }

    fn set_paused(&self, category: WorkerCategory, paused: bool) -> bool {
        let mut state = self.state.lock();
        let Some(queue) = state.queues.get_mut(&category) else {
            return false;
        };
        if queue.is_paused() == paused {
            return false;
        }
        queue.set_paused(paused);
        info!(category = %category, paused, "queue pause state changed");
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// A task by id, including finished ones.
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        let state = self.state.lock();
        let category = state.index.get(id)?;
        state
            .queues
            .get(category)?
            .find(id)
            .map(|(_, t)| t.clone())
    }

    /// Every known task, most recently updated first.
    pub fn tasks(&self) -> Vec<Task> {
        let state = self.state.lock();
        let mut all: Vec<Task> = state
            .queues
            .values()
            .flat_map(TaskQueue::all)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.updated.cmp(&a.updated));
        all
    }

    /// Snapshot of one queue.
    pub fn get_queue_status(&self, category: WorkerCategory) -> Option<QueueStatus> {
        self.state.lock().queues.get(&category).map(TaskQueue::status)
    }

    /// Metrics of one queue.
    pub fn get_queue_metrics(&self, category: WorkerCategory) -> Option<QueueMetrics> {
        self.state.lock().queues.get(&category).map(TaskQueue::metrics)
    }

    /// Snapshots of every queue.
    pub fn queue_statuses(&self) -> Vec<QueueStatus> {
        self.state
            .lock()
            .queues
            .values()
            .map(TaskQueue::status)
            .collect()
    }

    /// Pending tasks of `category` in service order.
    pub fn pending_tasks(&self, category: WorkerCategory) -> Vec<Task> {
        self.state
            .lock()
            .queues
            .get(&category)
            .map(|q| q.pending().to_vec())
            .unwrap_or_default()
    }

    /// In-flight tasks of `category`.
    pub fn in_flight_tasks(&self, category: WorkerCategory) -> Vec<Task> {
        self.state
            .lock()
            .queues
            .get(&category)
            .map(|q| q.in_flight().to_vec())
            .unwrap_or_default()
    }

    /// In-flight tasks with no update for longer than `threshold`.
    pub fn stalled_tasks(&self, threshold: Duration) -> Vec<Task> {
        self.stalled_tasks_as_of(Utc::now(), threshold)
    }

    /// [`stalled_tasks`](Self::stalled_tasks) evaluated at `now`.
    pub fn stalled_tasks_as_of(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<Task> {
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
        let state = self.state.lock();
        state
            .queues
            .values()
            .flat_map(TaskQueue::in_flight)
            .filter(|t| now.signed_duration_since(t.updated) > threshold)
            .cloned()
            .collect()
    }

    /// Unfinished tasks past their deadline.
    pub fn overdue_tasks(&self) -> Vec<Task> {
        self.overdue_tasks_as_of(Utc::now())
    }

    /// [`overdue_tasks`](Self::overdue_tasks) evaluated at `now`.
    pub fn overdue_tasks_as_of(&self, now: DateTime<Utc>) -> Vec<Task> {
        let state = self.state.lock();
        state
            .queues
            .values()
            .flat_map(TaskQueue::all)
            .filter(|t| t.is_overdue_at(now))
            .cloned()
            .collect()
    }
}

fn apply(
    task: &mut Task,
    status: TaskStatus,
    progress: Option<f64>,
    error: Option<String>,
    now: DateTime<Utc>,
) {
    task.status = status;
    task.updated = now;
    if let Some(p) = progress.filter(|p| !p.is_nan()) {
        task.progress = Some(p.clamp(0.0, 100.0));
    }
    if let Some(e) = error {
        task.error = Some(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskDependency;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn manager() -> TaskManager {
        TaskManager::new(QueueSettings::default())
    }

    fn no_retry() -> TaskManager {
        TaskManager::new(QueueSettings {
            auto_retry: false,
            ..QueueSettings::default()
        })
    }

    fn report(m: &TaskManager, priority: TaskPriority) -> Task {
        m.create_task(TaskType::GenerateReport, json!({}), priority, None)
    }

    // -- create --

    #[test]
    fn create_routes_to_category_queue() {
        let m = manager();
        let t = m.create_task(
            TaskType::AssessmentReview,
            json!({"form": "IHA_CAT"}),
            TaskPriority::High,
            Some("case-1".into()),
        );
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.max_retries, 3);
        assert_eq!(t.retry_count, 0);
        assert_eq!(m.get_queue_status(WorkerCategory::Assessment).unwrap().pending, 1);
        assert_eq!(m.get_queue_status(WorkerCategory::Report).unwrap().pending, 0);
        assert_eq!(m.task(&t.id).unwrap().case_id.as_deref(), Some("case-1"));
    }

    #[tokio::test]
    async fn create_emits_event() {
        let m = manager();
        let mut rx = m.subscribe();
        let t = report(&m, TaskPriority::Low);
        let ev = rx.recv().await.unwrap();
        assert_matches!(ev, TaskEvent::Created(ref c) if c.id == t.id);
    }

    // -- ordering / scheduling --

    #[test]
    fn next_task_serves_priority_then_age() {
        let m = manager();
        let low = report(&m, TaskPriority::Low);
        let med = report(&m, TaskPriority::Medium);
        let high = report(&m, TaskPriority::High);
        let order: Vec<_> = std::iter::from_fn(|| m.next_task(WorkerCategory::Report))
            .map(|t| t.id)
            .collect();
        assert_eq!(order, vec![high.id, med.id, low.id]);
    }

    #[test]
    fn next_task_respects_capacity() {
        let m = TaskManager::new(QueueSettings {
            capacity: 2,
            ..QueueSettings::default()
        });
        for _ in 0..3 {
            let _ = report(&m, TaskPriority::Medium);
        }
        assert!(m.next_task(WorkerCategory::Report).is_some());
        assert!(m.next_task(WorkerCategory::Report).is_some());
        assert!(m.next_task(WorkerCategory::Report).is_none());
        let status = m.get_queue_status(WorkerCategory::Report).unwrap();
        assert_eq!((status.pending, status.processing), (1, 2));
    }

    #[test]
    fn paused_queue_hands_out_nothing() {
        let m = manager();
        let _ = report(&m, TaskPriority::High);
        assert!(m.pause_queue(WorkerCategory::Report));
        assert!(!m.pause_queue(WorkerCategory::Report));
        assert!(m.get_queue_status(WorkerCategory::Report).unwrap().paused);
        assert!(m.next_task(WorkerCategory::Report).is_none());
        assert!(m.resume_queue(WorkerCategory::Report));
        assert!(m.next_task(WorkerCategory::Report).is_some());
    }

    #[test]
    fn status_update_cannot_overfill_or_bypass_pause() {
        let m = TaskManager::new(QueueSettings {
            capacity: 1,
            ..QueueSettings::default()
        });
        let first = report(&m, TaskPriority::Medium);
        let second = report(&m, TaskPriority::Medium);
        assert!(m.pause_queue(WorkerCategory::Report));

        assert_matches!(
            m.update_task_status(&first.id, TaskStatus::InProgress, None, None),
            Err(TaskError::QueueUnavailable { paused: true, .. })
        );
        assert!(m.in_flight_tasks(WorkerCategory::Report).is_empty());

        assert!(m.resume_queue(WorkerCategory::Report));
        let _ = m
            .update_task_status(&first.id, TaskStatus::InProgress, None, None)
            .unwrap();
        assert_matches!(
            m.update_task_status(&second.id, TaskStatus::Assigned, None, None),
            Err(TaskError::QueueUnavailable { paused: false, at_capacity: true, .. })
        );

        // a task already in flight keeps reporting while paused
        assert!(m.pause_queue(WorkerCategory::Report));
        let u = m
            .update_task_status(&first.id, TaskStatus::InProgress, Some(50.0), None)
            .unwrap();
        assert_eq!(u.progress, Some(50.0));
        let status = m.get_queue_status(WorkerCategory::Report).unwrap();
        assert_eq!((status.pending, status.processing), (1, 1));
    }

    #[test]
    fn assigned_task_names_worker() {
        let m = manager();
        let _ = m.create_task(TaskType::DocumentProcessing, json!({}), TaskPriority::Low, None);
        let t = m.next_task(WorkerCategory::Documentation).unwrap();
        assert_eq!(t.status, TaskStatus::Assigned);
        assert_eq!(t.assigned_agent.as_deref(), Some("documentation_agent"));
        assert!(t.assigned_at.is_some());
    }

    // -- dependencies --

    #[test]
    fn dependent_waits_for_required_dependency() {
        let m = manager();
        let first = m.create_task(TaskType::ClientAnalysis, json!({}), TaskPriority::Low, None);
        let second = m.submit(
            NewTask::new(TaskType::GenerateReport, json!({}))
                .priority(TaskPriority::High)
                .depends_on(TaskDependency::required(first.id.clone())),
        );

        assert!(m.next_task(WorkerCategory::Report).is_none());
        let err = m
            .update_task_status(&second.id, TaskStatus::InProgress, None, None)
            .unwrap_err();
        assert_matches!(err, TaskError::DependenciesUnmet { ref unmet, .. } if unmet == &vec![first.id.clone()]);
        assert!(m.in_flight_tasks(WorkerCategory::Report).is_empty());

        let _ = m.next_task(WorkerCategory::Analysis).unwrap();
        let _ = m
            .update_task_status(&first.id, TaskStatus::Completed, Some(100.0), None)
            .unwrap();
        assert_eq!(m.next_task(WorkerCategory::Report).unwrap().id, second.id);
    }

    #[test]
    fn ready_lower_priority_task_overtakes_waiting_one() {
        let m = manager();
        let gate = m.create_task(TaskType::ClientAnalysis, json!({}), TaskPriority::Low, None);
        let _waiting = m.submit(
            NewTask::new(TaskType::GenerateReport, json!({}))
                .priority(TaskPriority::High)
                .depends_on(TaskDependency::required(gate.id.clone())),
        );
        let free = report(&m, TaskPriority::Low);
        assert_eq!(m.next_task(WorkerCategory::Report).unwrap().id, free.id);
    }

    #[test]
    fn failed_dependency_blocks_dependent() {
        let m = no_retry();
        let first = m.create_task(TaskType::ClientAnalysis, json!({}), TaskPriority::Low, None);
        let second = m.submit(
            NewTask::new(TaskType::GenerateReport, json!({}))
                .depends_on(TaskDependency::required(first.id.clone())),
        );
        let _ = m
            .update_task_status(&first.id, TaskStatus::Failed, None, Some("boom".into()))
            .unwrap();

        let blocked = m.task(&second.id).unwrap();
        assert_eq!(blocked.status, TaskStatus::Blocked);
        assert!(blocked.error.unwrap().contains(first.id.as_str()));
        assert_eq!(m.pending_tasks(WorkerCategory::Report).len(), 1);
        assert!(m.next_task(WorkerCategory::Report).is_none());
    }

    #[test]
    fn reset_blocked_task_is_blocked_again() {
        let m = no_retry();
        let first = m.create_task(TaskType::ClientAnalysis, json!({}), TaskPriority::Low, None);
        let second = m.submit(
            NewTask::new(TaskType::GenerateReport, json!({}))
                .depends_on(TaskDependency::required(first.id.clone())),
        );
        let _ = m
            .update_task_status(&first.id, TaskStatus::Failed, None, Some("boom".into()))
            .unwrap();
        assert_eq!(m.task(&second.id).unwrap().status, TaskStatus::Blocked);

        let u = m
            .update_task_status(&second.id, TaskStatus::Pending, None, None)
            .unwrap();
        assert_eq!(u.status, TaskStatus::Blocked);
        assert_eq!(m.task(&second.id).unwrap().status, TaskStatus::Blocked);
        assert!(m.next_task(WorkerCategory::Report).is_none());
    }

    #[test]
    fn unknown_dependency_is_unmet() {
        let m = manager();
        let t = m.submit(
            NewTask::new(TaskType::GenerateReport, json!({}))
                .depends_on(TaskDependency::required(TaskId::from("ghost"))),
        );
        assert!(m.next_task(WorkerCategory::Report).is_none());
        assert_matches!(
            m.update_task_status(&t.id, TaskStatus::Assigned, None, None),
            Err(TaskError::DependenciesUnmet { .. })
        );
    }

    // -- update_task_status --

    #[test]
    fn unknown_task_is_not_found() {
        let m = manager();
        assert_matches!(
            m.update_task_status(&TaskId::from("nope"), TaskStatus::Completed, None, None),
            Err(TaskError::NotFound(_))
        );
    }

    #[test]
    fn finished_task_cannot_be_updated() {
        let m = manager();
        let t = report(&m, TaskPriority::Low);
        let _ = m.update_task_status(&t.id, TaskStatus::Completed, None, None).unwrap();
        assert_matches!(
            m.update_task_status(&t.id, TaskStatus::InProgress, None, None),
            Err(TaskError::NotFound(_))
        );
        // still visible for history
        assert_eq!(m.task(&t.id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn progress_is_clamped() {
        let m = manager();
        let t = report(&m, TaskPriority::Low);
        let u = m
            .update_task_status(&t.id, TaskStatus::InProgress, Some(140.0), None)
            .unwrap();
        assert_eq!(u.progress, Some(100.0));
        let u = m
            .update_task_status(&t.id, TaskStatus::InProgress, Some(-3.0), None)
            .unwrap();
        assert_eq!(u.progress, Some(0.0));
        let u = m
            .update_task_status(&t.id, TaskStatus::InProgress, Some(f64::NAN), None)
            .unwrap();
        assert_eq!(u.progress, Some(0.0));
    }

    #[test]
    fn pending_to_in_progress_moves_in_flight() {
        let m = manager();
        let t = report(&m, TaskPriority::Low);
        let u = m
            .update_task_status(&t.id, TaskStatus::InProgress, Some(10.0), None)
            .unwrap();
        assert_eq!(u.assigned_agent.as_deref(), Some("report_agent"));
        let status = m.get_queue_status(WorkerCategory::Report).unwrap();
        assert_eq!((status.pending, status.processing), (0, 1));
    }

    #[test]
    fn back_to_pending_leaves_in_flight() {
        let m = manager();
        let _ = report(&m, TaskPriority::Low);
        let t = m.next_task(WorkerCategory::Report).unwrap();
        let _ = m.update_task_status(&t.id, TaskStatus::Pending, None, None).unwrap();
        let status = m.get_queue_status(WorkerCategory::Report).unwrap();
        assert_eq!((status.pending, status.processing), (1, 0));
    }

    #[test]
    fn completion_updates_metrics() {
        let m = manager();
        let t = report(&m, TaskPriority::Low);
        let _ = m.next_task(WorkerCategory::Report).unwrap();
        let _ = m
            .update_task_status(&t.id, TaskStatus::Completed, Some(100.0), None)
            .unwrap();
        let metrics = m.get_queue_metrics(WorkerCategory::Report).unwrap();
        assert_eq!(metrics.total_processed, 1);
        assert!((metrics.success_rate - 100.0).abs() < f64::EPSILON);
        let status = m.get_queue_status(WorkerCategory::Report).unwrap();
        assert_eq!((status.pending, status.processing), (0, 0));
    }

    // -- retries --

    #[tokio::test]
    async fn failure_is_retried_until_budget_spent() {
        let m = TaskManager::new(QueueSettings {
            max_retries: 2,
            ..QueueSettings::default()
        });
        let mut rx = m.subscribe();
        let t = report(&m, TaskPriority::Medium);

        for expected_retry in 1..=2 {
            let _ = m.next_task(WorkerCategory::Report).unwrap();
            let u = m
                .update_task_status(&t.id, TaskStatus::Failed, None, Some("worker down".into()))
                .unwrap();
            assert_eq!(u.status, TaskStatus::Pending);
            assert_eq!(u.retry_count, expected_retry);
            assert_eq!(u.error.as_deref(), Some("worker down"));
            assert_eq!(m.get_queue_metrics(WorkerCategory::Report).unwrap().total_processed, 0);
        }

        let _ = m.next_task(WorkerCategory::Report).unwrap();
        let last = m
            .update_task_status(&t.id, TaskStatus::Failed, None, Some("still down".into()))
            .unwrap();
        assert_eq!(last.status, TaskStatus::Failed);
        let metrics = m.get_queue_metrics(WorkerCategory::Report).unwrap();
        assert_eq!(metrics.total_processed, 1);
        assert!(metrics.success_rate.abs() < f64::EPSILON);

        let mut names = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            names.push(ev.name());
        }
        assert_eq!(names.iter().filter(|n| **n == "taskRetried").count(), 2);
    }

    #[test]
    fn auto_retry_off_fails_immediately() {
        let m = no_retry();
        let t = report(&m, TaskPriority::Medium);
        let u = m.update_task_status(&t.id, TaskStatus::Failed, None, None).unwrap();
        assert_eq!(u.status, TaskStatus::Failed);
        assert_eq!(u.retry_count, 0);
        assert_eq!(m.get_queue_metrics(WorkerCategory::Report).unwrap().total_processed, 1);
    }

    // -- listing / detection --

    #[test]
    fn tasks_are_listed_newest_update_first() {
        let m = manager();
        let a = report(&m, TaskPriority::Low);
        let b = report(&m, TaskPriority::Low);
        std::thread::sleep(Duration::from_millis(2));
        let _ = m.update_task_status(&a.id, TaskStatus::InProgress, None, None).unwrap();
        let ids: Vec<_> = m.tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[test]
    fn stalled_tasks_are_in_flight_and_quiet() {
        let m = manager();
        let _ = report(&m, TaskPriority::Low);
        let waiting = report(&m, TaskPriority::Low);
        let running = m.next_task(WorkerCategory::Report).unwrap();
        let later = Utc::now() + chrono::Duration::minutes(11);

        let stalled = m.stalled_tasks_as_of(later, Duration::from_secs(600));
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].id, running.id);
        assert_ne!(stalled[0].id, waiting.id);
        assert!(m.stalled_tasks(Duration::from_secs(600)).is_empty());
    }

    #[test]
    fn overdue_tasks_have_passed_deadline() {
        let m = manager();
        let due = Utc::now() + chrono::Duration::hours(1);
        let t = m.submit(NewTask::new(TaskType::GenerateReport, json!({})).deadline(due));
        let _ = report(&m, TaskPriority::Low);
        assert!(m.overdue_tasks().is_empty());
        let overdue = m.overdue_tasks_as_of(due + chrono::Duration::seconds(1));
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, t.id);
    }

    #[test]
    fn every_category_has_a_queue() {
        let m = manager();
        let statuses = m.queue_statuses();
        assert_eq!(statuses.len(), 4);
        assert!(statuses.iter().all(|s| s.capacity == 5 && !s.paused));
    }
}
