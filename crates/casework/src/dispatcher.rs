//! The scheduling loop that drives queued tasks through remote workers.
//!
//! One loop per worker category pulls ready tasks from the
//! [`TaskManager`] (which enforces capacity, pause and dependencies), sends
//! each as a QUERY to `<category>_agent`, applies `task_progress` events
//! the worker emits meanwhile, and settles the task from the correlated
//! RESPONSE, ERROR or timeout. A separate watchdog reports stalled and
//! overdue tasks.

use std::sync::Arc;
use std::time::Duration;

use casework_core::{BackoffPolicy, MessagePriority, retry_with_backoff};
use casework_protocol::AgentProtocol;
use casework_tasks::{Task, TaskManager, TaskStatus, WorkerCategory};
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Action of the progress events workers send while running a task.
pub const PROGRESS_ACTION: &str = "task_progress";

/// Fallback wake-up for the category loops when no task event arrives.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pulls tasks and runs them on remote workers.
pub struct Dispatcher {
    protocol: Arc<AgentProtocol>,
    tasks: Arc<TaskManager>,
    retry: BackoffPolicy,
    stall_threshold: Duration,
}

impl Dispatcher {
    /// Dispatcher retrying transient send failures with `retry`.
    pub fn new(protocol: Arc<AgentProtocol>, tasks: Arc<TaskManager>, retry: BackoffPolicy) -> Self {
        let stall_threshold = Duration::from_millis(tasks.settings().stall_threshold_ms);
        Self {
            protocol,
            tasks,
            retry,
            stall_threshold,
        }
    }

    /// Run every category loop and the watchdog until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut loops = JoinSet::new();
        for category in WorkerCategory::ALL {
            let _ = loops.spawn(self.clone().run_category(category, cancel.clone()));
        }
        let _ = loops.spawn(self.clone().watch_stalls(cancel.clone()));
        info!("dispatcher started");
        while loops.join_next().await.is_some() {}
        info!("dispatcher stopped");
    }

    async fn run_category(self: Arc<Self>, category: WorkerCategory, cancel: CancellationToken) {
        let mut events = self.tasks.subscribe();
        let mut running = JoinSet::new();
        loop {
            while let Some(task) = self.tasks.next_task(category) {
                let _ = running.spawn(self.clone().execute(task));
            }
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = events.recv() => {}
                Some(_) = running.join_next() => {}
                () = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
        running.abort_all();
    }

    /// Run one assigned task to a terminal (or retried) status.
    async fn execute(self: Arc<Self>, task: Task) {
        let category = task.category();
        let agent_id = category.agent_id();
        if let Err(e) = self
            .tasks
            .update_task_status(&task.id, TaskStatus::InProgress, Some(0.0), None)
        {
            warn!(task_id = %task.id, error = %e, "could not start task");
            return;
        }

        let subscription = {
            let tasks = self.tasks.clone();
            let task_id = task.id.clone();
            self.protocol
                .subscribe_to_agent(&agent_id, PROGRESS_ACTION, move |msg| {
                    let data = &msg.payload.data;
                    if data.get("taskId").and_then(Value::as_str) != Some(task_id.as_str()) {
                        return;
                    }
                    let progress = data.get("progress").and_then(Value::as_f64);
                    if let Err(e) =
                        tasks.update_task_status(&task_id, TaskStatus::InProgress, progress, None)
                    {
                        debug!(task_id = %task_id, error = %e, "ignoring late progress event");
                    }
                })
        };

        let request = json!({
            "taskId": task.id,
            "caseId": task.case_id,
            "data": task.data,
        });
        let priority = MessagePriority::from(task.priority);
        let action = task.task_type.as_str();
        let outcome = retry_with_backoff(&self.retry, |attempt| {
            if attempt > 0 {
                debug!(task_id = %task.id, attempt, "resending task");
            }
            self.protocol
                .query_agent(&agent_id, action, request.clone(), priority)
        })
        .await;
        let _ = subscription.unsubscribe();

        let settled = match outcome {
            Ok(_) => {
                info!(task_id = %task.id, agent = %agent_id, "task completed by worker");
                self.tasks
                    .update_task_status(&task.id, TaskStatus::Completed, Some(100.0), None)
            }
            Err(e) => {
                warn!(task_id = %task.id, agent = %agent_id, error = %e, "task failed");
                self.tasks
                    .update_task_status(&task.id, TaskStatus::Failed, None, Some(e.to_string()))
            }
        };
        if let Err(e) = settled {
            warn!(task_id = %task.id, error = %e, "could not settle task");
        }
    }

    async fn watch_stalls(self: Arc<Self>, cancel: CancellationToken) {
        let period = (self.stall_threshold / 4).max(POLL_INTERVAL);
        let mut tick = tokio::time::interval(period);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            for task in self.tasks.stalled_tasks(self.stall_threshold) {
                warn!(
                    task_id = %task.id,
                    status = %task.status,
                    agent = task.assigned_agent.as_deref().unwrap_or(""),
                    "task stalled, no update within threshold"
                );
            }
            for task in self.tasks.overdue_tasks() {
                warn!(task_id = %task.id, deadline = ?task.deadline, "task overdue");
            }
        }
    }
}
