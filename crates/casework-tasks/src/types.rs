//! Task model.

use std::fmt;
use std::str::FromStr;

use casework_core::{MessagePriority, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Categories and task types
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of remote worker a queue serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerCategory {
    /// Assessment intake and review.
    Assessment,
    /// Client analysis.
    Analysis,
    /// Document processing.
    Documentation,
    /// Report generation.
    Report,
}

impl WorkerCategory {
    /// Every category, in display order.
    pub const ALL: [Self; 4] = [
        Self::Assessment,
        Self::Analysis,
        Self::Documentation,
        Self::Report,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assessment => "assessment",
            Self::Analysis => "analysis",
            Self::Documentation => "documentation",
            Self::Report => "report",
        }
    }

    /// Id of the worker that serves this category (`report_agent`, ...).
    #[must_use]
    pub fn agent_id(self) -> String {
        format!("{}_agent", self.as_str())
    }
}

impl fmt::Display for WorkerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown worker category '{s}'"))
    }
}

/// What a task asks a worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Start a new assessment.
    AssessmentInit,
    /// Review a submitted assessment.
    AssessmentReview,
    /// Produce a report.
    GenerateReport,
    /// Analyse a client's record.
    ClientAnalysis,
    /// Process an uploaded document.
    DocumentProcessing,
}

impl TaskType {
    /// Every task type.
    pub const ALL: [Self; 5] = [
        Self::AssessmentInit,
        Self::AssessmentReview,
        Self::GenerateReport,
        Self::ClientAnalysis,
        Self::DocumentProcessing,
    ];

    /// Queue that serves this task type.
    #[must_use]
    pub fn category(self) -> WorkerCategory {
        match self {
            Self::AssessmentInit | Self::AssessmentReview => WorkerCategory::Assessment,
            Self::GenerateReport => WorkerCategory::Report,
            Self::ClientAnalysis => WorkerCategory::Analysis,
            Self::DocumentProcessing => WorkerCategory::Documentation,
        }
    }

    /// Wire name, also used as the query action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssessmentInit => "ASSESSMENT_INIT",
            Self::AssessmentReview => "ASSESSMENT_REVIEW",
            Self::GenerateReport => "GENERATE_REPORT",
            Self::ClientAnalysis => "CLIENT_ANALYSIS",
            Self::DocumentProcessing => "DOCUMENT_PROCESSING",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown task type '{s}'"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Priority and status
// ─────────────────────────────────────────────────────────────────────────────

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Served first.
    High,
    /// Default.
    #[default]
    Medium,
    /// Served last.
    Low,
}

impl TaskPriority {
    /// Ordering rank; higher is served first.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("unknown task priority '{s}'")),
        }
    }
}

impl From<TaskPriority> for MessagePriority {
    fn from(p: TaskPriority) -> Self {
        match p {
            TaskPriority::High => Self::High,
            TaskPriority::Medium => Self::Normal,
            TaskPriority::Low => Self::Low,
        }
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting in the queue.
    #[default]
    Pending,
    /// Handed to a worker, not yet started.
    Assigned,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Gave up.
    Failed,
    /// A required dependency ended in a status it does not accept.
    Blocked,
}

impl TaskStatus {
    /// Completed or failed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Assigned or in progress: the task belongs in the in-flight set.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dependencies
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a dependency gates the dependent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyKind {
    /// Must reach an accepted status before the dependent may start.
    Required,
    /// Informational only.
    Optional,
}

/// A link from a task to another task it waits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    /// Task waited on.
    pub task_id: TaskId,
    /// Required or optional.
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    /// Statuses of `task_id` that satisfy the dependency.
    #[serde(rename = "status", default = "default_accepted")]
    pub accepted: Vec<TaskStatus>,
}

fn default_accepted() -> Vec<TaskStatus> {
    vec![TaskStatus::Completed]
}

impl TaskDependency {
    /// Required dependency satisfied by completion.
    pub fn required(task_id: TaskId) -> Self {
        Self {
            task_id,
            kind: DependencyKind::Required,
            accepted: default_accepted(),
        }
    }

    /// Optional dependency.
    pub fn optional(task_id: TaskId) -> Self {
        Self {
            task_id,
            kind: DependencyKind::Optional,
            accepted: default_accepted(),
        }
    }

    /// Accept these statuses instead of just completion.
    #[must_use]
    pub fn accepting(mut self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        self.accepted = statuses.into_iter().collect();
        self
    }

    /// Whether the dependent must wait on this one.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.kind == DependencyKind::Required
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// A unit of work for one worker category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique id.
    pub id: TaskId,
    /// What to do.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Queue ordering priority.
    pub priority: TaskPriority,
    /// Owning case, if any.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "clientId")]
    pub case_id: Option<String>,
    /// Opaque worker input.
    #[serde(default)]
    pub data: Value,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Worker the task was handed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    /// Tasks this one waits on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskDependency>,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last change.
    pub updated: DateTime<Utc>,
    /// When the task entered the in-flight set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    /// Due time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Percent complete, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Failed attempts so far that were requeued.
    pub retry_count: u32,
    /// Requeue budget.
    pub max_retries: u32,
    /// Last failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Queue that owns the task.
    #[must_use]
    pub fn category(&self) -> WorkerCategory {
        self.task_type.category()
    }

    /// Required dependencies only.
    pub fn required_dependencies(&self) -> impl Iterator<Item = &TaskDependency> {
        self.dependencies.iter().filter(|d| d.is_required())
    }

    /// Whether the deadline has passed at `now` without the task finishing.
    #[must_use]
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.deadline.is_some_and(|d| d < now)
    }
}

/// Parameters for a new task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    /// What to do.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Worker input.
    #[serde(default)]
    pub data: Value,
    /// Priority, medium by default.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Owning case.
    #[serde(default, alias = "clientId")]
    pub case_id: Option<String>,
    /// Tasks to wait on.
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    /// Due time.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Requeue budget; the queue default when `None`.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl NewTask {
    /// Medium-priority task with no case, dependencies or deadline.
    pub fn new(task_type: TaskType, data: Value) -> Self {
        Self {
            task_type,
            data,
            priority: TaskPriority::Medium,
            case_id: None,
            dependencies: Vec::new(),
            deadline: None,
            max_retries: None,
        }
    }

    /// Set the priority.
    #[must_use]
    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach to a case.
    #[must_use]
    pub fn case_id(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    /// Add a dependency.
    #[must_use]
    pub fn depends_on(mut self, dependency: TaskDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Set a deadline.
    #[must_use]
    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Override the retry budget.
    #[must_use]
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Queue snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// Rolling throughput figures of one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetrics {
    /// Tasks that reached a terminal status.
    pub total_processed: u64,
    /// Percentage of processed tasks that completed.
    pub success_rate: f64,
    /// Mean time from assignment to terminal status, in ms.
    pub average_processing_time_ms: f64,
}

/// Read-only view of one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Category served.
    pub category: WorkerCategory,
    /// Tasks waiting.
    pub pending: usize,
    /// Tasks in flight.
    pub processing: usize,
    /// In-flight limit.
    pub capacity: usize,
    /// Whether the queue hands out work.
    pub paused: bool,
    /// Throughput figures.
    pub metrics: QueueMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- mapping --

    #[test]
    fn task_types_map_to_categories() {
        assert_eq!(TaskType::AssessmentInit.category(), WorkerCategory::Assessment);
        assert_eq!(TaskType::AssessmentReview.category(), WorkerCategory::Assessment);
        assert_eq!(TaskType::GenerateReport.category(), WorkerCategory::Report);
        assert_eq!(TaskType::ClientAnalysis.category(), WorkerCategory::Analysis);
        assert_eq!(TaskType::DocumentProcessing.category(), WorkerCategory::Documentation);
    }

    #[test]
    fn agent_ids() {
        assert_eq!(WorkerCategory::Report.agent_id(), "report_agent");
        assert_eq!(WorkerCategory::Documentation.agent_id(), "documentation_agent");
    }

    #[test]
    fn parse_names() {
        assert_eq!("analysis".parse::<WorkerCategory>(), Ok(WorkerCategory::Analysis));
        assert!("billing".parse::<WorkerCategory>().is_err());
        assert_eq!("generate_report".parse::<TaskType>(), Ok(TaskType::GenerateReport));
        assert_eq!("HIGH".parse::<TaskPriority>(), Ok(TaskPriority::High));
    }

    // -- priority / status --

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(TaskPriority::High.rank() > TaskPriority::Medium.rank());
        assert!(TaskPriority::Medium.rank() > TaskPriority::Low.rank());
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert_eq!(MessagePriority::from(TaskPriority::Medium), MessagePriority::Normal);
    }

    #[test]
    fn status_classes() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Blocked.is_terminal());
        assert!(TaskStatus::Assigned.is_active());
        assert!(TaskStatus::InProgress.is_active());
        assert!(!TaskStatus::Pending.is_active());
    }

    // -- wire format --

    #[test]
    fn dependency_defaults_to_completed() {
        let dep: TaskDependency =
            serde_json::from_value(json!({"taskId": "t1", "type": "REQUIRED"})).unwrap();
        assert!(dep.is_required());
        assert_eq!(dep.accepted, vec![TaskStatus::Completed]);
    }

    #[test]
    fn task_serializes_camel_case() {
        let now = Utc::now();
        let task = Task {
            id: TaskId::from("t1"),
            task_type: TaskType::GenerateReport,
            priority: TaskPriority::Low,
            case_id: Some("case-1".into()),
            data: json!({}),
            status: TaskStatus::InProgress,
            assigned_agent: None,
            dependencies: vec![],
            created: now,
            updated: now,
            assigned_at: None,
            deadline: None,
            progress: Some(40.0),
            retry_count: 0,
            max_retries: 3,
            error: None,
        };
        let v = serde_json::to_value(&task).unwrap();
        assert_eq!(v["type"], "GENERATE_REPORT");
        assert_eq!(v["status"], "IN_PROGRESS");
        assert_eq!(v["priority"], "low");
        assert_eq!(v["caseId"], "case-1");
        assert_eq!(v["maxRetries"], 3);
        assert!(v.get("dependencies").is_none());
    }

    #[test]
    fn client_id_alias_is_accepted() {
        let v = json!({
            "id": "t1", "type": "CLIENT_ANALYSIS", "priority": "high", "clientId": "c9",
            "status": "PENDING", "created": "2026-01-01T00:00:00Z",
            "updated": "2026-01-01T00:00:00Z", "retryCount": 0, "maxRetries": 3
        });
        let task: Task = serde_json::from_value(v).unwrap();
        assert_eq!(task.case_id.as_deref(), Some("c9"));
    }

    #[test]
    fn overdue_ignores_finished_tasks() {
        let now = Utc::now();
        let mut task: Task = serde_json::from_value(json!({
            "id": "t1", "type": "CLIENT_ANALYSIS", "priority": "high",
            "status": "PENDING", "created": now, "updated": now,
            "deadline": now - chrono::Duration::minutes(1),
            "retryCount": 0, "maxRetries": 3
        }))
        .unwrap();
        assert!(task.is_overdue_at(now));
        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue_at(now));
    }

    #[test]
    fn new_task_from_minimal_json() {
        let new: NewTask = serde_json::from_value(json!({
            "type": "GENERATE_REPORT",
            "clientId": "c-3",
            "dependencies": [{"taskId": "t0", "type": "required"}]
        }))
        .unwrap();
        assert_eq!(new.task_type, TaskType::GenerateReport);
        assert_eq!(new.priority, TaskPriority::Medium);
        assert_eq!(new.case_id.as_deref(), Some("c-3"));
        assert!(new.dependencies[0].is_required());
        assert!(new.max_retries.is_none());
    }
}
