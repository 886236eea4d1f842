//! # casework-tasks
//!
//! Priority task queues for remote worker categories.
//!
//! - [`TaskManager`]: one queue per [`WorkerCategory`], dependency gating,
//!   capacity and pause control, automatic retry of failed tasks, stall and
//!   deadline detection
//! - [`TaskQueue`]: a single category's pending / in-flight / finished sets
//!   and its running metrics
//! - [`TaskEvent`]: lifecycle notifications broadcast to subscribers

#![deny(unsafe_code)]

pub mod deps;
pub mod errors;
pub mod events;
pub mod manager;
pub mod queue;
pub mod types;

pub use deps::{Readiness, readiness};
pub use errors::TaskError;
pub use events::{TaskEvent, TaskEvents};
pub use manager::TaskManager;
pub use queue::{Slot, TaskQueue};
pub use types::{
    DependencyKind, NewTask, QueueMetrics, QueueStatus, Task, TaskDependency, TaskPriority,
    TaskStatus, TaskType, WorkerCategory,
};
