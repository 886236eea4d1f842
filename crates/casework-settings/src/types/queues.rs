//! Task queue settings.

use serde::{Deserialize, Serialize};

/// Task queue settings, shared by every worker category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueSettings {
    /// Maximum in-flight tasks per category.
    pub capacity: usize,
    /// Retry budget given to new tasks.
    pub max_retries: u32,
    /// Requeue failed tasks until their retry budget is spent.
    pub auto_retry: bool,
    /// In-flight tasks without an update for this long are reported stalled.
    pub stall_threshold_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            capacity: 5,
            max_retries: 3,
            auto_retry: true,
            stall_threshold_ms: 600_000,
        }
    }
}
