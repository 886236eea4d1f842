//! Delivery status per sent message.
//!
//! Statuses only move forward: once a message is terminal (completed,
//! failed, cancelled) later updates for it are ignored. Terminal entries are
//! kept up to a fixed limit and then evicted oldest first.
//!
//! Anything other than a QUERY only turns terminal if the worker sends a
//! STATUS envelope for it, so those entries are also capped while still
//! open. Queries are never evicted while open; their timeout always ends
//! them.

use std::collections::{HashMap, VecDeque};

use casework_core::{AgentMessage, CorrelationId, MessageId, MessageKind, MessageStatus};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Entries kept per history (terminal, and open non-query) before the
/// oldest is evicted.
pub const TERMINAL_HISTORY_LIMIT: usize = 1024;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// A status change of one tracked message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Message whose status changed.
    pub message_id: MessageId,
    /// Its correlation id.
    pub correlation_id: CorrelationId,
    /// The new status.
    pub status: MessageStatus,
}

struct Tracked {
    correlation_id: CorrelationId,
    status: MessageStatus,
}

#[derive(Default)]
struct Table {
    by_id: HashMap<MessageId, Tracked>,
    by_correlation: HashMap<CorrelationId, MessageId>,
    terminal: VecDeque<MessageId>,
    unanswered: VecDeque<MessageId>,
}

/// Status table plus change broadcast.
pub struct MessageTracker {
    table: Mutex<Table>,
    updates: broadcast::Sender<StatusUpdate>,
    limit: usize,
}

impl Default for MessageTracker {
    fn default() -> Self {
        Self::with_limit(TERMINAL_HISTORY_LIMIT)
    }
}

impl MessageTracker {
    /// Tracker that keeps at most `limit` terminal entries and `limit` open
    /// non-query entries.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            table: Mutex::new(Table::default()),
            updates,
            limit: limit.max(1),
        }
    }

    /// Start tracking `msg` with its current status.
    pub fn track(&self, msg: &AgentMessage) {
        let mut table = self.table.lock();
        let _ = table
            .by_correlation
            .insert(msg.metadata.correlation_id.clone(), msg.id.clone());
        let _ = table.by_id.insert(
            msg.id.clone(),
            Tracked {
                correlation_id: msg.metadata.correlation_id.clone(),
                status: msg.status,
            },
        );
        if msg.kind != MessageKind::Query {
            table.unanswered.push_back(msg.id.clone());
            Self::evict_unanswered(&mut table, self.limit);
        }
    }

    /// Move `id` to `status`. Returns `false` when the message is unknown or
    /// already terminal.
    pub fn set(&self, id: &MessageId, status: MessageStatus) -> bool {
        let update = {
            let mut table = self.table.lock();
            let Some(entry) = table.by_id.get_mut(id) else {
                return false;
            };
            if entry.status.is_terminal() {
                debug!(message_id = %id, current = ?entry.status, requested = ?status, "ignoring update of terminal message");
                return false;
            }
            if entry.status == status {
                return true;
            }
            entry.status = status;
            let update = StatusUpdate {
                message_id: id.clone(),
                correlation_id: entry.correlation_id.clone(),
                status,
            };
            if status.is_terminal() {
                table.terminal.push_back(id.clone());
                Self::evict(&mut table, self.limit);
            }
            update
        };
        let _ = self.updates.send(update);
        true
    }

    /// Move the message carrying `correlation_id` to `status`.
    pub fn set_by_correlation(&self, correlation_id: &CorrelationId, status: MessageStatus) -> bool {
        let id = self.table.lock().by_correlation.get(correlation_id).cloned();
        id.is_some_and(|id| self.set(&id, status))
    }

    /// Current status of `id`.
    pub fn status(&self, id: &MessageId) -> Option<MessageStatus> {
        self.table.lock().by_id.get(id).map(|t| t.status)
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    /// Number of tracked messages.
    pub fn len(&self) -> usize {
        self.table.lock().by_id.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(table: &mut Table, limit: usize) {
        while table.terminal.len() > limit {
            let Some(old) = table.terminal.pop_front() else {
                break;
            };
            Self::forget(table, &old);
        }
    }

    /// Drop the oldest open non-query entries past `limit`. Ids that turned
    /// terminal in the meantime are left to the terminal history.
    fn evict_unanswered(table: &mut Table, limit: usize) {
        while table.unanswered.len() > limit {
            let Some(old) = table.unanswered.pop_front() else {
                break;
            };
            if table.by_id.get(&old).is_some_and(|t| !t.status.is_terminal()) {
                debug!(message_id = %old, "evicting unanswered message");
                Self::forget(table, &old);
            }
        }
    }

    fn forget(table: &mut Table, id: &MessageId) {
        if let Some(entry) = table.by_id.remove(id) {
            if table.by_correlation.get(&entry.correlation_id) == Some(id) {
                let _ = table.by_correlation.remove(&entry.correlation_id);
            }
        }
    }
}
