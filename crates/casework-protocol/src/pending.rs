//! Pending-query table.
//!
//! One entry per outstanding QUERY, keyed by correlation id, holding the
//! completion handle its caller waits on. The entry is removed on whichever
//! of response, error, timeout or transport failure comes first: settling
//! removes it, and the waiter's drop guard removes it on timeout or when the
//! caller gives up, so no path leaks an entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use casework_core::{CorrelationId, MessagePayload};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::ProtocolError;

/// Outcome delivered to a waiting query.
pub type QueryResult = Result<MessagePayload, ProtocolError>;

/// Outstanding queries by correlation id.
#[derive(Default)]
pub struct PendingQueries {
    entries: Mutex<HashMap<CorrelationId, oneshot::Sender<QueryResult>>>,
}

impl PendingQueries {
    /// Empty table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a waiter for `id`.
    ///
    /// Fails when `id` is already outstanding, since a correlation id must be
    /// unique for as long as its query is pending.
    pub fn register(self: &Arc<Self>, id: CorrelationId) -> Result<PendingQuery, ProtocolError> {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(ProtocolError::Validation(format!(
                "correlation id {id} is already pending"
            )));
        }
        let _ = entries.insert(id.clone(), tx);
        Ok(PendingQuery {
            table: self.clone(),
            id,
            rx,
        })
    }

    /// Resolve the waiter for `id`. Returns `false` when nothing is waiting.
    pub fn settle(&self, id: &CorrelationId, result: QueryResult) -> bool {
        let Some(tx) = self.entries.lock().remove(id) else {
            return false;
        };
        // the waiter may have just timed out; that is not an error here
        tx.send(result).is_ok()
    }

    /// Reject every outstanding query with `err`. Returns the correlation
    /// ids that were waiting.
    pub fn fail_all(&self, err: &ProtocolError) -> Vec<CorrelationId> {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        let mut failed = Vec::with_capacity(drained.len());
        for (id, tx) in drained {
            let _ = tx.send(Err(err.clone()));
            failed.push(id);
        }
        if !failed.is_empty() {
            debug!(count = failed.len(), error = %err, "rejected pending queries");
        }
        failed
    }

    /// Whether `id` is outstanding.
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of outstanding queries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no query is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn release(&self, id: &CorrelationId) {
        let _ = self.entries.lock().remove(id);
    }
}

/// Handle to one registered waiter. Dropping it releases the table entry.
pub struct PendingQuery {
    table: Arc<PendingQueries>,
    id: CorrelationId,
    rx: oneshot::Receiver<QueryResult>,
}

impl PendingQuery {
    /// Correlation id this handle waits on.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.id
    }

    /// Wait up to `timeout` for the outcome. `None` means the wait timed
    /// out; the entry is released either way.
    pub async fn wait(mut self, timeout: Duration) -> Option<QueryResult> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(_)) => Some(Err(ProtocolError::Closed)),
            Err(_) => None,
        }
    }
}

impl fmt::Debug for PendingQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingQuery")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for PendingQuery {
    fn drop(&mut self) {
        self.table.release(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn payload() -> MessagePayload {
        MessagePayload::new("GENERATE_REPORT", json!({"ok": true}))
    }

    #[tokio::test]
    async fn settle_resolves_waiter_and_removes_entry() {
        let table = PendingQueries::new();
        let id = CorrelationId::new();
        let waiter = table.register(id.clone()).unwrap();
        assert!(table.contains(&id));

        assert!(table.settle(&id, Ok(payload())));
        assert!(table.is_empty());
        let out = waiter.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(out.unwrap().action, "GENERATE_REPORT");
    }

    #[tokio::test]
    async fn second_settle_finds_nothing() {
        let table = PendingQueries::new();
        let id = CorrelationId::new();
        let _waiter = table.register(id.clone()).unwrap();
        assert!(table.settle(&id, Ok(payload())));
        assert!(!table.settle(&id, Err(ProtocolError::NotConnected)));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let table = PendingQueries::new();
        let id = CorrelationId::from("c-1");
        let _waiter = table.register(id.clone()).unwrap();
        assert_matches!(table.register(id), Err(ProtocolError::Validation(_)));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_entry() {
        let table = PendingQueries::new();
        let id = CorrelationId::new();
        let waiter = table.register(id.clone()).unwrap();
        assert!(waiter.wait(Duration::from_millis(30_000)).await.is_none());
        assert!(!table.contains(&id));
        // a late response is simply unmatched
        assert!(!table.settle(&id, Ok(payload())));
    }

    #[test]
    fn dropping_waiter_releases_entry() {
        let table = PendingQueries::new();
        let waiter = table.register(CorrelationId::new()).unwrap();
        assert_eq!(table.len(), 1);
        drop(waiter);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn fail_all_rejects_everyone() {
        let table = PendingQueries::new();
        let a = table.register(CorrelationId::new()).unwrap();
        let b = table.register(CorrelationId::new()).unwrap();
        let mut failed = table.fail_all(&ProtocolError::NotConnected);
        failed.sort();
        let mut expected = vec![a.correlation_id().clone(), b.correlation_id().clone()];
        expected.sort();
        assert_eq!(failed, expected);
        assert!(table.is_empty());
        for w in [a, b] {
            let out = w.wait(Duration::from_secs(1)).await.unwrap();
            assert_matches!(out, Err(ProtocolError::NotConnected));
        }
    }
}
