//! Event subscriptions keyed by (source id, action).

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use casework_core::{AgentMessage, SubscriptionId};
use parking_lot::RwLock;

/// Callback invoked for every matching EVENT or STREAM envelope.
pub type EventCallback = Arc<dyn Fn(&AgentMessage) + Send + Sync>;

type Key = (String, String);

/// Subscriber registry.
#[derive(Default)]
pub struct Subscriptions {
    by_key: RwLock<HashMap<Key, Vec<(SubscriptionId, EventCallback)>>>,
}

impl Subscriptions {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `callback` for `action` events from `source_id`.
    pub fn add(
        self: &Arc<Self>,
        source_id: impl Into<String>,
        action: impl Into<String>,
        callback: EventCallback,
    ) -> Subscription {
        let key = (source_id.into(), action.into());
        let id = SubscriptionId::new();
        self.by_key
            .write()
            .entry(key.clone())
            .or_default()
            .push((id.clone(), callback));
        Subscription {
            registry: Arc::downgrade(self),
            key,
            id,
        }
    }

    /// Invoke every subscriber for `msg`'s (source id, action). Returns how
    /// many were called.
    pub fn dispatch(&self, msg: &AgentMessage) -> usize {
        let key = (msg.source.id.clone(), msg.payload.action.clone());
        let callbacks: Vec<EventCallback> = self
            .by_key
            .read()
            .get(&key)
            .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        for cb in &callbacks {
            cb(msg);
        }
        callbacks.len()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.by_key.read().values().map(Vec::len).sum()
    }

    /// Whether there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, key: &Key, id: &SubscriptionId) -> bool {
        let mut by_key = self.by_key.write();
        let Some(subs) = by_key.get_mut(key) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(sid, _)| sid != id);
        let removed = subs.len() < before;
        if subs.is_empty() {
            let _ = by_key.remove(key);
        }
        removed
    }
}

/// Handle returned by a subscription. Dropping it keeps the subscription;
/// call [`Subscription::unsubscribe`] to end it.
pub struct Subscription {
    registry: Weak<Subscriptions>,
    key: Key,
    id: SubscriptionId,
}

impl Subscription {
    /// Subscription id.
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Stop receiving events. Returns `false` if the registry is gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|r| r.remove(&self.key, &self.id))
    }
}
