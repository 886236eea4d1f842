//! Branded ID newtypes.
//!
//! Message ids, correlation ids, session ids and task ids all travel as plain
//! strings on the wire, but mixing them up is exactly the bug that breaks
//! request/response correlation. Each kind gets its own newtype around
//! `String`.
//!
//! Fresh IDs are UUID v7 (time-ordered) so they sort by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a single envelope on the wire.
    MessageId
}

branded_id! {
    /// Token linking a query to its eventual response or error.
    CorrelationId
}

branded_id! {
    /// Client session the envelope belongs to.
    SessionId
}

branded_id! {
    /// Identifier of a unit of work in the task queues.
    TaskId
}

branded_id! {
    /// Handle returned by an event subscription, used to unsubscribe.
    SubscriptionId
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_ids_are_uuid_v7() {
        let id = MessageId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn new_ids_are_unique() {
        let ids: HashSet<CorrelationId> = (0..1000).map(|_| CorrelationId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn task_ids_sort_by_creation() {
        let first = TaskId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TaskId::new();
        assert!(first < second);
    }

    #[test]
    fn serde_is_transparent() {
        let id = SessionId::from("sess_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sess_1\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn deref_and_display() {
        let id = TaskId::from("task_42");
        assert_eq!(&*id, "task_42");
        assert_eq!(id.to_string(), "task_42");
        assert!(id.starts_with("task_"));
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut set = HashSet::new();
        let _ = set.insert(CorrelationId::from("corr_1"));
        assert!(set.contains("corr_1"));
    }

    #[test]
    fn into_string() {
        let id = MessageId::from("msg_1".to_string());
        let s: String = id.into();
        assert_eq!(s, "msg_1");
    }
}
