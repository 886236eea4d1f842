//! Caller-supplied part of an outbound envelope.

use casework_core::{
    AgentIdentifier, CorrelationId, MessageKind, MessagePayload, MessagePriority,
};
use serde_json::Value;

/// Everything about a message the caller decides. The protocol fills in
/// id, timestamp, source, session, status and version.
#[derive(Clone, Debug)]
pub struct MessageDraft {
    /// Envelope kind.
    pub kind: MessageKind,
    /// Recipient; `target.id` must be non-empty.
    pub target: AgentIdentifier,
    /// Action and data; `payload.action` must be non-empty.
    pub payload: MessagePayload,
    /// Priority.
    pub priority: MessagePriority,
    /// Correlation id; a fresh one is generated when absent.
    pub correlation_id: Option<CorrelationId>,
    /// Sender-side timeout advertised in the metadata, in ms.
    pub timeout_ms: Option<u64>,
    /// Opaque user context.
    pub user_context: Option<Value>,
}

impl MessageDraft {
    /// Draft with normal priority and no extras.
    pub fn new(kind: MessageKind, target: AgentIdentifier, payload: MessagePayload) -> Self {
        Self {
            kind,
            target,
            payload,
            priority: MessagePriority::Normal,
            correlation_id: None,
            timeout_ms: None,
            user_context: None,
        }
    }

    /// A fire-and-forget command.
    pub fn command(target: AgentIdentifier, action: impl Into<String>, data: Value) -> Self {
        Self::new(
            MessageKind::Command,
            target,
            MessagePayload::new(action, data),
        )
    }

    /// Set the priority.
    #[must_use]
    pub fn priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Use an existing correlation id.
    #[must_use]
    pub fn correlation(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Advertise a timeout.
    #[must_use]
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Attach user context.
    #[must_use]
    pub fn user_context(mut self, ctx: Value) -> Self {
        self.user_context = Some(ctx);
        self
    }
}
