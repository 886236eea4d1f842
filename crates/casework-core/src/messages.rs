//! The agent message envelope.
//!
//! Every frame exchanged with a remote worker over the transport channel is an
//! [`AgentMessage`]: an identifier, a kind, source/target endpoints, a
//! payload (action + data), correlation metadata, a delivery status and the
//! protocol version.
//!
//! # JSON format
//!
//! Field names are camelCase, enum values SCREAMING_CASE, priorities are
//! numbers (`0` low … `3` critical):
//!
//! ```json
//! {
//!   "id": "0190…",
//!   "timestamp": "2026-01-01T00:00:00.000Z",
//!   "type": "QUERY",
//!   "source": { "type": "FRONTEND", "id": "client" },
//!   "target": { "type": "AGENT", "id": "report_agent" },
//!   "priority": 1,
//!   "payload": { "action": "GENERATE_REPORT", "data": {} },
//!   "metadata": { "sessionId": "…", "correlationId": "…" },
//!   "status": "PENDING",
//!   "version": "1.0"
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::PROTOCOL_VERSION;
use crate::errors::EnvelopeError;
use crate::ids::{CorrelationId, MessageId, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Fire-and-forget instruction.
    Command,
    /// Request expecting a correlated `Response` or `Error`.
    Query,
    /// Successful answer to a `Query`.
    Response,
    /// Unsolicited notification from a worker.
    Event,
    /// Failed answer to a `Query`.
    Error,
    /// Delivery status update for an earlier message.
    Status,
    /// Partial result chunk.
    Stream,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Command => "COMMAND",
            Self::Query => "QUERY",
            Self::Response => "RESPONSE",
            Self::Event => "EVENT",
            Self::Error => "ERROR",
            Self::Status => "STATUS",
            Self::Stream => "STREAM",
        };
        f.write_str(s)
    }
}

/// Delivery status of a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Created, not yet handed to the transport.
    #[default]
    Pending,
    /// Written to the transport, awaiting an answer.
    Processing,
    /// Answered successfully.
    Completed,
    /// Transmission failed or the worker answered with an error.
    Failed,
    /// Abandoned by the sender.
    Cancelled,
}

impl MessageStatus {
    /// Whether no further status change is expected.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Envelope priority, carried as a number on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MessagePriority {
    /// `0`
    Low,
    /// `1`
    #[default]
    Normal,
    /// `2`
    High,
    /// `3`
    Critical,
}

impl From<MessagePriority> for u8 {
    fn from(p: MessagePriority) -> Self {
        match p {
            MessagePriority::Low => 0,
            MessagePriority::Normal => 1,
            MessagePriority::High => 2,
            MessagePriority::Critical => 3,
        }
    }
}

impl TryFrom<u8> for MessagePriority {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Low),
            1 => Ok(Self::Normal),
            2 => Ok(Self::High),
            3 => Ok(Self::Critical),
            other => Err(format!("unknown message priority {other}")),
        }
    }
}

/// Which side of the system an endpoint lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointKind {
    /// The case-management client.
    Frontend,
    /// A remote worker process.
    Agent,
    /// The application backend.
    Backend,
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope parts
// ─────────────────────────────────────────────────────────────────────────────

/// A `{category, id}` pair naming one end of a message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentifier {
    /// Endpoint category.
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    /// Endpoint id (e.g. `report_agent`).
    pub id: String,
}

impl AgentIdentifier {
    /// A frontend endpoint.
    pub fn frontend(id: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Frontend,
            id: id.into(),
        }
    }

    /// A worker endpoint.
    pub fn agent(id: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Agent,
            id: id.into(),
        }
    }

    /// A backend endpoint.
    pub fn backend(id: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Backend,
            id: id.into(),
        }
    }
}

/// What the message asks for or reports.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Action name (e.g. `GENERATE_REPORT`, `task_progress`).
    pub action: String,
    /// Action data.
    #[serde(default)]
    pub data: Value,
    /// Optional action parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    /// Optional execution constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
}

impl MessagePayload {
    /// Payload with an action and data and no parameters/constraints.
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data,
            parameters: None,
            constraints: None,
        }
    }
}

/// Correlation metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Sender session.
    pub session_id: SessionId,
    /// Links a query to its response/error.
    pub correlation_id: CorrelationId,
    /// Optional sender-side timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Optional opaque user context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<Value>,
}

impl MessageMetadata {
    /// Metadata with a fresh correlation id.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            correlation_id: CorrelationId::new(),
            timeout: None,
            user_context: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentMessage
// ─────────────────────────────────────────────────────────────────────────────

/// The wire envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique message id.
    pub id: MessageId,
    /// ISO-8601 creation timestamp.
    pub timestamp: String,
    /// Envelope kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Sender.
    pub source: AgentIdentifier,
    /// Recipient.
    pub target: AgentIdentifier,
    /// Priority.
    #[serde(default)]
    pub priority: MessagePriority,
    /// Action and data.
    pub payload: MessagePayload,
    /// Session and correlation.
    pub metadata: MessageMetadata,
    /// Delivery status.
    #[serde(default)]
    pub status: MessageStatus,
    /// Protocol version.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_owned()
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl AgentMessage {
    /// Build a fresh `Pending` envelope stamped with a new id, the current
    /// time and the current protocol version.
    pub fn new(
        kind: MessageKind,
        source: AgentIdentifier,
        target: AgentIdentifier,
        payload: MessagePayload,
        metadata: MessageMetadata,
    ) -> Self {
        Self {
            id: MessageId::new(),
            timestamp: now_timestamp(),
            kind,
            source,
            target,
            priority: MessagePriority::Normal,
            payload,
            metadata,
            status: MessageStatus::Pending,
            version: default_version(),
        }
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Build an answer to this message.
    ///
    /// Source and target are swapped and the correlation id is preserved, so
    /// the answer settles whatever is waiting on this message.
    #[must_use]
    pub fn reply(&self, kind: MessageKind, payload: MessagePayload) -> Self {
        let status = if kind == MessageKind::Error {
            MessageStatus::Failed
        } else {
            MessageStatus::Completed
        };
        Self {
            id: MessageId::new(),
            timestamp: now_timestamp(),
            kind,
            source: self.target.clone(),
            target: self.source.clone(),
            priority: self.priority,
            payload,
            metadata: MessageMetadata {
                session_id: self.metadata.session_id.clone(),
                correlation_id: self.metadata.correlation_id.clone(),
                timeout: None,
                user_context: None,
            },
            status,
            version: self.version.clone(),
        }
    }

    /// Correlation id shortcut.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.metadata.correlation_id
    }

    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode an already-parsed inbound frame.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_value(value)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
