//! Dashboard stream frames and inbound frame classification.
//!
//! Besides envelopes, workers push a handful of flat notification frames for
//! the live dashboard (metric updates, insights, session start/end, agent
//! errors). They are told apart from envelopes by their `type` string:
//! envelope kinds are upper case, dashboard kinds are snake_case.

use casework_core::{AgentMessage, EnvelopeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Worker that produced a dashboard frame. `kind` is the worker category
/// (`analysis`, `report`, ...), not an endpoint kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSource {
    /// Worker category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Worker id.
    pub id: String,
}

/// Value carried by a metric update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    /// New value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Change since the last update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
    /// Free-form details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// When the value was measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Urgency of an insight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightPriority {
    /// Needs attention now.
    High,
    /// Worth a look.
    Medium,
    /// Informational.
    Low,
}

impl InsightPriority {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Body of an insight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsightPayload {
    /// Human-readable insight.
    pub message: String,
    /// Urgency.
    pub priority: InsightPriority,
}

/// A decoded dashboard frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// A dashboard counter changed.
    MetricUpdate {
        /// Metric name (e.g. `activeAssessments`).
        metric: String,
        /// New value.
        #[serde(default)]
        data: MetricData,
        /// Producer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<DashboardSource>,
    },
    /// A worker reported an error outside any query.
    AgentError {
        /// Error text.
        error: String,
        /// When it happened.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        /// Producer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<DashboardSource>,
    },
    /// A worker session began.
    SessionStarted {
        /// Worker session id.
        session_id: String,
        /// Producer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<DashboardSource>,
    },
    /// A worker session ended.
    SessionEnded {
        /// Worker session id.
        session_id: String,
        /// Producer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<DashboardSource>,
    },
    /// A worker produced an insight about a case or client.
    InsightGenerated {
        /// Insight id.
        id: String,
        /// Insight body.
        payload: InsightPayload,
        /// Producer.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<DashboardSource>,
    },
}

impl DashboardEvent {
    /// Wire name of the frame type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MetricUpdate { .. } => "metric_update",
            Self::AgentError { .. } => "agent_error",
            Self::SessionStarted { .. } => "session_started",
            Self::SessionEnded { .. } => "session_ended",
            Self::InsightGenerated { .. } => "insight_generated",
        }
    }

    /// Producer, if the frame named one.
    pub fn source(&self) -> Option<&DashboardSource> {
        match self {
            Self::MetricUpdate { source, .. }
            | Self::AgentError { source, .. }
            | Self::SessionStarted { source, .. }
            | Self::SessionEnded { source, .. }
            | Self::InsightGenerated { source, .. } => source.as_ref(),
        }
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        match self {
            Self::MetricUpdate { metric, data, .. } => match data.value {
                Some(v) => format!("{metric} = {v}"),
                None => format!("{metric} updated"),
            },
            Self::AgentError { error, .. } => format!("agent error: {error}"),
            Self::SessionStarted { session_id, .. } => format!("session {session_id} started"),
            Self::SessionEnded { session_id, .. } => format!("session {session_id} ended"),
            Self::InsightGenerated { payload, .. } => {
                format!("[{}] {}", payload.priority.as_str(), payload.message)
            }
        }
    }
}

/// Dashboard frame type names.
pub const DASHBOARD_KINDS: [&str; 5] = [
    "metric_update",
    "agent_error",
    "session_started",
    "session_ended",
    "insight_generated",
];

/// What an inbound JSON frame turned out to be.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// `ping` / `pong` keep-alive traffic.
    Keepalive,
    /// A dashboard notification.
    Dashboard(DashboardEvent),
    /// A protocol envelope.
    Message(Box<AgentMessage>),
}

/// Sort a decoded frame into keep-alive, dashboard or envelope.
pub fn classify(frame: Value) -> Result<InboundFrame, EnvelopeError> {
    match frame.get("type").and_then(Value::as_str) {
        Some("ping" | "pong") => Ok(InboundFrame::Keepalive),
        Some(kind) if DASHBOARD_KINDS.contains(&kind) => {
            Ok(InboundFrame::Dashboard(serde_json::from_value(frame)?))
        }
        _ => Ok(InboundFrame::Message(Box::new(AgentMessage::from_value(
            frame,
        )?))),
    }
}
