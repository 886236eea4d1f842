//! Protocol error types.

use casework_core::{Classified, ErrorCategory, ErrorSeverity, MessagePayload};
use casework_transport::TransportError;
use thiserror::Error;

/// Errors returned by the message protocol.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// The outbound envelope is missing a required field.
    #[error("invalid message: {0}")]
    Validation(String),

    /// The transport refused the frame because it is not open.
    #[error("agent connection not available")]
    NotConnected,

    /// The envelope could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// No response or error arrived in time.
    #[error("agent query '{action}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Action that was queried.
        action: String,
        /// Wait that elapsed.
        timeout_ms: u64,
    },

    /// The worker answered with an ERROR envelope.
    #[error("agent error for '{}': {}", .0.action, remote_reason(.0))]
    Remote(MessagePayload),

    /// The connection failed for good while the query was outstanding.
    #[error("transport failed: {0}")]
    Transport(TransportError),

    /// The protocol instance was dropped before the query settled.
    #[error("protocol shut down")]
    Closed,
}

/// Best human-readable reason carried by an error payload.
fn remote_reason(payload: &MessagePayload) -> String {
    let data = &payload.data;
    data.get("message")
        .or_else(|| data.get("error"))
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| data.to_string(), ToOwned::to_owned)
}

impl Classified for ProtocolError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::NotConnected | Self::Transport(_) => ErrorCategory::Transport,
            Self::Closed => ErrorCategory::Internal,
            Self::Validation(_) | Self::Encode(_) | Self::Timeout { .. } | Self::Remote(_) => {
                ErrorCategory::Protocol
            }
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Timeout { .. } => ErrorSeverity::Transient,
            Self::Remote(_) => ErrorSeverity::Warning,
            Self::Validation(_) | Self::Encode(_) | Self::Transport(_) | Self::Closed => {
                ErrorSeverity::Error
            }
        }
    }
}
