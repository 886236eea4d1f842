//! Transport error types.

use casework_core::{Classified, ErrorCategory, ErrorSeverity};
use thiserror::Error;

/// Errors surfaced by a transport channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Endpoint that was dialled.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The connection broke while open.
    #[error("connection error: {0}")]
    Socket(String),

    /// No frame arrived for longer than the liveness timeout.
    #[error("connection silent for {missed} ping intervals, assuming half-open")]
    Unresponsive {
        /// Consecutive silent intervals.
        missed: u32,
    },

    /// Every reconnect attempt failed.
    #[error("connection failed after {attempts} reconnect attempts")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

impl Classified for TransportError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Transport
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Exhausted { .. } => ErrorSeverity::Error,
            Self::Connect { .. } | Self::Socket(_) | Self::Unresponsive { .. } => {
                ErrorSeverity::Transient
            }
        }
    }
}
