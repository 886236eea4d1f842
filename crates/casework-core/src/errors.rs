//! Error classification shared across crates.
//!
//! Each crate defines its own `thiserror` enum; they all implement
//! [`Classified`] so callers (the dispatcher, the CLI) can decide whether to
//! retry, surface or abort without matching on foreign error types.

use serde::{Deserialize, Serialize};

/// Which subsystem an error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Socket connect/send/close failures.
    Transport,
    /// Envelope validation, timeouts, remote error replies.
    Protocol,
    /// Task queue rule violations.
    Task,
    /// Workflow transition rejections.
    Workflow,
    /// Invalid settings.
    Configuration,
    /// Bugs and invariant violations.
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Protocol => write!(f, "protocol"),
            Self::Task => write!(f, "task"),
            Self::Workflow => write!(f, "workflow"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Error severity levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Temporary issue (retryable).
    Transient,
    /// Non-critical issue.
    Warning,
    /// Standard error.
    Error,
    /// Unrecoverable, the process should exit.
    Fatal,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Classification implemented by every crate-level error type.
pub trait Classified {
    /// Subsystem the error belongs to.
    fn category(&self) -> ErrorCategory;

    /// How bad it is.
    fn severity(&self) -> ErrorSeverity;

    /// Whether repeating the same operation may succeed.
    fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Transient
    }
}

/// Failure decoding an inbound frame into an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Frame is not JSON or does not match the envelope shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Classified for EnvelopeError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Protocol
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }
}
