//! Connection state, published on a `watch` channel.

use std::fmt;

/// Where a transport currently is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to be.
    #[default]
    Disconnected,
    /// Dialling.
    Connecting,
    /// Open; `send` delivers.
    Open,
    /// Waiting to retry after an unexpected close or failed dial.
    Reconnecting {
        /// 1-based attempt about to be made.
        attempt: u32,
        /// Delay before that attempt.
        delay_ms: u64,
    },
    /// Reconnect budget exhausted. Terminal until `connect` is called again.
    Failed,
}

impl ConnectionState {
    /// Whether frames can be sent.
    #[must_use]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// Whether a supervisor is working on (re)establishing the link.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Open | Self::Reconnecting { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "offline"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "online"),
            Self::Reconnecting { attempt, delay_ms } => {
                write!(f, "retrying (attempt {attempt} in {delay_ms}ms)")
            }
            Self::Failed => write!(f, "connection failed"),
        }
    }
}
