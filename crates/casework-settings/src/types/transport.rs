//! Transport channel and message protocol settings.

use casework_core::BackoffPolicy;
use serde::{Deserialize, Serialize};

/// Default worker endpoint.
pub const DEFAULT_AGENT_WS_URL: &str = "ws://localhost:8000/agents/ws";

/// Transport channel settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Worker endpoint URL.
    pub url: String,
    /// Reconnect backoff and attempt budget.
    pub reconnect: BackoffPolicy,
    /// Keep-alive ping interval in milliseconds.
    pub ping_interval_ms: u64,
    /// Silence after which an open connection is considered half-open.
    pub liveness_timeout_ms: u64,
    /// Use the synthetic transport instead of a socket.
    pub mock: bool,
    /// Interval between synthetic frames in milliseconds.
    pub mock_interval_ms: u64,
    /// Simulated connect latency of the synthetic transport.
    pub mock_connect_delay_ms: u64,
    /// Capacity of the outbound frame buffer.
    pub outbound_buffer: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_AGENT_WS_URL.to_string(),
            reconnect: BackoffPolicy::default(),
            ping_interval_ms: 30_000,
            liveness_timeout_ms: 90_000,
            mock: false,
            mock_interval_ms: 3_000,
            mock_connect_delay_ms: 1_000,
            outbound_buffer: 256,
        }
    }
}

impl TransportSettings {
    /// Consecutive silent ping intervals tolerated before the connection is
    /// dropped. Always at least 1.
    #[must_use]
    pub fn max_missed_pings(&self) -> u32 {
        let n = self.liveness_timeout_ms / self.ping_interval_ms.max(1);
        u32::try_from(n).unwrap_or(u32::MAX).max(1)
    }
}

/// Message protocol settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSettings {
    /// How long a query waits for its response, in milliseconds.
    pub query_timeout_ms: u64,
    /// Protocol version stamped on outbound envelopes.
    pub version: String,
    /// Id this client uses as the envelope source.
    pub client_id: String,
    /// Fixed session id; a fresh one is generated per process when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            query_timeout_ms: 30_000,
            version: casework_core::constants::PROTOCOL_VERSION.to_string(),
            client_id: "client".to_string(),
            session_id: None,
        }
    }
}
