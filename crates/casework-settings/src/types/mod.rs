//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may specify any subset of fields; missing fields get their compiled
//! default.

mod queues;
mod transport;

pub use queues::*;
pub use transport::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "transport": { "url": "ws://agents.internal:8000/agents/ws", "mock": false },
///   "protocol": { "queryTimeoutMs": 30000 },
///   "queues": { "capacity": 5 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseworkSettings {
    /// Transport channel settings.
    pub transport: TransportSettings,
    /// Message protocol settings.
    pub protocol: ProtocolSettings,
    /// Task queue settings.
    pub queues: QueueSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl CaseworkSettings {
    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(SettingsError::InvalidValue(msg.to_owned()));

        let t = &self.transport;
        if t.url.trim().is_empty() {
            return invalid("transport.url must not be empty");
        }
        if !t.mock && !(t.url.starts_with("ws://") || t.url.starts_with("wss://")) {
            return invalid("transport.url must use ws:// or wss://");
        }
        if t.reconnect.base_delay_ms == 0 {
            return invalid("transport.reconnect.baseDelayMs must be positive");
        }
        if t.reconnect.base_delay_ms > t.reconnect.max_delay_ms {
            return invalid("transport.reconnect.baseDelayMs exceeds maxDelayMs");
        }
        if t.ping_interval_ms == 0 {
            return invalid("transport.pingIntervalMs must be positive");
        }
        if t.liveness_timeout_ms < t.ping_interval_ms {
            return invalid("transport.livenessTimeoutMs must be at least pingIntervalMs");
        }
        if t.outbound_buffer == 0 {
            return invalid("transport.outboundBuffer must be at least 1");
        }
        if t.mock_interval_ms == 0 {
            return invalid("transport.mockIntervalMs must be positive");
        }
        if self.protocol.query_timeout_ms == 0 {
            return invalid("protocol.queryTimeoutMs must be positive");
        }
        if self.protocol.client_id.trim().is_empty() {
            return invalid("protocol.clientId must not be empty");
        }
        if self.queues.capacity == 0 {
            return invalid("queues.capacity must be at least 1");
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level or `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_are_valid() {
        CaseworkSettings::default().validate().unwrap();
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(CaseworkSettings::default()).unwrap();
        let transport = &json["transport"];
        assert_eq!(transport["url"], "ws://localhost:8000/agents/ws");
        assert_eq!(transport["reconnect"]["baseDelayMs"], 1000);
        assert_eq!(transport["pingIntervalMs"], 30_000);
        assert_eq!(json["protocol"]["queryTimeoutMs"], 30_000);
        assert_eq!(json["queues"]["maxRetries"], 3);
        assert_eq!(json["logging"]["level"], "info");
        // optional session id omitted when None
        assert!(json["protocol"].get("sessionId").is_none());
    }

    #[test]
    fn empty_json_produces_defaults() {
        let settings: CaseworkSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, CaseworkSettings::default());
    }

    // -- validate --

    fn rejected(settings: &CaseworkSettings, needle: &str) {
        let err = settings.validate().unwrap_err();
        assert_matches!(&err, SettingsError::InvalidValue(msg) if msg.contains(needle));
    }

    #[test]
    fn rejects_empty_url() {
        let mut s = CaseworkSettings::default();
        s.transport.url = "  ".into();
        rejected(&s, "transport.url");
    }

    #[test]
    fn rejects_http_url_unless_mock() {
        let mut s = CaseworkSettings::default();
        s.transport.url = "http://localhost:8000".into();
        rejected(&s, "ws://");
        s.transport.mock = true;
        s.validate().unwrap();
    }

    #[test]
    fn rejects_base_delay_above_cap() {
        let mut s = CaseworkSettings::default();
        s.transport.reconnect.base_delay_ms = 60_000;
        rejected(&s, "exceeds maxDelayMs");
    }

    #[test]
    fn rejects_liveness_shorter_than_ping() {
        let mut s = CaseworkSettings::default();
        s.transport.liveness_timeout_ms = 1_000;
        rejected(&s, "livenessTimeoutMs");
    }

    #[test]
    fn rejects_zero_timeout_and_capacity() {
        let mut s = CaseworkSettings::default();
        s.protocol.query_timeout_ms = 0;
        rejected(&s, "queryTimeoutMs");

        let mut s = CaseworkSettings::default();
        s.queues.capacity = 0;
        rejected(&s, "queues.capacity");
    }
}
