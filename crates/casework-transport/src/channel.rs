//! The transport channel contract.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::error;

use crate::errors::TransportError;
use crate::handlers::Handlers;
use crate::state::ConnectionState;

/// Text frame sent on every keep-alive tick.
pub const PING_FRAME: &str = r#"{"type":"ping"}"#;

/// One logical duplex connection to a remote endpoint.
///
/// Implementations reconnect on their own after an unexpected close, using
/// capped exponential backoff, and give up after a fixed number of attempts
/// by firing the failed handler and moving to [`ConnectionState::Failed`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection.
    ///
    /// Idempotent while connecting or open. Resolves once the first dial
    /// either succeeds or fails; after a failure the transport keeps
    /// retrying in the background.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Close the connection and cancel any pending reconnect timer.
    async fn disconnect(&self);

    /// Queue a text frame for delivery.
    ///
    /// Returns `false` (and logs an error) when the channel is not open.
    /// Delivery is not guaranteed even when `true` is returned.
    fn send(&self, frame: &str) -> bool;

    /// Current state.
    fn state(&self) -> ConnectionState;

    /// Subscribe to state changes.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    /// Notification slots.
    fn handlers(&self) -> &Handlers;

    /// Whether [`send`](Self::send) can currently deliver.
    fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Serialize and send a JSON value.
    fn send_json(&self, value: &Value) -> bool {
        match serde_json::to_string(value) {
            Ok(text) => self.send(&text),
            Err(e) => {
                error!(error = %e, "failed to encode frame");
                false
            }
        }
    }
}
