//! # casework-transport
//!
//! The transport channel: one logical duplex connection to the worker
//! endpoint that hides reconnection from everything above it.
//!
//! - [`Transport`]: connect / disconnect / send, one handler slot per
//!   notification kind, and a [`ConnectionState`] watch for the
//!   online/retrying indicator
//! - [`WsTransport`]: `tokio-tungstenite` client with capped exponential
//!   backoff reconnects and a closed-loop keep-alive
//! - [`MockTransport`]: the same contract without a network, driven by a
//!   synthetic feed and an optional responder
//!
//! Reconnect delays follow `min(base * 2^(attempt-1), cap)`, 1s base and
//! 30s cap by default, reset on every successful open, and stop after the
//! attempt budget (5 by default) with a terminal failed notification.

#![deny(unsafe_code)]

pub mod channel;
pub mod errors;
pub mod handlers;
mod link;
pub mod liveness;
pub mod mock;
pub mod reconnect;
pub mod state;
pub mod ws;

use std::sync::Arc;

use casework_settings::TransportSettings;

pub use channel::{PING_FRAME, Transport};
pub use errors::TransportError;
pub use handlers::Handlers;
pub use mock::{MockOptions, MockTransport, Responder, echo_responder};
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;
pub use ws::WsTransport;

/// Build the transport selected by `settings.mock`.
///
/// The synthetic transport built here answers queries with
/// [`echo_responder`] so the whole stack runs offline.
pub fn from_settings(settings: &TransportSettings) -> Arc<dyn Transport> {
    if settings.mock {
        let mock = MockTransport::new(MockOptions::from_settings(settings));
        mock.set_responder(echo_responder());
        Arc::new(mock)
    } else {
        Arc::new(WsTransport::new(settings.clone()))
    }
}
