//! WebSocket transport over `tokio-tungstenite`.
//!
//! A background supervisor dials the endpoint, runs the session loop while
//! the socket is open, and reconnects with capped exponential backoff after
//! an unexpected close. The session loop multiplexes four sources:
//!
//! - cancellation from [`Transport::disconnect`]
//! - outbound frames queued by [`Transport::send`]
//! - inbound socket messages
//! - the keep-alive ticker, which sends `{"type":"ping"}` and drops the
//!   connection after too many silent intervals

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use casework_settings::TransportSettings;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, interval_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{PING_FRAME, Transport};
use crate::errors::TransportError;
use crate::handlers::Handlers;
use crate::link::Link;
use crate::liveness::{Liveness, Tick};
use crate::reconnect::ReconnectPolicy;
use crate::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reconnecting WebSocket client.
pub struct WsTransport {
    inner: Arc<WsInner>,
}

struct WsInner {
    link: Link,
    settings: TransportSettings,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
}

/// Why a session loop returned.
enum SessionEnd {
    Cancelled,
    Closed(Option<String>),
    Failed(TransportError),
}

impl WsTransport {
    /// Create a transport for `settings.url`. Nothing is dialled until
    /// [`Transport::connect`].
    #[must_use]
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            inner: Arc::new(WsInner {
                link: Link::new("ws"),
                settings,
                outbound: Mutex::new(None),
            }),
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.inner.settings.url
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.inner.link.abort();
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let inner = self.inner.clone();
        self.inner
            .link
            .start(move |cancel| supervise(inner, cancel))
            .await
    }

    async fn disconnect(&self) {
        self.inner.link.stop().await;
    }

    fn send(&self, frame: &str) -> bool {
        let tx = self.inner.outbound.lock().clone();
        let Some(tx) = tx.filter(|_| self.inner.link.state().is_open()) else {
            error!(state = %self.inner.link.state(), "cannot send, connection not open");
            return false;
        };
        match tx.try_send(frame.to_owned()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("outbound buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("cannot send, connection closing");
                false
            }
        }
    }

    fn state(&self) -> ConnectionState {
        self.inner.link.state()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.link.subscribe()
    }

    fn handlers(&self) -> &Handlers {
        &self.inner.link.handlers
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

async fn supervise(inner: Arc<WsInner>, cancel: CancellationToken) {
    let link = &inner.link;
    let url = inner.settings.url.clone();
    let mut policy = ReconnectPolicy::new(inner.settings.reconnect);

    loop {
        link.set_state(ConnectionState::Connecting);
        debug!(url = %url, attempt = policy.attempt(), "dialling");

        let dialled = tokio::select! {
            r = connect_async(url.as_str()) => r,
            () = cancel.cancelled() => break,
        };

        match dialled {
            Ok((ws, _response)) => {
                policy.reset();
                info!(url = %url, "connected");
                match run_session(&inner, ws, &cancel).await {
                    SessionEnd::Cancelled => {
                        link.handlers.fire_close(Some("client disconnect".into()));
                        break;
                    }
                    SessionEnd::Closed(reason) => {
                        warn!(url = %url, reason = ?reason, "connection closed by peer");
                        link.handlers.fire_close(reason);
                    }
                    SessionEnd::Failed(err) => {
                        link.record_error(err);
                        link.handlers.fire_close(None);
                    }
                }
            }
            Err(e) => link.record_error(TransportError::Connect {
                url: url.clone(),
                reason: e.to_string(),
            }),
        }

        if !link.backoff(&mut policy, &cancel).await {
            break;
        }
    }
}

async fn run_session(inner: &WsInner, ws: WsStream, cancel: &CancellationToken) -> SessionEnd {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(inner.settings.outbound_buffer.max(1));
    *inner.outbound.lock() = Some(tx);
    inner.link.set_state(ConnectionState::Open);
    inner.link.handlers.fire_open();

    let period = Duration::from_millis(inner.settings.ping_interval_ms.max(1));
    let mut ping = interval_at(Instant::now() + period, period);
    let mut liveness = Liveness::new(inner.settings.max_missed_pings());

    let end = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break SessionEnd::Cancelled;
            }
            Some(text) = rx.recv() => {
                if let Err(e) = ws_tx.send(Message::text(text)).await {
                    break SessionEnd::Failed(TransportError::Socket(e.to_string()));
                }
            }
            msg = ws_rx.next() => {
                let msg = match msg {
                    None => break SessionEnd::Closed(None),
                    Some(Err(e)) => break SessionEnd::Failed(TransportError::Socket(e.to_string())),
                    Some(Ok(msg)) => msg,
                };
                liveness.mark_alive();
                match msg {
                    Message::Text(text) => deliver(&inner.link, text.as_str()),
                    Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                        Ok(text) => deliver(&inner.link, text),
                        Err(_) => debug!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                    },
                    Message::Close(frame) => {
                        break SessionEnd::Closed(frame.map(|f| f.reason.as_str().to_owned()));
                    }
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
            _ = ping.tick() => {
                match liveness.tick() {
                    Tick::TimedOut(missed) => {
                        break SessionEnd::Failed(TransportError::Unresponsive { missed });
                    }
                    Tick::Missed(missed) => debug!(missed, "no traffic since last ping"),
                    Tick::Alive => {}
                }
                if let Err(e) = ws_tx.send(Message::text(PING_FRAME)).await {
                    break SessionEnd::Failed(TransportError::Socket(e.to_string()));
                }
            }
        }
    };

    *inner.outbound.lock() = None;
    end
}

/// Decode a text frame and hand it to the message handler.
fn deliver(link: &Link, text: &str) {
    match serde_json::from_str::<Value>(text) {
        Ok(frame) => link.handlers.fire_message(frame),
        Err(e) => warn!(error = %e, len = text.len(), "dropping non-JSON frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_core::BackoffPolicy;
    use casework_core::logging::capture_logs;

    fn unreachable_settings(max_attempts: u32) -> TransportSettings {
        TransportSettings {
            // port 9 (discard) on loopback is closed on any sane test host
            url: "ws://127.0.0.1:9/agents/ws".into(),
            reconnect: BackoffPolicy {
                base_delay_ms: 10,
                max_delay_ms: 40,
                max_attempts,
            },
            ..TransportSettings::default()
        }
    }

    #[tokio::test]
    async fn send_before_connect_fails_and_logs() {
        let (logs, _guard) = capture_logs();
        let t = WsTransport::new(TransportSettings::default());
        assert!(!t.send(PING_FRAME));
        assert!(!t.is_connected());
        assert!(logs.has_event(tracing::Level::ERROR, "connection not open"));
    }

    #[tokio::test]
    async fn refused_dial_reports_connect_error() {
        let t = WsTransport::new(unreachable_settings(0));
        let err = t.connect().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connect { .. } | TransportError::Exhausted { .. }
        ));
        let mut rx = t.watch_state();
        let _ = rx.wait_for(|s| *s == ConnectionState::Failed).await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_budget_fires_failed_once() {
        let t = WsTransport::new(unreachable_settings(2));
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
        t.handlers().on_failed(move |e| {
            let _ = fail_tx.send(e.clone());
        });
        let _ = t.connect().await;
        let err = fail_rx.recv().await.unwrap();
        assert_eq!(err, TransportError::Exhausted { attempts: 2 });
        assert_eq!(t.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn disconnect_cancels_pending_reconnect() {
        let mut settings = unreachable_settings(5);
        settings.reconnect.base_delay_ms = 60_000;
        settings.reconnect.max_delay_ms = 60_000;
        let t = WsTransport::new(settings);
        let _ = t.connect().await;
        let mut rx = t.watch_state();
        let _ = rx
            .wait_for(|s| matches!(s, ConnectionState::Reconnecting { attempt: 1, .. }))
            .await
            .unwrap();
        t.disconnect().await;
        assert_eq!(t.state(), ConnectionState::Disconnected);
    }
}
