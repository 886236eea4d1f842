//! Synthetic transport for offline development and tests.
//!
//! Honors the same contract as the socket transport (connect, send, handler
//! slots, reconnect with backoff, failure after the attempt budget) without
//! touching the network:
//!
//! - a simulated connect delay
//! - a synthetic feed of dashboard frames on a fixed interval
//! - an optional responder that answers outbound envelopes
//! - test hooks to inject frames, drop the connection, and fail dials

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use casework_core::messages::now_timestamp;
use casework_core::{
    AgentMessage, BackoffPolicy, MessageId, MessageKind, MessagePayload, SessionId,
};
use casework_settings::TransportSettings;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde_json::{Value, json};
use tokio::sync::{Notify, watch};
use tokio::time::{Instant, Interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::Transport;
use crate::errors::TransportError;
use crate::handlers::Handlers;
use crate::link::Link;
use crate::reconnect::ReconnectPolicy;
use crate::state::ConnectionState;

/// Pseudo-URL reported in synthetic connect errors.
pub const MOCK_URL: &str = "mock://agents";

/// Builds an answer to an outbound envelope, or `None` to stay silent.
pub type Responder = Arc<dyn Fn(&AgentMessage) -> Option<AgentMessage> + Send + Sync>;

/// Behaviour of a [`MockTransport`].
#[derive(Clone, Debug)]
pub struct MockOptions {
    /// Simulated dial latency.
    pub connect_delay: Duration,
    /// Interval of the synthetic feed; `None` disables it.
    pub feed_interval: Option<Duration>,
    /// Reconnect backoff and attempt budget.
    pub reconnect: BackoffPolicy,
    /// Delay before a responder's answer is delivered.
    pub reply_delay: Duration,
}

impl MockOptions {
    /// Options mirroring the configured transport settings.
    #[must_use]
    pub fn from_settings(settings: &TransportSettings) -> Self {
        Self {
            connect_delay: Duration::from_millis(settings.mock_connect_delay_ms),
            feed_interval: Some(Duration::from_millis(settings.mock_interval_ms.max(1))),
            reconnect: settings.reconnect,
            reply_delay: Duration::ZERO,
        }
    }

    /// Instant connect, no feed. What most tests want.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            connect_delay: Duration::ZERO,
            feed_interval: None,
            reconnect: BackoffPolicy::default(),
            reply_delay: Duration::ZERO,
        }
    }
}

/// Network-free [`Transport`].
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    link: Link,
    options: MockOptions,
    sent: Mutex<Vec<String>>,
    responder: RwLock<Option<Responder>>,
    failing_dials: AtomicU32,
    drop_signal: Notify,
}

enum FeedEnd {
    Cancelled,
    Dropped,
}

impl MockTransport {
    /// Create a transport with the given behaviour.
    #[must_use]
    pub fn new(options: MockOptions) -> Self {
        Self {
            inner: Arc::new(MockInner {
                link: Link::new("mock"),
                options,
                sent: Mutex::new(Vec::new()),
                responder: RwLock::new(None),
                failing_dials: AtomicU32::new(0),
                drop_signal: Notify::new(),
            }),
        }
    }

    /// Install a responder for outbound envelopes.
    pub fn set_responder(&self, responder: Responder) {
        *self.inner.responder.write() = Some(responder);
    }

    /// Remove the responder.
    pub fn clear_responder(&self) {
        *self.inner.responder.write() = None;
    }

    /// Deliver `frame` to the message handler as if it came off the wire.
    ///
    /// Dropped with a warning when the transport is not open.
    pub fn inject(&self, frame: Value) {
        if self.inner.link.state().is_open() {
            self.inner.link.handlers.fire_message(frame);
        } else {
            warn!("mock transport not open, dropping injected frame");
        }
    }

    /// Every frame accepted by `send`, oldest first.
    pub fn sent_frames(&self) -> Vec<String> {
        self.inner.sent.lock().clone()
    }

    /// Accepted frames that decode as envelopes.
    pub fn sent_messages(&self) -> Vec<AgentMessage> {
        self.inner
            .sent
            .lock()
            .iter()
            .filter_map(|f| serde_json::from_str(f).ok())
            .collect()
    }

    /// Make the next `n` dials fail.
    pub fn fail_next_dials(&self, n: u32) {
        self.inner.failing_dials.store(n, Ordering::SeqCst);
    }

    /// Simulate an unexpected close of an open connection.
    pub fn drop_connection(&self) {
        if self.inner.link.state().is_open() {
            self.inner.drop_signal.notify_one();
        }
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.inner.link.abort();
    }
}

#[async_trait]
impl Transport for MockTransport {
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
        if !self.inner.link.state().is_open() {
            error!(state = %self.inner.link.state(), "cannot send, mock transport not open");
            return false;
        }
        self.inner.sent.lock().push(frame.to_owned());
        debug!(len = frame.len(), "mock frame sent");

        let responder = self.inner.responder.read().clone();
        if let Some(responder) = responder {
            respond(&self.inner, &responder, frame);
        }
        true
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

/// Run the responder and deliver its answer asynchronously, never from
/// inside `send`.
fn respond(inner: &Arc<MockInner>, responder: &Responder, frame: &str) {
    let Ok(msg) = serde_json::from_str::<AgentMessage>(frame) else {
        return;
    };
    let Some(reply) = responder(&msg) else {
        return;
    };
    let value = match serde_json::to_value(&reply) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to encode mock reply");
            return;
        }
    };
    let Ok(rt) = tokio::runtime::Handle::try_current() else {
        warn!("no runtime, dropping mock reply");
        return;
    };
    let inner = inner.clone();
    let delay = inner.options.reply_delay;
    let _ = rt.spawn(async move {
        tokio::time::sleep(delay).await;
        if inner.link.state().is_open() {
            inner.link.handlers.fire_message(value);
        }
    });
}

/// Responder that answers every QUERY with a RESPONSE echoing its data.
pub fn echo_responder() -> Responder {
    Arc::new(|msg: &AgentMessage| {
        (msg.kind == MessageKind::Query).then(|| {
            msg.reply(
                MessageKind::Response,
                MessagePayload::new(
                    msg.payload.action.clone(),
                    json!({ "status": "completed", "echo": msg.payload.data }),
                ),
            )
        })
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervisor
// ─────────────────────────────────────────────────────────────────────────────

async fn supervise(inner: Arc<MockInner>, cancel: CancellationToken) {
    let link = &inner.link;
    let mut policy = ReconnectPolicy::new(inner.options.reconnect);

    loop {
        link.set_state(ConnectionState::Connecting);
        tokio::select! {
            () = tokio::time::sleep(inner.options.connect_delay) => {}
            () = cancel.cancelled() => break,
        }

        let failing = inner
            .failing_dials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            link.record_error(TransportError::Connect {
                url: MOCK_URL.into(),
                reason: "simulated dial failure".into(),
            });
        } else {
            policy.reset();
            link.set_state(ConnectionState::Open);
            info!("mock transport connected");
            link.handlers.fire_open();
            match run_feed(&inner, &cancel).await {
                FeedEnd::Cancelled => {
                    link.handlers.fire_close(Some("client disconnect".into()));
                    break;
                }
                FeedEnd::Dropped => {
                    warn!("mock connection dropped");
                    link.handlers.fire_close(Some("simulated drop".into()));
                }
            }
        }

        if !link.backoff(&mut policy, &cancel).await {
            break;
        }
    }
}

async fn run_feed(inner: &MockInner, cancel: &CancellationToken) -> FeedEnd {
    let mut ticker = inner
        .options
        .feed_interval
        .map(|period| interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            () = cancel.cancelled() => return FeedEnd::Cancelled,
            () = inner.drop_signal.notified() => return FeedEnd::Dropped,
            () = next_tick(ticker.as_mut()) => {
                let frame = synthetic_frame(&mut rand::rng());
                inner.link.handlers.fire_message(frame);
            }
        }
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(t) => {
            let _ = t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Synthetic feed
// ─────────────────────────────────────────────────────────────────────────────

const CLIENTS: [&str; 2] = ["Sarah Johnson", "Robert Chen"];
const INSIGHT_KINDS: [&str; 3] = ["risk_alert", "progress_note", "safety_alert"];
const METRICS: [&str; 3] = ["activeAssessments", "insightsGenerated", "reportsCompleted"];
const AGENTS: [(&str, &str); 3] = [
    ("assessment_agent", "assessment"),
    ("analysis_agent", "analysis"),
    ("documentation_agent", "documentation"),
];

/// One random dashboard frame: a metric update, an insight, or a session
/// start.
pub fn synthetic_frame<R: Rng>(rng: &mut R) -> Value {
    match rng.random_range(0..3) {
        0 => json!({
            "type": "metric_update",
            "metric": METRICS[rng.random_range(0..METRICS.len())],
            "data": {
                "value": rng.random_range(0..10),
                "trend": rng.random_range(-10..10),
                "timestamp": now_timestamp(),
            },
            "source": { "type": "analysis", "id": "analysis_agent" },
        }),
        1 => {
            let roll: f64 = rng.random();
            let priority = if roll > 0.7 {
                "high"
            } else if roll > 0.4 {
                "medium"
            } else {
                "low"
            };
            let kind = INSIGHT_KINDS[rng.random_range(0..INSIGHT_KINDS.len())];
            let client = CLIENTS[rng.random_range(0..CLIENTS.len())];
            json!({
                "type": "insight_generated",
                "id": MessageId::new(),
                "payload": {
                    "message": format!("New {kind} for {client}"),
                    "priority": priority,
                },
                "source": { "type": "analysis", "id": "analysis_agent" },
            })
        }
        _ => {
            let (id, kind) = AGENTS[rng.random_range(0..AGENTS.len())];
            json!({
                "type": "session_started",
                "session_id": SessionId::new(),
                "source": { "type": kind, "id": id },
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
