//! The agent message protocol.
//!
//! [`AgentProtocol`] sits on top of a [`Transport`] and adds:
//!
//! - envelope construction and validation for outbound messages
//! - request/response correlation for queries, with a timeout
//! - subscriptions for unsolicited EVENT/STREAM envelopes
//! - per-message delivery status tracking
//! - decoding of the dashboard notification stream
//!
//! It takes over the transport's message and failed handler slots. Callers
//! that want connection state should use [`AgentProtocol::watch_connection`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use casework_core::{
    AgentIdentifier, AgentMessage, CorrelationId, MessageId, MessageKind, MessageMetadata,
    MessagePayload, MessagePriority, MessageStatus, SessionId,
};
use casework_settings::ProtocolSettings;
use casework_transport::{ConnectionState, Transport, TransportError};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

use crate::dashboard::{DashboardEvent, InboundFrame, classify};
use crate::draft::MessageDraft;
use crate::errors::ProtocolError;
use crate::pending::{PendingQueries, QueryResult};
use crate::subscriptions::{Subscription, Subscriptions};
use crate::tracker::{MessageTracker, StatusUpdate};

const DASHBOARD_CHANNEL_CAPACITY: usize = 256;

/// Message protocol bound to one transport.
pub struct AgentProtocol {
    transport: Arc<dyn Transport>,
    settings: ProtocolSettings,
    session_id: SessionId,
    client: AgentIdentifier,
    pending: Arc<PendingQueries>,
    subscriptions: Arc<Subscriptions>,
    tracker: MessageTracker,
    dashboard: broadcast::Sender<DashboardEvent>,
}

impl AgentProtocol {
    /// Bind a protocol instance to `transport` and register its handlers.
    ///
    /// The session id comes from `settings.session_id`, or is generated.
    pub fn new(transport: Arc<dyn Transport>, settings: ProtocolSettings) -> Arc<Self> {
        let session_id = settings
            .session_id
            .clone()
            .map_or_else(SessionId::new, SessionId::from);
        let (dashboard, _) = broadcast::channel(DASHBOARD_CHANNEL_CAPACITY);
        let protocol = Arc::new(Self {
            client: AgentIdentifier::frontend(settings.client_id.clone()),
            transport,
            settings,
            session_id,
            pending: PendingQueries::new(),
            subscriptions: Subscriptions::new(),
            tracker: MessageTracker::default(),
            dashboard,
        });
        protocol.register_handlers();
        protocol
    }

    fn register_handlers(self: &Arc<Self>) {
        let handlers = self.transport.handlers();

        let weak: Weak<Self> = Arc::downgrade(self);
        handlers.on_message(move |frame| {
            if let Some(protocol) = weak.upgrade() {
                protocol.handle_frame(frame);
            }
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        handlers.on_failed(move |err: &TransportError| {
            if let Some(protocol) = weak.upgrade() {
                let failed = protocol
                    .pending
                    .fail_all(&ProtocolError::Transport(err.clone()));
                for correlation_id in &failed {
                    let _ = protocol
                        .tracker
                        .set_by_correlation(correlation_id, MessageStatus::Failed);
                }
                warn!(error = %err, failed_queries = failed.len(), "agent connection failed");
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────────────────────

    /// Open the underlying transport.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.transport.connect().await
    }

    /// Close the underlying transport.
    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Connection state changes, for an offline/retrying indicator.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.transport.watch_state()
    }

    /// Session id stamped on every outbound envelope.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a message without waiting for an answer.
    ///
    /// Fills in id, timestamp, source, session, `Pending` status and protocol
    /// version, validates the target id and action, and hands the envelope
    /// to the transport. A closed transport fails the message immediately;
    /// nothing is retried here.
    pub fn send_message(&self, draft: MessageDraft) -> Result<MessageId, ProtocolError> {
        let msg = self.build(draft)?;
        self.transmit(&msg)
    }

    /// Query a worker and wait for its answer.
    ///
    /// Resolves with the RESPONSE payload, or fails with the ERROR payload,
    /// a timeout after the configured query timeout, or a transport error,
    /// whichever comes first.
    pub async fn query_agent(
        &self,
        agent_id: &str,
        action: &str,
        data: Value,
        priority: MessagePriority,
    ) -> Result<MessagePayload, ProtocolError> {
        let draft = MessageDraft::new(
            MessageKind::Query,
            AgentIdentifier::agent(agent_id),
            MessagePayload::new(action, data),
        )
        .priority(priority);
        self.query(draft).await
    }

    /// Send a QUERY built from `draft` and wait for its answer.
    ///
    /// The draft's correlation id is used when set; its timeout defaults to
    /// the configured query timeout.
    pub async fn query(&self, mut draft: MessageDraft) -> Result<MessagePayload, ProtocolError> {
        draft.kind = MessageKind::Query;
        let correlation_id = draft.correlation_id.take().unwrap_or_default();
        draft.correlation_id = Some(correlation_id.clone());
        let timeout_ms = *draft
            .timeout_ms
            .get_or_insert(self.settings.query_timeout_ms);
        let action = draft.payload.action.clone();

        let msg = self.build(draft)?;
        let waiter = self.pending.register(correlation_id.clone())?;
        let message_id = self.transmit(&msg)?;

        match waiter.wait(Duration::from_millis(timeout_ms)).await {
            Some(result) => result,
            None => {
                let _ = self.tracker.set(&message_id, MessageStatus::Cancelled);
                warn!(
                    correlation_id = %correlation_id,
                    action = %action,
                    timeout_ms,
                    "agent query timed out"
                );
                Err(ProtocolError::Timeout { action, timeout_ms })
            }
        }
    }

    fn build(&self, draft: MessageDraft) -> Result<AgentMessage, ProtocolError> {
        if draft.target.id.trim().is_empty() {
            return Err(ProtocolError::Validation("target id is required".into()));
        }
        if draft.payload.action.trim().is_empty() {
            return Err(ProtocolError::Validation("payload action is required".into()));
        }
        let metadata = MessageMetadata {
            session_id: self.session_id.clone(),
            correlation_id: draft.correlation_id.unwrap_or_default(),
            timeout: draft.timeout_ms,
            user_context: draft.user_context,
        };
        let mut msg = AgentMessage::new(
            draft.kind,
            self.client.clone(),
            draft.target,
            draft.payload,
            metadata,
        )
        .with_priority(draft.priority);
        msg.version.clone_from(&self.settings.version);
        Ok(msg)
    }

    fn transmit(&self, msg: &AgentMessage) -> Result<MessageId, ProtocolError> {
        self.tracker.track(msg);
        let frame = match msg.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                let _ = self.tracker.set(&msg.id, MessageStatus::Failed);
                return Err(ProtocolError::Encode(e.to_string()));
            }
        };
        if self.transport.send(&frame) {
            let _ = self.tracker.set(&msg.id, MessageStatus::Processing);
            debug!(
                message_id = %msg.id,
                kind = %msg.kind,
                target = %msg.target.id,
                action = %msg.payload.action,
                "message sent"
            );
            Ok(msg.id.clone())
        } else {
            let _ = self.tracker.set(&msg.id, MessageStatus::Failed);
            warn!(
                message_id = %msg.id,
                action = %msg.payload.action,
                state = %self.transport.state(),
                "message not sent, agent connection unavailable"
            );
            Err(ProtocolError::NotConnected)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions and observers
    // ─────────────────────────────────────────────────────────────────────────

    /// Call `callback` for every EVENT or STREAM envelope with `action` sent
    /// by `source_id`.
    pub fn subscribe_to_agent(
        &self,
        source_id: &str,
        action: &str,
        callback: impl Fn(&AgentMessage) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscriptions.add(source_id, action, Arc::new(callback))
    }

    /// Delivery status of a sent message.
    pub fn message_status(&self, id: &MessageId) -> Option<MessageStatus> {
        self.tracker.status(id)
    }

    /// Delivery status changes.
    pub fn status_updates(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tracker.subscribe()
    }

    /// Decoded dashboard notifications.
    pub fn dashboard_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.dashboard.subscribe()
    }

    /// Number of messages whose delivery status is still held.
    pub fn tracked_messages(&self) -> usize {
        self.tracker.len()
    }

    /// Number of queries waiting for an answer.
    pub fn pending_queries(&self) -> usize {
        self.pending.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Route one decoded inbound frame.
    pub fn handle_frame(&self, frame: Value) {
        match classify(frame) {
            Ok(InboundFrame::Keepalive) => trace!("keep-alive frame"),
            Ok(InboundFrame::Dashboard(event)) => {
                debug!(kind = event.kind(), "dashboard event");
                let _ = self.dashboard.send(event);
            }
            Ok(InboundFrame::Message(msg)) => self.dispatch(*msg),
            Err(e) => warn!(error = %e, "dropping malformed inbound frame"),
        }
    }

    fn dispatch(&self, msg: AgentMessage) {
        let correlation_id = msg.metadata.correlation_id.clone();
        match msg.kind {
            MessageKind::Response => {
                let _ = self
                    .tracker
                    .set_by_correlation(&correlation_id, MessageStatus::Completed);
                self.settle(&correlation_id, &msg.source.id, Ok(msg.payload));
            }
            MessageKind::Error => {
                let _ = self
                    .tracker
                    .set_by_correlation(&correlation_id, MessageStatus::Failed);
                self.settle(
                    &correlation_id,
                    &msg.source.id,
                    Err(ProtocolError::Remote(msg.payload)),
                );
            }
            MessageKind::Event | MessageKind::Stream => {
                let delivered = self.subscriptions.dispatch(&msg);
                if delivered == 0 {
                    trace!(
                        source = %msg.source.id,
                        action = %msg.payload.action,
                        "no subscribers for event"
                    );
                }
            }
            MessageKind::Status => {
                if !self.tracker.set_by_correlation(&correlation_id, msg.status) {
                    debug!(correlation_id = %correlation_id, status = ?msg.status, "status for untracked message");
                }
            }
            MessageKind::Command | MessageKind::Query => {
                info!(
                    kind = %msg.kind,
                    source = %msg.source.id,
                    action = %msg.payload.action,
                    "ignoring inbound request, this endpoint does not serve agents"
                );
            }
        }
    }

    fn settle(&self, correlation_id: &CorrelationId, source: &str, result: QueryResult) {
        if !self.pending.settle(correlation_id, result) {
            warn!(
                correlation_id = %correlation_id,
                source = %source,
                "no pending query for correlation id, dropping"
            );
        }
    }
}
