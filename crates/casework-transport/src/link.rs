//! Supervisor scaffolding shared by the socket and synthetic transports.
//!
//! A [`Link`] owns the published [`ConnectionState`], the notification
//! slots, and the handle of the background supervisor task. `connect` starts
//! the supervisor and waits for its first outcome; `disconnect` cancels it
//! and waits for it to finish.

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::TransportError;
use crate::handlers::Handlers;
use crate::reconnect::ReconnectPolicy;
use crate::state::ConnectionState;

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// State, handlers and supervisor handle of one logical connection.
pub(crate) struct Link {
    kind: &'static str,
    state: watch::Sender<ConnectionState>,
    pub(crate) handlers: Handlers,
    running: Mutex<Option<Running>>,
    last_error: Mutex<Option<TransportError>>,
}

impl Link {
    pub(crate) fn new(kind: &'static str) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            kind,
            state,
            handlers: Handlers::default(),
            running: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(transport = self.kind, from = %prev, to = %next, "connection state");
        }
    }

    /// Log, remember and publish a non-terminal error.
    pub(crate) fn record_error(&self, err: TransportError) {
        warn!(transport = self.kind, error = %err, "transport error");
        self.handlers.fire_error(&err);
        *self.last_error.lock() = Some(err);
    }

    /// Start the supervisor unless one is already active, then wait until it
    /// either opens the connection or reports its first failure.
    ///
    /// A failed first dial is returned as an error, but the supervisor keeps
    /// retrying in the background per the reconnect policy. When a supervisor
    /// is already active but not open, this waits for the outcome of its next
    /// dial instead of starting another one.
    pub(crate) async fn start<F, Fut>(&self, supervise: F) -> Result<(), TransportError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = self.subscribe();
        {
            let mut running = self.running.lock();
            if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
                let state = self.state();
                if state.is_open() {
                    debug!(transport = self.kind, "connect ignored, already open");
                    return Ok(());
                }
                debug!(transport = self.kind, state = %state, "connect waiting on active supervisor");
            } else {
                *self.last_error.lock() = None;
                self.set_state(ConnectionState::Connecting);
                let cancel = CancellationToken::new();
                let task = tokio::spawn(supervise(cancel.clone()));
                *running = Some(Running { cancel, task });
            }
        }
        self.next_outcome(&mut rx).await
    }

    /// Wait for the result of the next dial: skip a pending backoff delay,
    /// then wait until the dial leaves `Connecting`.
    async fn next_outcome(
        &self,
        rx: &mut watch::Receiver<ConnectionState>,
    ) -> Result<(), TransportError> {
        let dialling = rx
            .wait_for(|s| !matches!(s, ConnectionState::Reconnecting { .. }))
            .await
            .map(|_| ());
        let settled = match dialling {
            Ok(()) => rx
                .wait_for(|s| *s != ConnectionState::Connecting)
                .await
                .map(|s| *s),
            Err(e) => Err(e),
        };
        match settled {
            Ok(ConnectionState::Open) => Ok(()),
            _ => Err(self
                .last_error
                .lock()
                .clone()
                .unwrap_or_else(|| TransportError::Socket("connection closed".into()))),
        }
    }

    /// Cancel the supervisor and any pending reconnect timer.
    pub(crate) async fn stop(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                error!(transport = self.kind, error = %e, "supervisor task panicked");
            }
            info!(transport = self.kind, "disconnected");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Cancel without waiting. Used on drop.
    pub(crate) fn abort(&self) {
        if let Some(running) = self.running.lock().take() {
            running.cancel.cancel();
        }
    }

    /// Schedule the next reconnect attempt and sleep through its delay.
    ///
    /// Returns `false` when the supervisor should stop: either it was
    /// cancelled or the attempt budget is spent, in which case the state
    /// becomes [`ConnectionState::Failed`] and the failed handler fires.
    pub(crate) async fn backoff(
        &self,
        policy: &mut ReconnectPolicy,
        cancel: &CancellationToken,
    ) -> bool {
        let Some((attempt, delay)) = policy.next_attempt() else {
            let err = TransportError::Exhausted {
                attempts: policy.attempt(),
            };
            error!(transport = self.kind, error = %err, "giving up");
            *self.last_error.lock() = Some(err.clone());
            self.set_state(ConnectionState::Failed);
            self.handlers.fire_failed(&err);
            return false;
        };

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        info!(transport = self.kind, attempt, delay_ms, "scheduling reconnect");
        self.set_state(ConnectionState::Reconnecting { attempt, delay_ms });
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = cancel.cancelled() => false,
        }
    }
}
