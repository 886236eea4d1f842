//! Notification slots.
//!
//! Each notification kind has exactly one slot. Registering a handler
//! replaces whatever was there before. Handlers are cloned out of the lock
//! before they run, so a handler may re-register or call back into the
//! transport.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::TransportError;

/// Called when the connection opens.
pub type OpenHandler = Arc<dyn Fn() + Send + Sync>;
/// Called with every decoded inbound JSON frame.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;
/// Called when an open connection closes, with the close reason if any.
pub type CloseHandler = Arc<dyn Fn(Option<String>) + Send + Sync>;
/// Called on connect and socket errors.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;
/// Called once when the reconnect budget is exhausted.
pub type FailedHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// One slot per notification kind.
#[derive(Default)]
pub struct Handlers {
    open: RwLock<Option<OpenHandler>>,
    message: RwLock<Option<MessageHandler>>,
    close: RwLock<Option<CloseHandler>>,
    error: RwLock<Option<ErrorHandler>>,
    failed: RwLock<Option<FailedHandler>>,
}

impl Handlers {
    /// Register the open handler.
    pub fn on_open(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.open.write() = Some(Arc::new(f));
    }

    /// Register the message handler.
    pub fn on_message(&self, f: impl Fn(Value) + Send + Sync + 'static) {
        *self.message.write() = Some(Arc::new(f));
    }

    /// Register the close handler.
    pub fn on_close(&self, f: impl Fn(Option<String>) + Send + Sync + 'static) {
        *self.close.write() = Some(Arc::new(f));
    }

    /// Register the error handler.
    pub fn on_error(&self, f: impl Fn(&TransportError) + Send + Sync + 'static) {
        *self.error.write() = Some(Arc::new(f));
    }

    /// Register the terminal "connection failed" handler.
    pub fn on_failed(&self, f: impl Fn(&TransportError) + Send + Sync + 'static) {
        *self.failed.write() = Some(Arc::new(f));
    }

    pub(crate) fn fire_open(&self) {
        let h = self.open.read().clone();
        if let Some(h) = h {
            h();
        }
    }

    pub(crate) fn fire_message(&self, frame: Value) {
        let h = self.message.read().clone();
        if let Some(h) = h {
            h(frame);
        }
    }

    pub(crate) fn fire_close(&self, reason: Option<String>) {
        let h = self.close.read().clone();
        if let Some(h) = h {
            h(reason);
        }
    }

    pub(crate) fn fire_error(&self, err: &TransportError) {
        let h = self.error.read().clone();
        if let Some(h) = h {
            h(err);
        }
    }

    pub(crate) fn fire_failed(&self, err: &TransportError) {
        let h = self.failed.read().clone();
        if let Some(h) = h {
            h(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn unregistered_slots_are_noops() {
        let h = Handlers::default();
        h.fire_open();
        h.fire_message(Value::Null);
        h.fire_close(None);
        h.fire_error(&TransportError::Socket("x".into()));
        h.fire_failed(&TransportError::Exhausted { attempts: 1 });
    }

    #[test]
    fn re_registering_replaces_handler() {
        let h = Handlers::default();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let f = first.clone();
        h.on_message(move |_| {
            let _ = f.fetch_add(1, Ordering::SeqCst);
        });
        let s = second.clone();
        h.on_message(move |_| {
            let _ = s.fetch_add(1, Ordering::SeqCst);
        });

        h.fire_message(serde_json::json!({"type": "ping"}));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_re_register_itself() {
        let h = Arc::new(Handlers::default());
        let h2 = h.clone();
        h.on_open(move || h2.on_open(|| {}));
        h.fire_open();
        h.fire_open();
    }
}
