//! # casework-protocol
//!
//! The message protocol layered over a casework transport.
//!
//! - [`AgentProtocol`]: builds and validates envelopes, correlates queries
//!   with their RESPONSE/ERROR by correlation id, fans EVENT/STREAM
//!   envelopes out to subscribers, and tracks delivery status
//! - [`PendingQueries`]: the correlation table; every entry is released on
//!   response, error, timeout or transport failure
//! - [`DashboardEvent`]: the flat metric/insight/session frames workers push
//!   for the live dashboard
//!
//! Transmission failures are reported, never retried here; callers retry
//! with [`casework_core::retry_with_backoff`] when they want to.

#![deny(unsafe_code)]

pub mod dashboard;
pub mod draft;
pub mod errors;
pub mod pending;
pub mod protocol;
pub mod subscriptions;
pub mod tracker;

pub use dashboard::{
    DashboardEvent, DashboardSource, InboundFrame, InsightPayload, InsightPriority, MetricData,
    classify,
};
pub use draft::MessageDraft;
pub use errors::ProtocolError;
pub use pending::{PendingQueries, PendingQuery, QueryResult};
pub use protocol::AgentProtocol;
pub use subscriptions::{EventCallback, Subscription, Subscriptions};
pub use tracker::{MessageTracker, StatusUpdate};
