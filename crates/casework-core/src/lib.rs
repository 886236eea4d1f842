//! # casework-core
//!
//! Foundation types shared by every casework crate.
//!
//! - **Branded IDs**: `MessageId`, `CorrelationId`, `SessionId`, `TaskId` as
//!   newtypes so a correlation id can never be passed where a message id is
//!   expected
//! - **Envelope**: [`messages::AgentMessage`], the JSON frame exchanged with
//!   remote workers, and its closed enums (`MessageKind`, `MessageStatus`, ...)
//! - **Errors**: [`errors::ErrorCategory`] / [`errors::ErrorSeverity`] and the
//!   [`errors::Classified`] trait every crate error implements
//! - **Backoff**: capped exponential backoff math and an async retry helper
//! - **Logging**: `tracing` subscriber bootstrap and log capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod retry;

pub use errors::{Classified, EnvelopeError, ErrorCategory, ErrorSeverity};
pub use ids::{CorrelationId, MessageId, SessionId, SubscriptionId, TaskId};
pub use messages::{
    AgentIdentifier, AgentMessage, EndpointKind, MessageKind, MessageMetadata, MessagePayload,
    MessagePriority, MessageStatus,
};
pub use retry::{BackoffPolicy, calculate_backoff_delay, retry_with_backoff};
