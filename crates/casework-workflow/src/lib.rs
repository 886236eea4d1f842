//! # casework-workflow
//!
//! Gates case record status changes behind completeness checks.
//!
//! - [`Workflow`]: available actions, transition evaluation and required
//!   field introspection for a JSON case record
//! - [`TRANSITIONS`]: the static, deterministic transition table
//! - [`TransitionRejection`]: structured, serializable refusal reasons
//!
//! Evaluation never mutates the record; the caller persists the returned
//! state.

#![deny(unsafe_code)]

pub mod errors;
pub mod fields;
pub mod machine;
pub mod table;
pub mod types;
pub mod variants;

pub use errors::TransitionRejection;
pub use machine::Workflow;
pub use table::{TRANSITIONS, Transition};
pub use types::{AssessmentVariant, WorkflowAction, WorkflowState};
pub use variants::{VARIANT_RULES, VariantRule};
