//! Workflow evaluation over a case record.
//!
//! Every operation is a pure function of `(record, action)`: nothing here
//! mutates the record. Callers persist the returned state themselves.

use serde_json::Value;
use tracing::debug;

use crate::errors::TransitionRejection;
use crate::fields::missing_fields;
use crate::table::{leaving, lookup};
use crate::types::{WorkflowAction, WorkflowState};
use crate::variants::{VARIANT_RULES, variant_of, violated_rule};

/// Case record workflow.
pub struct Workflow;

impl Workflow {
    /// The record's current state, read from its `status` field.
    pub fn current_state(record: &Value) -> Result<WorkflowState, TransitionRejection> {
        let status = record.get("status").and_then(Value::as_str);
        status
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| TransitionRejection::UnknownState(status.map(str::to_owned)))
    }

    /// Actions with a transition out of the record's current state.
    ///
    /// Empty for a terminal or unrecognised state.
    pub fn get_available_actions(record: &Value) -> Vec<WorkflowAction> {
        Self::current_state(record)
            .map(|s| leaving(s).map(|t| t.action).collect())
            .unwrap_or_default()
    }

    /// Check whether `action` may be applied and return the destination.
    ///
    /// Fails when no transition matches, when any required field is
    /// missing (all of them are reported), or, for `submit_review`, when the
    /// record's variant lacks its sub-form.
    pub fn transition_workflow(
        record: &Value,
        action: WorkflowAction,
    ) -> Result<WorkflowState, TransitionRejection> {
        let result = Self::evaluate(record, action);
        match &result {
            Ok(to) => debug!(action = %action, to = %to, "transition allowed"),
            Err(rejection) => debug!(action = %action, code = rejection.code(), "transition rejected"),
        }
        result
    }

    fn evaluate(record: &Value, action: WorkflowAction) -> Result<WorkflowState, TransitionRejection> {
        let from = Self::current_state(record)?;
        let transition =
            lookup(from, action).ok_or(TransitionRejection::InvalidTransition { from, action })?;

        let fields = missing_fields(record, transition.required_fields);
        if !fields.is_empty() {
            return Err(TransitionRejection::MissingFields { action, fields });
        }

        if action == WorkflowAction::SubmitReview {
            if let Some(rule) = violated_rule(record) {
                return Err(TransitionRejection::VariantIncomplete {
                    variant: rule.variant,
                    field: rule.field,
                    message: rule.message,
                });
            }
        }

        Ok(transition.to)
    }

    /// Field paths the transition for `action` would check, empty when no
    /// transition matches. Includes the variant sub-form for
    /// `submit_review`.
    pub fn required_fields(record: &Value, action: WorkflowAction) -> Vec<&'static str> {
        let Some(transition) = Self::current_state(record)
            .ok()
            .and_then(|from| lookup(from, action))
        else {
            return Vec::new();
        };
        let mut fields = transition.required_fields.to_vec();
        if action == WorkflowAction::SubmitReview {
            if let Some(variant) = variant_of(record) {
                fields.extend(
                    VARIANT_RULES
                        .iter()
                        .filter(|r| r.variant == variant)
                        .map(|r| r.field),
                );
            }
        }
        fields
    }
}
