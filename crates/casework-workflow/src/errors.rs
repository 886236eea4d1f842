//! Transition rejections.
//!
//! Rejections are expected, user-correctable outcomes. They are returned as
//! values and serialize to `{code, message, missingFields}` for display.

use casework_core::{Classified, ErrorCategory, ErrorSeverity};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::types::{AssessmentVariant, WorkflowAction, WorkflowState};

/// Why a workflow transition was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionRejection {
    /// The record's `status` is missing or not a workflow state.
    #[error("Record status {} is not a workflow state", describe_status(.0.as_deref()))]
    UnknownState(Option<String>),

    /// No transition for this action leaves the current state.
    #[error("Invalid transition: Cannot perform {action} from {from}")]
    InvalidTransition {
        /// Current state.
        from: WorkflowState,
        /// Requested action.
        action: WorkflowAction,
    },

    /// Generic required fields are not filled in.
    #[error("Required fields missing for {action}: {}", .fields.join(", "))]
    MissingFields {
        /// Requested action.
        action: WorkflowAction,
        /// Every offending path.
        fields: Vec<String>,
    },

    /// The record's variant lacks its sub-form.
    #[error("{message}")]
    VariantIncomplete {
        /// Record variant.
        variant: AssessmentVariant,
        /// Missing sub-form field.
        field: &'static str,
        /// Display message.
        message: &'static str,
    },
}

fn describe_status(status: Option<&str>) -> String {
    status.map_or_else(|| "(missing)".to_owned(), |s| format!("'{s}'"))
}

impl TransitionRejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownState(_) => "unknown_state",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::MissingFields { .. } => "missing_required_fields",
            Self::VariantIncomplete { .. } => "variant_incomplete",
        }
    }

    /// Field paths the caller has to fill in.
    pub fn missing_fields(&self) -> Vec<&str> {
        match self {
            Self::MissingFields { fields, .. } => fields.iter().map(String::as_str).collect(),
            Self::VariantIncomplete { field, .. } => vec![*field],
            Self::UnknownState(_) | Self::InvalidTransition { .. } => Vec::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRejection<'a> {
    code: &'static str,
    message: String,
    missing_fields: Vec<&'a str>,
}

impl Serialize for TransitionRejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireRejection {
            code: self.code(),
            message: self.to_string(),
            missing_fields: self.missing_fields(),
        }
        .serialize(serializer)
    }
}

impl Classified for TransitionRejection {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Workflow
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_transition_message() {
        let r = TransitionRejection::InvalidTransition {
            from: WorkflowState::Completed,
            action: WorkflowAction::Approve,
        };
        assert_eq!(
            r.to_string(),
            "Invalid transition: Cannot perform approve from completed"
        );
        assert!(r.missing_fields().is_empty());
    }

    #[test]
    fn missing_fields_serialize() {
        let r = TransitionRejection::MissingFields {
            action: WorkflowAction::SubmitReview,
            fields: vec!["clientId".into(), "core".into()],
        };
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            json!({
                "code": "missing_required_fields",
                "message": "Required fields missing for submit_review: clientId, core",
                "missingFields": ["clientId", "core"],
            })
        );
    }

    #[test]
    fn variant_rejection_names_sub_form() {
        let r = TransitionRejection::VariantIncomplete {
            variant: AssessmentVariant::IhaForm1,
            field: "form1",
            message: "Form1 assessment data is required",
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["code"], "variant_incomplete");
        assert_eq!(v["missingFields"], json!(["form1"]));
    }

    #[test]
    fn unknown_state_message() {
        assert_eq!(
            TransitionRejection::UnknownState(None).to_string(),
            "Record status (missing) is not a workflow state"
        );
        assert_eq!(
            TransitionRejection::UnknownState(Some("archived".into())).to_string(),
            "Record status 'archived' is not a workflow state"
        );
    }

    #[test]
    fn rejections_are_user_correctable() {
        let r = TransitionRejection::UnknownState(None);
        assert_eq!(r.category(), ErrorCategory::Workflow);
        assert!(!r.is_retryable());
    }
}
