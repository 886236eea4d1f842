//! Workflow states, actions and record variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Generates `as_str`, `Display` and `FromStr` for a unit enum with fixed
/// wire names.
macro_rules! wire_names {
    ($ty:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Wire name.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!(concat!("unknown ", $what, " '{}'"), other)),
                }
            }
        }
    };
}

/// Status of a case record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Being written. Initial state.
    Draft,
    /// Submitted, waiting for a reviewer.
    PendingReview,
    /// A reviewer has it.
    InReview,
    /// Sent back to the author.
    RevisionRequired,
    /// Signed off. Terminal.
    Completed,
}

wire_names!(WorkflowState, "workflow state", {
    Draft => "draft",
    PendingReview => "pending_review",
    InReview => "in_review",
    RevisionRequired => "revision_required",
    Completed => "completed",
});

impl WorkflowState {
    /// Every state.
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::PendingReview,
        Self::InReview,
        Self::RevisionRequired,
        Self::Completed,
    ];

    /// No action leaves this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

/// What a user asks the workflow to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    /// Persist edits without a status change.
    SaveDraft,
    /// Hand the record to review.
    SubmitReview,
    /// Reviewer picks the record up.
    Approve,
    /// Reviewer sends the record back.
    RequestRevision,
    /// Reviewer signs off.
    Complete,
}

wire_names!(WorkflowAction, "workflow action", {
    SaveDraft => "save_draft",
    SubmitReview => "submit_review",
    Approve => "approve",
    RequestRevision => "request_revision",
    Complete => "complete",
});

impl WorkflowAction {
    /// Every action.
    pub const ALL: [Self; 5] = [
        Self::SaveDraft,
        Self::SubmitReview,
        Self::Approve,
        Self::RequestRevision,
        Self::Complete,
    ];
}

/// Assessment form variant, read from the record's `assessmentType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentVariant {
    /// In-home assessment, form 1.
    #[serde(rename = "IHA_FORM1")]
    IhaForm1,
    /// In-home assessment, CAT.
    IhaCat,
    /// In-home assessment, CAT situational.
    IhaCatSit,
    /// In-home assessment without a sub-form.
    BasicIha,
}

wire_names!(AssessmentVariant, "assessment variant", {
    IhaForm1 => "IHA_FORM1",
    IhaCat => "IHA_CAT",
    IhaCatSit => "IHA_CAT_SIT",
    BasicIha => "BASIC_IHA",
});
