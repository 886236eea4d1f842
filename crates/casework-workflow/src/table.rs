//! The transition table.
//!
//! At most one row per `(from, action)` pair, so transitions are
//! deterministic.

use crate::types::{WorkflowAction, WorkflowState};

/// One allowed status change and the record fields it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Source state.
    pub from: WorkflowState,
    /// Destination state.
    pub to: WorkflowState,
    /// Triggering action.
    pub action: WorkflowAction,
    /// Dotted field paths that must be present on the record.
    pub required_fields: &'static [&'static str],
}

/// Every allowed transition.
pub const TRANSITIONS: &[Transition] = &[
    Transition {
        from: WorkflowState::Draft,
        to: WorkflowState::PendingReview,
        action: WorkflowAction::SubmitReview,
        required_fields: &["clientId", "assessmentType", "dateTime", "location", "core"],
    },
    Transition {
        from: WorkflowState::PendingReview,
        to: WorkflowState::InReview,
        action: WorkflowAction::Approve,
        required_fields: &[],
    },
    Transition {
        from: WorkflowState::InReview,
        to: WorkflowState::RevisionRequired,
        action: WorkflowAction::RequestRevision,
        required_fields: &["observations"],
    },
    Transition {
        from: WorkflowState::RevisionRequired,
        to: WorkflowState::PendingReview,
        action: WorkflowAction::SubmitReview,
        required_fields: &[],
    },
    Transition {
        from: WorkflowState::InReview,
        to: WorkflowState::Completed,
        action: WorkflowAction::Complete,
        required_fields: &[],
    },
];

/// The row for `(from, action)`, if any.
pub fn lookup(from: WorkflowState, action: WorkflowAction) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.action == action)
}

/// Rows leaving `from`, in table order.
pub fn leaving(from: WorkflowState) -> impl Iterator<Item = &'static Transition> {
    TRANSITIONS.iter().filter(move |t| t.from == from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_is_deterministic() {
        let mut seen = HashSet::new();
        for t in TRANSITIONS {
            assert!(seen.insert((t.from, t.action)), "duplicate row {t:?}");
        }
    }

    #[test]
    fn nothing_leaves_completed() {
        assert_eq!(leaving(WorkflowState::Completed).count(), 0);
    }

    #[test]
    fn every_non_terminal_state_has_an_exit() {
        for s in WorkflowState::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(leaving(s).count() > 0, "{s} is a dead end");
        }
    }

    #[test]
    fn revision_loops_back_to_pending_review() {
        let t = lookup(WorkflowState::RevisionRequired, WorkflowAction::SubmitReview).unwrap();
        assert_eq!(t.to, WorkflowState::PendingReview);
    }

    #[test]
    fn save_draft_has_no_row() {
        for s in WorkflowState::ALL {
            assert!(lookup(s, WorkflowAction::SaveDraft).is_none());
        }
    }
}
