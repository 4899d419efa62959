//! Transition table for the invoice pipeline.
//!
//! | current node | action                                   | next node          |
//! |--------------|------------------------------------------|--------------------|
//! | start        | invoke extraction                        | mapping            |
//! | mapping      | invoke mapping                           | validation         |
//! | validation   | invoke validation                        | report             |
//! | report       | invoke report                            | branch             |
//! | branch       | `requires_human_review`                  | `PENDING_REVIEW`   |
//! | branch       | `valid`                                  | conversion         |
//! | branch       | otherwise                                | `REJECTED`         |
//! | conversion   | invoke conversion for every target       | integration        |
//! | integration  | invoke integration for every target      | `COMPLETED`        |

use super::errors::{StateMachineError, StateMachineResult};
use super::events::ReviewDecision;
use super::states::{FlowStatus, Stage};

/// Outcome of the conditional node evaluated after the report stage
pub fn branch(requires_human_review: bool, valid: Option<bool>) -> FlowStatus {
    if requires_human_review {
        FlowStatus::PendingReview
    } else if valid == Some(true) {
        FlowStatus::Running(Stage::Conversion)
    } else {
        FlowStatus::Rejected
    }
}

/// Status that follows a successfully completed stage
///
/// The branch inputs are only consulted after the report stage.
pub fn next_after(stage: Stage, requires_human_review: bool, valid: Option<bool>) -> FlowStatus {
    match stage {
        Stage::Extraction => FlowStatus::Running(Stage::Mapping),
        Stage::Mapping => FlowStatus::Running(Stage::Validation),
        Stage::Validation => FlowStatus::Running(Stage::Report),
        Stage::Report => branch(requires_human_review, valid),
        Stage::Conversion => FlowStatus::Running(Stage::Integration),
        Stage::Integration => FlowStatus::Completed,
    }
}

/// Status a review decision moves a suspended flow into
pub fn after_review(decision: ReviewDecision) -> FlowStatus {
    match decision {
        ReviewDecision::Approve => FlowStatus::Running(Stage::Conversion),
        ReviewDecision::Reject => FlowStatus::Rejected,
    }
}

/// Check that `to` is a legal successor of `from`
pub fn check_transition(from: FlowStatus, to: FlowStatus) -> StateMachineResult<()> {
    use FlowStatus::*;

    let allowed = match (from, to) {
        (Started, Running(Stage::Extraction)) => true,
        (Running(Stage::Extraction), Running(Stage::Mapping)) => true,
        (Running(Stage::Mapping), Running(Stage::Validation)) => true,
        (Running(Stage::Validation), Running(Stage::Report)) => true,
        (Running(Stage::Report), PendingReview | Rejected | Running(Stage::Conversion)) => true,
        (PendingReview, Running(Stage::Conversion) | Rejected) => true,
        (Running(Stage::Conversion), Running(Stage::Integration)) => true,
        (Running(Stage::Integration), Completed) => true,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(StateMachineError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
