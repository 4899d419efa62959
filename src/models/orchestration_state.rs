//! # Orchestration State Model
//!
//! The durable snapshot of one document's journey through the pipeline.
//!
//! ## Overview
//!
//! An `OrchestrationState` is created when a document enters the pipeline and is
//! mutated only by the flow engine's node handlers, one field-set per node. After
//! every mutation the whole snapshot is persisted, keyed by `document_id`.
//! Snapshots are never deleted: paused and rejected flows remain queryable as an
//! audit trail.
//!
//! ## Snapshot Format
//!
//! Snapshots serialize to a flat JSON object:
//!
//! ```json
//! {
//!   "document_id": "inv-2024-0042",
//!   "stage_outputs": {
//!     "extraction": "OCR-3f2a",
//!     "conversion": { "tally": "CONV-11", "zoho": "CONV-12" }
//!   },
//!   "valid": true,
//!   "requires_human_review": false,
//!   "status": "RUNNING_INTEGRATION",
//!   "errors": [],
//!   "warnings": ["vendor GSTIN missing"]
//! }
//! ```
//!
//! Every field other than `document_id` defaults when absent and unknown fields
//! are ignored, so a snapshot written by one version stays loadable by later ones.
//!
//! ## Invariants
//!
//! - `status` only moves along the transition table (see `state_machine::transitions`)
//! - a stage key in `stage_outputs` exists iff that stage completed; keys are never
//!   overwritten or removed
//! - `errors` and `warnings` are append-only

use crate::error::StageFailureKind;
use crate::state_machine::transitions::check_transition;
use crate::state_machine::{
    FlowStatus, ReviewDecision, Stage, StateMachineError, StateMachineResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier(s) produced by a completed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageOutput {
    /// Single reference (extraction, mapping, validation, report)
    Reference(String),
    /// One reference per conversion target (conversion, integration)
    PerTarget(BTreeMap<String, String>),
}

impl StageOutput {
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Reference(reference) => Some(reference),
            Self::PerTarget(_) => None,
        }
    }

    pub fn for_target(&self, target: &str) -> Option<&str> {
        match self {
            Self::Reference(_) => None,
            Self::PerTarget(references) => references.get(target).map(String::as_str),
        }
    }
}

/// Where and why the flow last stopped on a failed stage call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHalt {
    pub stage: Stage,
    pub kind: StageFailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Human review decision kept for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub notes: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Full orchestration snapshot for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationState {
    /// Stable identifier assigned at ingestion; persistence key
    pub document_id: String,
    #[serde(default)]
    pub stage_outputs: BTreeMap<Stage, StageOutput>,
    /// Unknown until validation completes
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default)]
    pub requires_human_review: bool,
    #[serde(default)]
    pub status: FlowStatus,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub halted: Option<StageHalt>,
    #[serde(default)]
    pub review: Option<ReviewRecord>,
    /// Unix epoch when the stored snapshot predates timestamps
    #[serde(default = "unrecorded_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "unrecorded_timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn unrecorded_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl OrchestrationState {
    /// Create the initial snapshot for a document entering the pipeline
    pub fn new(document_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.into(),
            stage_outputs: BTreeMap::new(),
            valid: None,
            requires_human_review: false,
            status: FlowStatus::Started,
            errors: Vec::new(),
            warnings: Vec::new(),
            halted: None,
            review: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn output(&self, stage: Stage) -> Option<&StageOutput> {
        self.stage_outputs.get(&stage)
    }

    /// Single reference recorded by `stage`
    pub fn reference(&self, stage: Stage) -> Option<&str> {
        self.output(stage).and_then(StageOutput::reference)
    }

    /// Per-target reference recorded by `stage`
    pub fn target_reference(&self, stage: Stage, target: &str) -> Option<&str> {
        self.output(stage).and_then(|output| output.for_target(target))
    }

    pub fn has_completed(&self, stage: Stage) -> bool {
        self.stage_outputs.contains_key(&stage)
    }

    /// Stages with a recorded output, in pipeline order
    pub fn completed_stages(&self) -> Vec<Stage> {
        self.stage_outputs.keys().copied().collect()
    }

    /// Record the output of a completed stage; existing keys are never replaced
    pub fn record_output(&mut self, stage: Stage, output: StageOutput) -> StateMachineResult<()> {
        if self.stage_outputs.contains_key(&stage) {
            return Err(StateMachineError::OutputAlreadyRecorded {
                stage: stage.to_string(),
            });
        }
        self.stage_outputs.insert(stage, output);
        self.touch();
        Ok(())
    }

    /// Apply the validation verdict and append its findings
    pub fn record_validation(
        &mut self,
        valid: bool,
        requires_human_review: bool,
        errors: impl IntoIterator<Item = String>,
        warnings: impl IntoIterator<Item = String>,
    ) {
        self.valid = Some(valid);
        self.requires_human_review = requires_human_review;
        self.errors.extend(errors);
        self.warnings.extend(warnings);
        self.touch();
    }

    /// Move to `next`, rejecting anything the transition table does not allow
    pub fn transition_to(&mut self, next: FlowStatus) -> StateMachineResult<()> {
        check_transition(self.status, next)?;
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn halt(&mut self, stage: Stage, kind: StageFailureKind, message: impl Into<String>) {
        self.halted = Some(StageHalt {
            stage,
            kind,
            message: message.into(),
            at: Utc::now(),
        });
        self.touch();
    }

    pub fn clear_halt(&mut self) {
        if self.halted.take().is_some() {
            self.touch();
        }
    }

    pub fn record_review(&mut self, decision: ReviewDecision, notes: Option<String>) {
        self.review = Some(ReviewRecord {
            decision,
            notes,
            decided_at: Utc::now(),
        });
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_defaults() {
        let state = OrchestrationState::new("inv-1");
        assert_eq!(state.document_id, "inv-1");
        assert_eq!(state.status, FlowStatus::Started);
        assert_eq!(state.valid, None);
        assert!(!state.requires_human_review);
        assert!(state.stage_outputs.is_empty());
        assert!(state.halted.is_none());
    }

    #[test]
    fn test_outputs_are_append_only() {
        let mut state = OrchestrationState::new("inv-1");
        state
            .record_output(Stage::Extraction, StageOutput::Reference("OCR-1".into()))
            .unwrap();

        let err = state
            .record_output(Stage::Extraction, StageOutput::Reference("OCR-2".into()))
            .unwrap_err();
        assert!(matches!(err, StateMachineError::OutputAlreadyRecorded { .. }));
        assert_eq!(state.reference(Stage::Extraction), Some("OCR-1"));
    }

    #[test]
    fn test_transition_guard() {
        let mut state = OrchestrationState::new("inv-1");
        assert!(state.transition_to(FlowStatus::Running(Stage::Mapping)).is_err());
        assert_eq!(state.status, FlowStatus::Started);

        state
            .transition_to(FlowStatus::Running(Stage::Extraction))
            .unwrap();
        assert_eq!(state.status, FlowStatus::Running(Stage::Extraction));
    }

    #[test]
    fn test_validation_findings_accumulate() {
        let mut state = OrchestrationState::new("inv-1");
        state.errors.push("earlier".into());
        state.record_validation(
            false,
            true,
            vec!["total mismatch".to_string()],
            vec!["missing PO".to_string()],
        );
        assert_eq!(state.valid, Some(false));
        assert!(state.requires_human_review);
        assert_eq!(state.errors, vec!["earlier", "total mismatch"]);
        assert_eq!(state.warnings, vec!["missing PO"]);
    }

    #[test]
    fn test_snapshot_format() {
        let mut state = OrchestrationState::new("inv-9");
        state
            .record_output(Stage::Extraction, StageOutput::Reference("OCR-9".into()))
            .unwrap();
        state
            .record_output(
                Stage::Conversion,
                StageOutput::PerTarget(BTreeMap::from([
                    ("tally".to_string(), "CONV-T".to_string()),
                    ("zoho".to_string(), "CONV-Z".to_string()),
                ])),
            )
            .unwrap();

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["stage_outputs"]["extraction"], "OCR-9");
        assert_eq!(json["stage_outputs"]["conversion"]["zoho"], "CONV-Z");
        assert_eq!(json["status"], "STARTED");
        assert!(json["valid"].is_null());
    }

    #[test]
    fn test_snapshot_tolerates_missing_and_unknown_fields() {
        let json = serde_json::json!({
            "document_id": "inv-legacy",
            "status": "PENDING_REVIEW",
            "stage_outputs": { "extraction": "OCR-1", "report": "REP-1" },
            "requires_human_review": true,
            "introduced_later": { "anything": 1 }
        });

        let state: OrchestrationState = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(state.status, FlowStatus::PendingReview);
        assert_eq!(state.reference(Stage::Report), Some("REP-1"));
        assert!(state.errors.is_empty());
        assert!(state.review.is_none());
        assert_eq!(state.created_at, DateTime::<Utc>::UNIX_EPOCH);

        // Reloading the same stored snapshot yields the same state
        let reloaded: OrchestrationState = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(reloaded, state);
    }

    #[test]
    fn test_target_references() {
        let output = StageOutput::PerTarget(BTreeMap::from([(
            "tally".to_string(),
            "INT-1".to_string(),
        )]));
        assert_eq!(output.for_target("tally"), Some("INT-1"));
        assert_eq!(output.for_target("zoho"), None);
        assert_eq!(output.reference(), None);
    }
}
