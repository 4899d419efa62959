//! # Flow Engine
//!
//! Drives one document at a time through the transition table in
//! `state_machine::transitions`, persisting the full snapshot after every node.
//!
//! ## Execution Model
//!
//! The engine holds no flow state of its own: each operation loads the
//! snapshot, advances it node by node and saves it back. Operations on the same
//! `document_id` are serialized by [`DocumentLocks`]; different documents never
//! contend.
//!
//! ```text
//! start ──► extraction ──► mapping ──► validation ──► report ──► branch
//!                                                              │  │  │
//!                              PENDING_REVIEW ◄── review ──────┘  │  └──► REJECTED
//!                                    │ approve                    │ valid
//!                                    └──────────────► conversion ◄┘
//!                                                         │
//!                                                    integration ──► COMPLETED
//! ```
//!
//! ## Failure Semantics
//!
//! A failing stage call does not advance the flow: the snapshot keeps its
//! running status, gains a halt record and is persisted before the failure is
//! returned. Nothing is retried here. A failed save aborts the operation and
//! leaves the previously persisted snapshot authoritative.
//!
//! Every operation is cancel-safe: dropping its future mid stage call leaves
//! the last saved snapshot untouched.

use super::document_lock::DocumentLocks;
use super::persistence::StatePersistence;
use super::stage_client::{
    ConversionRequest, ExtractionRequest, IntegrationRequest, MappingRequest, ReportRequest,
    StageClient, StageError, StageResult, ValidationRequest, ValidationResult,
};
use crate::config::FlowConfig;
use crate::constants::events;
use crate::error::{FlowError, FlowResult};
use crate::events::FlowEventPublisher;
use crate::logging::{log_error, log_flow_operation, log_stage_operation};
use crate::models::{OrchestrationState, StageOutput};
use crate::state_machine::transitions::{after_review, next_after};
use crate::state_machine::{FlowStatus, ReviewDecision, Stage, StateMachineError};
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What a node produced, before it is applied to the snapshot
#[derive(Debug)]
enum NodeOutcome {
    Reference(String),
    Validation(ValidationResult),
    PerTarget(BTreeMap<String, String>),
}

/// Pipeline state machine driver
pub struct FlowEngine {
    stages: Arc<dyn StageClient>,
    persistence: Arc<dyn StatePersistence>,
    config: Arc<FlowConfig>,
    locks: DocumentLocks,
    events: FlowEventPublisher,
}

impl FlowEngine {
    pub fn new(
        stages: Arc<dyn StageClient>,
        persistence: Arc<dyn StatePersistence>,
        config: Arc<FlowConfig>,
    ) -> Self {
        let events = FlowEventPublisher::new(config.events.channel_capacity);
        Self {
            stages,
            persistence,
            config,
            locks: DocumentLocks::new(),
            events,
        }
    }

    pub fn events(&self) -> &FlowEventPublisher {
        &self.events
    }

    /// Start the flow for a document and run it to the first terminal or
    /// suspend point
    ///
    /// A document whose flow already ended returns its stored snapshot
    /// unchanged; one whose flow is unresolved fails with `AlreadyRunning`.
    #[instrument(skip(self))]
    pub async fn start(&self, document_id: &str) -> FlowResult<OrchestrationState> {
        if document_id.trim().is_empty() {
            return Err(FlowError::InvalidArgument(
                "document_id must not be empty".to_string(),
            ));
        }

        let _guard = self.locks.acquire(document_id).await;

        if let Some(existing) = self.load(document_id).await? {
            if existing.status.is_terminal() {
                info!(
                    status = %existing.status,
                    "Flow already finished, returning stored snapshot"
                );
                return Ok(existing);
            }
            return Err(FlowError::AlreadyRunning {
                document_id: document_id.to_string(),
                status: existing.status,
            });
        }

        let mut state = OrchestrationState::new(document_id);
        self.persist(&state).await?;
        log_flow_operation("start", document_id, &state.status.to_string(), None);
        self.publish(events::FLOW_STARTED, &state, json!({}));

        self.drive(&mut state).await?;
        Ok(state)
    }

    /// Apply a human review decision to a flow suspended in `PENDING_REVIEW`
    ///
    /// `approve` re-enters the table at conversion; `reject` ends the flow.
    /// Any other decision fails with `InvalidArgument` and changes nothing.
    #[instrument(skip(self, notes))]
    pub async fn resume(
        &self,
        document_id: &str,
        decision: &str,
        notes: Option<String>,
    ) -> FlowResult<OrchestrationState> {
        let _guard = self.locks.acquire(document_id).await;

        let mut state = self.require(document_id).await?;
        if !state.status.is_suspended() {
            return Err(FlowError::InvalidState {
                document_id: document_id.to_string(),
                status: state.status,
                reason: "orchestration is not pending human review".to_string(),
            });
        }

        let decision: ReviewDecision = decision.parse().map_err(FlowError::InvalidArgument)?;

        state.record_review(decision, notes);
        if decision == ReviewDecision::Approve {
            state.requires_human_review = false;
            state.valid = Some(true);
        }
        state.transition_to(after_review(decision))?;
        self.persist(&state).await?;

        log_flow_operation(
            "resume",
            document_id,
            &state.status.to_string(),
            Some(decision.as_str()),
        );
        self.publish(
            events::FLOW_REVIEW_RESOLVED,
            &state,
            json!({ "decision": decision.as_str() }),
        );

        match decision {
            ReviewDecision::Approve => self.drive(&mut state).await?,
            ReviewDecision::Reject => self.publish(events::FLOW_REJECTED, &state, json!({})),
        }
        Ok(state)
    }

    /// Re-enter the flow at its persisted node
    ///
    /// Covers a node that failed (the snapshot carries a halt record) as well as
    /// one that was interrupted by a crash or a dropped future. Suspended and
    /// terminal flows are refused.
    #[instrument(skip(self))]
    pub async fn retry(&self, document_id: &str) -> FlowResult<OrchestrationState> {
        let _guard = self.locks.acquire(document_id).await;

        let mut state = self.require(document_id).await?;
        if !state.status.is_active() {
            return Err(FlowError::InvalidState {
                document_id: document_id.to_string(),
                status: state.status,
                reason: "orchestration has no stage to re-run".to_string(),
            });
        }

        let halted_at = state.halted.as_ref().map(|halt| halt.stage.to_string());
        log_flow_operation(
            "retry",
            document_id,
            &state.status.to_string(),
            halted_at.as_deref(),
        );

        self.drive(&mut state).await?;
        Ok(state)
    }

    /// Current persisted snapshot for a document
    pub async fn get(&self, document_id: &str) -> FlowResult<OrchestrationState> {
        self.require(document_id).await
    }

    /// Execute nodes until the flow reaches a terminal or suspend state
    async fn drive(&self, state: &mut OrchestrationState) -> FlowResult<()> {
        if state.status == FlowStatus::Started {
            state.transition_to(FlowStatus::Running(Stage::Extraction))?;
            self.persist(state).await?;
        }

        while let Some(stage) = state.status.running_stage() {
            self.execute_node(stage, state).await?;
        }

        match state.status {
            FlowStatus::PendingReview => self.publish(events::FLOW_SUSPENDED, state, json!({})),
            FlowStatus::Rejected => self.publish(events::FLOW_REJECTED, state, json!({})),
            FlowStatus::Completed => self.publish(events::FLOW_COMPLETED, state, json!({})),
            status => {
                return Err(StateMachineError::NothingToExecute {
                    status: status.to_string(),
                }
                .into())
            }
        }

        log_flow_operation(
            "drive",
            &state.document_id,
            &state.status.to_string(),
            None,
        );
        Ok(())
    }

    /// Run one stage node, record its outcome and persist
    async fn execute_node(&self, stage: Stage, state: &mut OrchestrationState) -> FlowResult<()> {
        match self.invoke(stage, state).await {
            Ok(outcome) => {
                self.apply(stage, outcome, state)?;
                self.persist(state).await?;
                self.publish(
                    events::FLOW_STAGE_COMPLETED,
                    state,
                    json!({ "stage": stage.as_str() }),
                );
                Ok(())
            }
            Err(FlowError::StageFailure {
                stage,
                kind,
                message,
            }) => {
                warn!(
                    document_id = %state.document_id,
                    stage = %stage,
                    kind = %kind,
                    error = %message,
                    "⏸️ Stage failed, flow halted at current node"
                );
                state.halt(stage, kind, message.clone());
                self.persist(state).await?;
                self.publish(
                    events::FLOW_STAGE_FAILED,
                    state,
                    json!({ "stage": stage.as_str(), "kind": kind, "message": message }),
                );
                Err(FlowError::StageFailure {
                    stage,
                    kind,
                    message,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Record a node's outcome and move to the next node
    fn apply(
        &self,
        stage: Stage,
        outcome: NodeOutcome,
        state: &mut OrchestrationState,
    ) -> FlowResult<()> {
        match outcome {
            NodeOutcome::Reference(reference) => {
                state.record_output(stage, StageOutput::Reference(reference))?;
            }
            NodeOutcome::PerTarget(references) => {
                state.record_output(stage, StageOutput::PerTarget(references))?;
            }
            NodeOutcome::Validation(result) => {
                state.record_output(stage, StageOutput::Reference(result.validation_id))?;
                state.record_validation(
                    result.valid,
                    result.requires_human_review,
                    result.errors,
                    result.warnings,
                );
            }
        }

        state.clear_halt();
        let next = next_after(stage, state.requires_human_review, state.valid);
        state.transition_to(next)?;
        debug!(
            document_id = %state.document_id,
            stage = %stage,
            next = %next,
            "Node completed"
        );
        Ok(())
    }

    /// Build the stage request from recorded outputs and call the stage
    async fn invoke(&self, stage: Stage, state: &OrchestrationState) -> FlowResult<NodeOutcome> {
        let document_id = state.document_id.clone();

        match stage {
            Stage::Extraction => {
                let request = ExtractionRequest {
                    document_id: document_id.clone(),
                };
                let result = self
                    .call_stage(stage, None, &document_id, self.stages.extract(request))
                    .await?;
                Ok(NodeOutcome::Reference(result.ocr_id))
            }
            Stage::Mapping => {
                let request = MappingRequest {
                    document_id: document_id.clone(),
                    ocr_id: required_reference(state, Stage::Extraction)?,
                };
                let result = self
                    .call_stage(stage, None, &document_id, self.stages.map(request))
                    .await?;
                Ok(NodeOutcome::Reference(result.schema_id))
            }
            Stage::Validation => {
                let request = ValidationRequest {
                    document_id: document_id.clone(),
                    schema_id: required_reference(state, Stage::Mapping)?,
                    ruleset: self.config.flow.validation_ruleset.clone(),
                };
                let result = self
                    .call_stage(stage, None, &document_id, self.stages.validate(request))
                    .await?;
                Ok(NodeOutcome::Validation(result))
            }
            Stage::Report => {
                let request = ReportRequest {
                    document_id: document_id.clone(),
                    validation_id: required_reference(state, Stage::Validation)?,
                    schema_id: required_reference(state, Stage::Mapping)?,
                    user_id: self.config.flow.report_user_id.clone(),
                };
                let result = self
                    .call_stage(stage, None, &document_id, self.stages.report(request))
                    .await?;
                Ok(NodeOutcome::Reference(result.report_id))
            }
            Stage::Conversion => {
                let validation_id = required_reference(state, Stage::Validation)?;
                let mut references = BTreeMap::new();
                for target in &self.config.flow.conversion_targets {
                    let request = ConversionRequest {
                        document_id: document_id.clone(),
                        validation_id: validation_id.clone(),
                        target: target.clone(),
                        dry_run: self.config.flow.dry_run,
                    };
                    let result = self
                        .call_stage(
                            stage,
                            Some(target.as_str()),
                            &document_id,
                            self.stages.convert(request),
                        )
                        .await?;
                    references.insert(target.clone(), result.conversion_id);
                }
                Ok(NodeOutcome::PerTarget(references))
            }
            Stage::Integration => {
                let mut references = BTreeMap::new();
                for target in &self.config.flow.conversion_targets {
                    let conversion_id = state
                        .target_reference(Stage::Conversion, target)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            missing_output(state, Stage::Conversion, Some(target.as_str()))
                        })?;
                    let request = IntegrationRequest {
                        document_id: document_id.clone(),
                        conversion_id,
                        target: target.clone(),
                        credentials_id: self
                            .config
                            .integration
                            .credentials_for(target)
                            .map(str::to_string),
                    };
                    let result = self
                        .call_stage(
                            stage,
                            Some(target.as_str()),
                            &document_id,
                            self.stages.integrate(request),
                        )
                        .await?;
                    references.insert(target.clone(), result.integration_id);
                }
                Ok(NodeOutcome::PerTarget(references))
            }
        }
    }

    /// Await a stage call under its configured timeout
    async fn call_stage<T, F>(
        &self,
        stage: Stage,
        target: Option<&str>,
        document_id: &str,
        call: F,
    ) -> FlowResult<T>
    where
        F: Future<Output = StageResult<T>>,
    {
        let limit = self.config.stages.timeout_for(stage);
        let started = Instant::now();

        let result = match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(StageError::timeout(format!(
                "no response within {}ms",
                limit.as_millis()
            ))),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => log_stage_operation(
                document_id,
                stage.as_str(),
                target,
                "success",
                duration_ms,
                None,
            ),
            Err(error) => log_stage_operation(
                document_id,
                stage.as_str(),
                target,
                "failure",
                duration_ms,
                Some(&error.to_string()),
            ),
        }

        result.map_err(|error| FlowError::StageFailure {
            stage,
            kind: error.kind,
            message: error.message,
        })
    }

    async fn load(&self, document_id: &str) -> FlowResult<Option<OrchestrationState>> {
        Ok(self.persistence.load(document_id).await?)
    }

    async fn require(&self, document_id: &str) -> FlowResult<OrchestrationState> {
        self.load(document_id)
            .await?
            .ok_or_else(|| FlowError::NotFound {
                document_id: document_id.to_string(),
            })
    }

    async fn persist(&self, state: &OrchestrationState) -> FlowResult<()> {
        self.persistence
            .save(&state.document_id, state)
            .await
            .map_err(|error| {
                log_error(
                    "flow_engine",
                    "persist",
                    &error.to_string(),
                    Some(&format!(
                        "document_id={} status={}",
                        state.document_id, state.status
                    )),
                );
                FlowError::from(error)
            })
    }

    fn publish(
        &self,
        event_name: &str,
        state: &OrchestrationState,
        mut context: serde_json::Value,
    ) {
        if let Some(fields) = context.as_object_mut() {
            fields.insert("status".to_string(), json!(state.status.to_string()));
        }
        let delivered = self
            .events
            .publish(event_name, state.document_id.clone(), context);
        debug!(event = %event_name, subscribers = delivered, "Event published");
    }
}

fn required_reference(state: &OrchestrationState, stage: Stage) -> FlowResult<String> {
    state
        .reference(stage)
        .map(str::to_string)
        .ok_or_else(|| missing_output(state, stage, None))
}

fn missing_output(state: &OrchestrationState, stage: Stage, target: Option<&str>) -> FlowError {
    let what = match target {
        Some(target) => format!("{stage} output for target {target}"),
        None => format!("{stage} output"),
    };
    FlowError::InvalidState {
        document_id: state.document_id.clone(),
        status: state.status,
        reason: format!("snapshot is missing the {what}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::persistence::InMemoryStatePersistence;
    use crate::orchestration::stub_stages::{StubStageClient, StubValidation};

    fn engine_with(validation: StubValidation) -> (FlowEngine, Arc<InMemoryStatePersistence>) {
        let persistence = Arc::new(InMemoryStatePersistence::new());
        let engine = FlowEngine::new(
            Arc::new(StubStageClient::with_validation(validation)),
            persistence.clone(),
            Arc::new(FlowConfig::default()),
        );
        (engine, persistence)
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let (engine, persistence) = engine_with(StubValidation::default());

        let state = engine.start("inv-1").await.unwrap();
        assert_eq!(state.status, FlowStatus::Completed);
        assert_eq!(state.completed_stages(), Stage::ALL.to_vec());
        assert_eq!(persistence.load("inv-1").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_review_suspends_before_conversion() {
        let (engine, _) = engine_with(StubValidation {
            requires_human_review: true,
            ..StubValidation::default()
        });

        let state = engine.start("inv-2").await.unwrap();
        assert_eq!(state.status, FlowStatus::PendingReview);
        assert!(!state.has_completed(Stage::Conversion));
    }

    #[tokio::test]
    async fn test_missing_prior_output_is_invalid_state() {
        let (engine, persistence) = engine_with(StubValidation::default());
        let mut state = OrchestrationState::new("inv-3");
        state
            .transition_to(FlowStatus::Running(Stage::Extraction))
            .unwrap();
        state.status = FlowStatus::Running(Stage::Mapping);
        state.halt(
            Stage::Mapping,
            crate::error::StageFailureKind::Unavailable,
            "down",
        );
        persistence.save("inv-3", &state).await.unwrap();

        let err = engine.retry("inv-3").await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidState { .. }));
        assert_eq!(persistence.load("inv-3").await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_empty_document_id_is_rejected() {
        let (engine, persistence) = engine_with(StubValidation::default());
        let err = engine.start("  ").await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidArgument(_)));
        assert!(persistence.is_empty());
    }
}
