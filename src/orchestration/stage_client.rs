//! # Stage Client Contract
//!
//! The narrow interface the flow engine uses to reach the external services
//! performing each stage. Transport is up to the implementation (RPC,
//! in-process, message queue); the engine only sees typed requests, typed
//! results and a `StageError`.
//!
//! Stage calls may be executed more than once for the same node (a crash after
//! the call but before the snapshot is saved, or a supervisor retry). Every
//! request therefore exposes an `idempotency_key()` built from the document
//! identifier, the stage and, for per-target stages, the target. Implementations
//! should deduplicate on it.

use crate::error::StageFailureKind;
use crate::state_machine::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Failure returned by a stage implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StageError {
    pub kind: StageFailureKind,
    pub message: String,
}

impl StageError {
    pub fn new(kind: StageFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StageFailureKind::Unavailable, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StageFailureKind::InvalidInput, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StageFailureKind::Timeout, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(StageFailureKind::Rejected, message)
    }
}

pub type StageResult<T> = Result<T, StageError>;

fn idempotency_key(document_id: &str, stage: Stage, target: Option<&str>) -> String {
    match target {
        Some(target) => format!("{document_id}:{stage}:{target}"),
        None => format!("{document_id}:{stage}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub ocr_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRequest {
    pub document_id: String,
    pub ocr_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingResult {
    pub schema_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub document_id: String,
    pub schema_id: String,
    pub ruleset: String,
}

/// Validation verdict; drives the branch after the report stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validation_id: String,
    pub valid: bool,
    pub requires_human_review: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub document_id: String,
    pub validation_id: String,
    pub schema_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResult {
    pub report_id: String,
    #[serde(default)]
    pub report_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub document_id: String,
    pub validation_id: String,
    pub target: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub conversion_id: String,
    #[serde(default)]
    pub artifact_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRequest {
    pub document_id: String,
    pub conversion_id: String,
    pub target: String,
    #[serde(default)]
    pub credentials_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationResult {
    pub integration_id: String,
}

impl ExtractionRequest {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.document_id, Stage::Extraction, None)
    }
}

impl MappingRequest {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.document_id, Stage::Mapping, None)
    }
}

impl ValidationRequest {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.document_id, Stage::Validation, None)
    }
}

impl ReportRequest {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.document_id, Stage::Report, None)
    }
}

impl ConversionRequest {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.document_id, Stage::Conversion, Some(&self.target))
    }
}

impl IntegrationRequest {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.document_id, Stage::Integration, Some(&self.target))
    }
}

/// Capability to invoke each processing stage
///
/// One operation per stage. The engine treats every `StageError` the same way
/// (halt without advancing); the kind is only logged and surfaced.
#[async_trait]
pub trait StageClient: Send + Sync {
    async fn extract(&self, request: ExtractionRequest) -> StageResult<ExtractionResult>;

    async fn map(&self, request: MappingRequest) -> StageResult<MappingResult>;

    async fn validate(&self, request: ValidationRequest) -> StageResult<ValidationResult>;

    async fn report(&self, request: ReportRequest) -> StageResult<ReportResult>;

    async fn convert(&self, request: ConversionRequest) -> StageResult<ConversionResult>;

    async fn integrate(&self, request: IntegrationRequest) -> StageResult<IntegrationResult>;
}

#[async_trait]
impl<T: StageClient + ?Sized> StageClient for Arc<T> {
    async fn extract(&self, request: ExtractionRequest) -> StageResult<ExtractionResult> {
        (**self).extract(request).await
    }

    async fn map(&self, request: MappingRequest) -> StageResult<MappingResult> {
        (**self).map(request).await
    }

    async fn validate(&self, request: ValidationRequest) -> StageResult<ValidationResult> {
        (**self).validate(request).await
    }

    async fn report(&self, request: ReportRequest) -> StageResult<ReportResult> {
        (**self).report(request).await
    }

    async fn convert(&self, request: ConversionRequest) -> StageResult<ConversionResult> {
        (**self).convert(request).await
    }

    async fn integrate(&self, request: IntegrationRequest) -> StageResult<IntegrationResult> {
        (**self).integrate(request).await
    }
}
