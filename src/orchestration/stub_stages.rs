//! # Stub Stages
//!
//! In-process stand-in for the extraction, mapping, validation, report,
//! conversion and integration services. Each call is deduplicated on its
//! idempotency key: repeating a call returns the identifier minted the first
//! time instead of producing a second side effect.

use super::stage_client::{
    ConversionRequest, ConversionResult, ExtractionRequest, ExtractionResult, IntegrationRequest,
    IntegrationResult, MappingRequest, MappingResult, ReportRequest, ReportResult, StageClient,
    StageError, StageResult, ValidationRequest, ValidationResult,
};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Verdict the stub validation stage returns for every document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubValidation {
    pub valid: bool,
    pub requires_human_review: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for StubValidation {
    fn default() -> Self {
        Self {
            valid: true,
            requires_human_review: false,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Deterministic, idempotent stage client
#[derive(Debug, Default)]
pub struct StubStageClient {
    validation: StubValidation,
    minted: DashMap<String, String>,
}

impl StubStageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validation(validation: StubValidation) -> Self {
        Self {
            validation,
            minted: DashMap::new(),
        }
    }

    /// Number of distinct side effects performed so far
    pub fn executions(&self) -> usize {
        self.minted.len()
    }

    fn mint(&self, key: String, prefix: &str) -> String {
        self.minted
            .entry(key.clone())
            .or_insert_with(|| {
                let id = format!("{prefix}-{}", Uuid::new_v4().simple());
                debug!(idempotency_key = %key, id = %id, "🧪 Stub stage executed");
                id
            })
            .clone()
    }
}

fn require(value: &str, field: &str) -> StageResult<()> {
    if value.trim().is_empty() {
        Err(StageError::invalid_input(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

#[async_trait]
impl StageClient for StubStageClient {
    async fn extract(&self, request: ExtractionRequest) -> StageResult<ExtractionResult> {
        require(&request.document_id, "document_id")?;
        Ok(ExtractionResult {
            ocr_id: self.mint(request.idempotency_key(), "OCR"),
        })
    }

    async fn map(&self, request: MappingRequest) -> StageResult<MappingResult> {
        require(&request.ocr_id, "ocr_id")?;
        Ok(MappingResult {
            schema_id: self.mint(request.idempotency_key(), "SCHEMA"),
        })
    }

    async fn validate(&self, request: ValidationRequest) -> StageResult<ValidationResult> {
        require(&request.schema_id, "schema_id")?;
        Ok(ValidationResult {
            validation_id: self.mint(request.idempotency_key(), "VALIDATION"),
            valid: self.validation.valid,
            requires_human_review: self.validation.requires_human_review,
            errors: self.validation.errors.clone(),
            warnings: self.validation.warnings.clone(),
        })
    }

    async fn report(&self, request: ReportRequest) -> StageResult<ReportResult> {
        require(&request.validation_id, "validation_id")?;
        let report_id = self.mint(request.idempotency_key(), "REPORT");
        Ok(ReportResult {
            report_url: Some(format!("memory://reports/{report_id}.pdf")),
            report_id,
        })
    }

    async fn convert(&self, request: ConversionRequest) -> StageResult<ConversionResult> {
        require(&request.validation_id, "validation_id")?;
        require(&request.target, "target")?;
        let conversion_id = self.mint(request.idempotency_key(), "CONVERSION");
        let artifact_url = (!request.dry_run)
            .then(|| format!("memory://artifacts/{}/{conversion_id}", request.target));
        Ok(ConversionResult {
            conversion_id,
            artifact_url,
        })
    }

    async fn integrate(&self, request: IntegrationRequest) -> StageResult<IntegrationResult> {
        require(&request.conversion_id, "conversion_id")?;
        Ok(IntegrationResult {
            integration_id: self.mint(request.idempotency_key(), "INTEGRATION"),
        })
    }
}
