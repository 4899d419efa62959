//! # Retrying Stage Client
//!
//! Decorator that repeats transient stage failures (`Unavailable`, `Timeout`)
//! with exponential backoff. The flow engine itself never retries; wrapping the
//! stage client is where a deployment opts into it. Safe only because stage
//! calls are idempotent per `document_id` + stage (+ target).

use super::stage_client::{
    ConversionRequest, ConversionResult, ExtractionRequest, ExtractionResult, IntegrationRequest,
    IntegrationResult, MappingRequest, MappingResult, ReportRequest, ReportResult, StageClient,
    StageResult, ValidationRequest, ValidationResult,
};
use crate::config::RetryConfig;
use crate::state_machine::Stage;
use async_trait::async_trait;
use std::future::Future;
use tracing::warn;

/// Stage client that retries transient failures of the wrapped client
#[derive(Debug, Clone)]
pub struct RetryingStageClient<C> {
    inner: C,
    policy: RetryConfig,
}

impl<C: StageClient> RetryingStageClient<C> {
    pub fn new(inner: C, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, stage: Stage, key: String, mut call: F) -> StageResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = StageResult<T>> + Send,
        T: Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(result) => return Ok(result),
                Err(error) if error.kind.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff_for(attempt);
                    warn!(
                        stage = %stage,
                        idempotency_key = %key,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "🔁 Retrying stage call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[async_trait]
impl<C: StageClient> StageClient for RetryingStageClient<C> {
    async fn extract(&self, request: ExtractionRequest) -> StageResult<ExtractionResult> {
        let key = request.idempotency_key();
        self.with_retry(Stage::Extraction, key, || self.inner.extract(request.clone()))
            .await
    }

    async fn map(&self, request: MappingRequest) -> StageResult<MappingResult> {
        let key = request.idempotency_key();
        self.with_retry(Stage::Mapping, key, || self.inner.map(request.clone()))
            .await
    }

    async fn validate(&self, request: ValidationRequest) -> StageResult<ValidationResult> {
        let key = request.idempotency_key();
        self.with_retry(Stage::Validation, key, || self.inner.validate(request.clone()))
            .await
    }

    async fn report(&self, request: ReportRequest) -> StageResult<ReportResult> {
        let key = request.idempotency_key();
        self.with_retry(Stage::Report, key, || self.inner.report(request.clone()))
            .await
    }

    async fn convert(&self, request: ConversionRequest) -> StageResult<ConversionResult> {
        let key = request.idempotency_key();
        self.with_retry(Stage::Conversion, key, || self.inner.convert(request.clone()))
            .await
    }

    async fn integrate(&self, request: IntegrationRequest) -> StageResult<IntegrationResult> {
        let key = request.idempotency_key();
        self.with_retry(Stage::Integration, key, || self.inner.integrate(request.clone()))
            .await
    }
}
