use async_trait::async_trait;
use invoice_flow::orchestration::{
    ConversionRequest, ConversionResult, ExtractionRequest, ExtractionResult, IntegrationRequest,
    IntegrationResult, MappingRequest, MappingResult, ReportRequest, ReportResult, StageClient,
    StageError, StageResult, StubStageClient, StubValidation, ValidationRequest, ValidationResult,
};
use invoice_flow::Stage;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Stage client whose failures and latencies are scripted per stage
///
/// Successful calls delegate to [`StubStageClient`], so repeated calls with the
/// same idempotency key return the same identifier without a new side effect.
#[derive(Debug, Default)]
pub struct ScriptedStageClient {
    stub: StubStageClient,
    failures: Mutex<HashMap<Stage, VecDeque<StageError>>>,
    target_failures: Mutex<HashMap<(Stage, String), VecDeque<StageError>>>,
    delays: Mutex<HashMap<Stage, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedStageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validation(validation: StubValidation) -> Self {
        Self {
            stub: StubStageClient::with_validation(validation),
            ..Self::default()
        }
    }

    /// Valid, no review: the straight-through path
    pub fn valid() -> Self {
        Self::new()
    }

    pub fn needs_review() -> Self {
        Self::with_validation(StubValidation {
            requires_human_review: true,
            warnings: vec!["vendor GSTIN missing".to_string()],
            ..StubValidation::default()
        })
    }

    pub fn invalid() -> Self {
        Self::with_validation(StubValidation {
            valid: false,
            errors: vec!["line totals do not match invoice total".to_string()],
            ..StubValidation::default()
        })
    }

    /// Fail the next call to `stage` with `error`
    pub fn fail_next(self, stage: Stage, error: StageError) -> Self {
        self.failures
            .lock()
            .entry(stage)
            .or_default()
            .push_back(error);
        self
    }

    /// Fail the next call to `stage` for one target
    pub fn fail_next_for_target(self, stage: Stage, target: &str, error: StageError) -> Self {
        self.target_failures
            .lock()
            .entry((stage, target.to_string()))
            .or_default()
            .push_back(error);
        self
    }

    /// Delay every call to `stage`
    pub fn delay(self, stage: Stage, delay: Duration) -> Self {
        self.set_delay(stage, delay);
        self
    }

    pub fn set_delay(&self, stage: Stage, delay: Duration) {
        self.delays.lock().insert(stage, delay);
    }

    pub fn clear_delay(&self, stage: Stage) {
        self.delays.lock().remove(&stage);
    }

    /// Idempotency keys of every call received, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == key).count()
    }

    /// Distinct side effects performed by successful calls
    pub fn executions(&self) -> usize {
        self.stub.executions()
    }

    async fn before(&self, stage: Stage, target: Option<&str>, key: String) -> StageResult<()> {
        self.calls.lock().push(key);

        let delay = self.delays.lock().get(&stage).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(target) = target {
            let scripted = self
                .target_failures
                .lock()
                .get_mut(&(stage, target.to_string()))
                .and_then(VecDeque::pop_front);
            if let Some(error) = scripted {
                return Err(error);
            }
        }

        let scripted = self
            .failures
            .lock()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StageClient for ScriptedStageClient {
    async fn extract(&self, request: ExtractionRequest) -> StageResult<ExtractionResult> {
        self.before(Stage::Extraction, None, request.idempotency_key())
            .await?;
        self.stub.extract(request).await
    }

    async fn map(&self, request: MappingRequest) -> StageResult<MappingResult> {
        self.before(Stage::Mapping, None, request.idempotency_key())
            .await?;
        self.stub.map(request).await
    }

    async fn validate(&self, request: ValidationRequest) -> StageResult<ValidationResult> {
        self.before(Stage::Validation, None, request.idempotency_key())
            .await?;
        self.stub.validate(request).await
    }

    async fn report(&self, request: ReportRequest) -> StageResult<ReportResult> {
        self.before(Stage::Report, None, request.idempotency_key())
            .await?;
        self.stub.report(request).await
    }

    async fn convert(&self, request: ConversionRequest) -> StageResult<ConversionResult> {
        self.before(
            Stage::Conversion,
            Some(&request.target),
            request.idempotency_key(),
        )
        .await?;
        self.stub.convert(request).await
    }

    async fn integrate(&self, request: IntegrationRequest) -> StageResult<IntegrationResult> {
        self.before(
            Stage::Integration,
            Some(&request.target),
            request.idempotency_key(),
        )
        .await?;
        self.stub.integrate(request).await
    }
}
