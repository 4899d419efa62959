//! # Orchestration
//!
//! Durable execution of the invoice pipeline.
//!
//! ## Core Components
//!
//! - **FlowEngine**: Walks the transition table node by node, persisting after each one
//! - **OrchestrationService**: `start` / `resume` / `retry` / `get` entry points
//! - **StageClient**: Contract for the external stage services
//! - **StatePersistence**: Snapshot store keyed by `document_id` (in-memory or PostgreSQL)
//! - **DocumentLocks**: Per-document serialization of engine operations
//! - **RetryingStageClient**: Opt-in backoff retry of transient stage failures

pub mod document_lock;
pub mod flow_engine;
pub mod persistence;
#[cfg(feature = "postgres")]
pub mod pg_persistence;
pub mod retry;
pub mod service;
pub mod stage_client;
pub mod stub_stages;

pub use document_lock::{DocumentLockGuard, DocumentLocks};
pub use flow_engine::FlowEngine;
pub use persistence::{
    InMemoryStatePersistence, PersistenceError, PersistenceResult, StatePersistence,
};
#[cfg(feature = "postgres")]
pub use pg_persistence::PgStatePersistence;
pub use retry::RetryingStageClient;
pub use service::{connect_persistence, OrchestrationService};
pub use stage_client::{
    ConversionRequest, ConversionResult, ExtractionRequest, ExtractionResult, IntegrationRequest,
    IntegrationResult, MappingRequest, MappingResult, ReportRequest, ReportResult, StageClient,
    StageError, StageResult, ValidationRequest, ValidationResult,
};
pub use stub_stages::{StubStageClient, StubValidation};
