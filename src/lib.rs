#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Invoice Flow Core
//!
//! Durable, resumable orchestration of the invoice processing pipeline.
//!
//! ## Overview
//!
//! Every document moves through extraction, mapping, validation and report
//! generation, then branches: straight to conversion and integration when valid,
//! into a human review pause when flagged, or to rejection. The complete
//! [`models::OrchestrationState`] snapshot is persisted after every node, so a
//! process restart or a failed stage never loses completed work.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Stages, statuses and the transition table
//! - [`models`] - The persisted orchestration snapshot
//! - [`orchestration`] - Flow engine, service façade, stage contract, persistence
//! - [`events`] - Lifecycle event broadcasting
//! - [`config`] - Layered YAML + environment configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured tracing setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_flow::config::FlowConfig;
//! use invoice_flow::orchestration::{
//!     InMemoryStatePersistence, OrchestrationService, StubStageClient,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> invoice_flow::FlowResult<()> {
//! let service = OrchestrationService::from_parts(
//!     Arc::new(FlowConfig::default()),
//!     Arc::new(StubStageClient::new()),
//!     Arc::new(InMemoryStatePersistence::new()),
//! );
//!
//! let state = service.start("inv-2024-0042").await?;
//! println!("{} is {}", state.document_id, state.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use config::{ConfigManager, FlowConfig};
pub use error::{FlowError, FlowResult, StageFailureKind};
pub use events::{FlowEvent, FlowEventPublisher};
pub use models::{OrchestrationState, StageOutput};
pub use orchestration::{FlowEngine, OrchestrationService, StageClient, StatePersistence};
pub use state_machine::{FlowStatus, ReviewDecision, Stage};
