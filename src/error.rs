//! Error types for the invoice flow engine.
//!

use crate::orchestration::persistence::PersistenceError;
use crate::state_machine::{FlowStatus, Stage, StateMachineError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a stage call did not produce a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageFailureKind {
    /// The stage service could not be reached
    Unavailable,
    /// The stage refused the request payload
    InvalidInput,
    /// The stage did not answer within its configured timeout
    Timeout,
    /// The stage processed the request and declined it
    Rejected,
}

impl StageFailureKind {
    /// Failures that may succeed when the same call is repeated
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout)
    }
}

impl fmt::Display for StageFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Timeout => write!(f, "timeout"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Errors surfaced by the flow engine and the orchestration service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// A stage call failed; the flow halted at that stage's node
    #[error("Stage {stage} failed ({kind}): {message}")]
    StageFailure {
        stage: Stage,
        kind: StageFailureKind,
        message: String,
    },

    #[error("Orchestration not found for document {document_id}")]
    NotFound { document_id: String },

    #[error("Orchestration for document {document_id} is already in progress ({status})")]
    AlreadyRunning {
        document_id: String,
        status: FlowStatus,
    },

    #[error("Orchestration for document {document_id} is in state {status}: {reason}")]
    InvalidState {
        document_id: String,
        status: FlowStatus,
        reason: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FlowError {
    /// Caller mistakes that are never retried (4xx-equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyRunning { .. }
                | Self::InvalidState { .. }
                | Self::InvalidArgument(_)
        )
    }

    /// Failures where repeating the whole operation is safe and may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StageFailure { .. } | Self::Persistence(_))
    }

    /// Stage that caused the failure, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<crate::config::ConfigurationError> for FlowError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        FlowError::Configuration(error.to_string())
    }
}

pub type FlowResult<T> = Result<T, FlowError>;
