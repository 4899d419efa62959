//! # State Persistence Contract
//!
//! Snapshots are stored whole, keyed by `document_id`, with last-writer-wins
//! upsert semantics. A load never observes a partially written snapshot.

use crate::models::OrchestrationState;
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Errors raised by persistence backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Failed to save snapshot for {document_id}: {reason}")]
    SaveFailed { document_id: String, reason: String },

    #[error("Failed to load snapshot for {document_id}: {reason}")]
    LoadFailed { document_id: String, reason: String },

    #[error("Persistence backend unavailable: {0}")]
    Connection(String),

    #[error("Snapshot key {key} does not match document {document_id}")]
    KeyMismatch { key: String, document_id: String },

    #[error("Snapshot serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        PersistenceError::Serialization(error.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Trait for loading and saving orchestration snapshots
#[async_trait]
pub trait StatePersistence: Send + Sync {
    /// Upsert the full snapshot for `document_id`
    async fn save(&self, document_id: &str, state: &OrchestrationState) -> PersistenceResult<()>;

    /// Load the snapshot for `document_id`, `None` when absent
    async fn load(&self, document_id: &str) -> PersistenceResult<Option<OrchestrationState>>;
}

/// Reject saves whose key and snapshot disagree
pub(crate) fn ensure_key_matches(
    document_id: &str,
    state: &OrchestrationState,
) -> PersistenceResult<()> {
    if state.document_id == document_id {
        Ok(())
    } else {
        Err(PersistenceError::KeyMismatch {
            key: document_id.to_string(),
            document_id: state.document_id.clone(),
        })
    }
}

/// Process-local persistence holding serialized snapshots
///
/// Snapshots are stored in their serialized form so every load goes through the
/// same decoding path as a durable backend. Each entry is replaced atomically.
#[derive(Debug, Default)]
pub struct InMemoryStatePersistence {
    snapshots: DashMap<String, String>,
}

impl InMemoryStatePersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl StatePersistence for InMemoryStatePersistence {
    async fn save(&self, document_id: &str, state: &OrchestrationState) -> PersistenceResult<()> {
        ensure_key_matches(document_id, state)?;
        let encoded = serde_json::to_string(state)?;
        self.snapshots.insert(document_id.to_string(), encoded);
        Ok(())
    }

    async fn load(&self, document_id: &str) -> PersistenceResult<Option<OrchestrationState>> {
        let encoded = match self.snapshots.get(document_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        let state = serde_json::from_str(&encoded).map_err(|e| PersistenceError::LoadFailed {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(state))
    }
}
