use async_trait::async_trait;
use invoice_flow::models::OrchestrationState;
use invoice_flow::orchestration::{
    InMemoryStatePersistence, PersistenceError, PersistenceResult, StatePersistence,
};
use invoice_flow::FlowStatus;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory store that keeps a history of every save and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingPersistence {
    inner: InMemoryStatePersistence,
    history: Mutex<Vec<OrchestrationState>>,
    fail_saves: AtomicBool,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail until [`Self::recover`] is called
    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.fail_saves.store(false, Ordering::SeqCst);
    }

    /// Every successfully saved snapshot, oldest first
    pub fn history(&self) -> Vec<OrchestrationState> {
        self.history.lock().clone()
    }

    /// Statuses saved for one document, oldest first
    pub fn statuses(&self, document_id: &str) -> Vec<FlowStatus> {
        self.history
            .lock()
            .iter()
            .filter(|state| state.document_id == document_id)
            .map(|state| state.status)
            .collect()
    }

    pub fn save_count(&self) -> usize {
        self.history.lock().len()
    }

    /// Store a snapshot directly, bypassing failure injection
    pub async fn seed(&self, state: &OrchestrationState) {
        self.inner
            .save(&state.document_id, state)
            .await
            .expect("seeding the in-memory store");
    }
}

#[async_trait]
impl StatePersistence for RecordingPersistence {
    async fn save(&self, document_id: &str, state: &OrchestrationState) -> PersistenceResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::SaveFailed {
                document_id: document_id.to_string(),
                reason: "disk full".to_string(),
            });
        }
        self.inner.save(document_id, state).await?;
        self.history.lock().push(state.clone());
        Ok(())
    }

    async fn load(&self, document_id: &str) -> PersistenceResult<Option<OrchestrationState>> {
        self.inner.load(document_id).await
    }
}
