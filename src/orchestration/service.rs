//! # Orchestration Service
//!
//! Entry points callers use: `start`, `resume`, `retry` and `get`. The service
//! owns one [`FlowEngine`] and wires it from configuration: the persistence
//! backend, and the retry decorator around the stage client when
//! `stages.retry.max_attempts > 1`.

use super::flow_engine::FlowEngine;
use super::persistence::{InMemoryStatePersistence, StatePersistence};
use super::retry::RetryingStageClient;
use super::stage_client::StageClient;
use crate::config::{ConfigManager, FlowConfig, PersistenceBackend, PersistenceConfig};
use crate::error::FlowResult;
use crate::events::FlowEvent;
use crate::models::OrchestrationState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

#[cfg(feature = "postgres")]
use super::pg_persistence::PgStatePersistence;

/// Public façade over the flow engine
#[derive(Clone)]
pub struct OrchestrationService {
    engine: Arc<FlowEngine>,
}

impl OrchestrationService {
    pub fn new(engine: Arc<FlowEngine>) -> Self {
        Self { engine }
    }

    /// Build a service from already constructed collaborators
    pub fn from_parts(
        config: Arc<FlowConfig>,
        stages: Arc<dyn StageClient>,
        persistence: Arc<dyn StatePersistence>,
    ) -> Self {
        let stages: Arc<dyn StageClient> = if config.stages.retry.is_enabled() {
            Arc::new(RetryingStageClient::new(stages, config.stages.retry.clone()))
        } else {
            stages
        };
        Self::new(Arc::new(FlowEngine::new(stages, persistence, config)))
    }

    /// Validate configuration, connect the configured persistence backend and
    /// build the service around `stages`
    pub async fn bootstrap(
        manager: &ConfigManager,
        stages: Arc<dyn StageClient>,
    ) -> FlowResult<Self> {
        let config = manager.config().clone();
        config.validate()?;

        let persistence = connect_persistence(&config.persistence).await?;
        info!(
            environment = %manager.environment(),
            backend = ?config.persistence.backend,
            targets = ?config.flow.conversion_targets,
            retry_attempts = config.stages.retry.max_attempts,
            "🚀 Orchestration service ready"
        );

        Ok(Self::from_parts(Arc::new(config), stages, persistence))
    }

    pub async fn start(&self, document_id: &str) -> FlowResult<OrchestrationState> {
        self.engine.start(document_id).await
    }

    pub async fn resume(
        &self,
        document_id: &str,
        decision: &str,
        notes: Option<String>,
    ) -> FlowResult<OrchestrationState> {
        self.engine.resume(document_id, decision, notes).await
    }

    pub async fn retry(&self, document_id: &str) -> FlowResult<OrchestrationState> {
        self.engine.retry(document_id).await
    }

    pub async fn get(&self, document_id: &str) -> FlowResult<OrchestrationState> {
        self.engine.get(document_id).await
    }

    /// Receive lifecycle events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.engine.events().subscribe()
    }

    pub fn engine(&self) -> &Arc<FlowEngine> {
        &self.engine
    }
}

/// Open the persistence backend selected in configuration
pub async fn connect_persistence(
    config: &PersistenceConfig,
) -> FlowResult<Arc<dyn StatePersistence>> {
    match config.backend {
        PersistenceBackend::Memory => Ok(Arc::new(InMemoryStatePersistence::new())),
        #[cfg(feature = "postgres")]
        PersistenceBackend::Postgres => Ok(Arc::new(PgStatePersistence::connect(config).await?)),
        #[cfg(not(feature = "postgres"))]
        PersistenceBackend::Postgres => Err(crate::error::FlowError::Configuration(
            "the postgres backend requires the `postgres` feature".to_string(),
        )),
    }
}
