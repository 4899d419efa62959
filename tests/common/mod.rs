#![allow(dead_code)]

pub mod mock_stages;
pub mod recording_persistence;
pub mod strategies;

pub use mock_stages::*;
pub use recording_persistence::*;
pub use strategies::*;

use invoice_flow::config::FlowConfig;
use invoice_flow::orchestration::{FlowEngine, StatePersistence};
use std::sync::Arc;
use std::time::Duration;

/// Engine wired to a scripted stage client and a recording store
pub struct TestHarness {
    pub engine: Arc<FlowEngine>,
    pub stages: Arc<ScriptedStageClient>,
    pub persistence: Arc<RecordingPersistence>,
}

impl TestHarness {
    pub fn new(stages: ScriptedStageClient) -> Self {
        Self::with_config(stages, test_config())
    }

    pub fn with_config(stages: ScriptedStageClient, config: FlowConfig) -> Self {
        let stages = Arc::new(stages);
        let persistence = Arc::new(RecordingPersistence::new());
        let engine = Arc::new(FlowEngine::new(
            stages.clone(),
            persistence.clone() as Arc<dyn StatePersistence>,
            Arc::new(config),
        ));
        Self {
            engine,
            stages,
            persistence,
        }
    }
}

/// Default configuration with short stage timeouts
pub fn test_config() -> FlowConfig {
    let mut config = FlowConfig::default();
    config.stages.default_timeout_ms = 500;
    config
}

/// Poll until `check` holds or the deadline passes
pub async fn wait_until<F: Fn() -> bool>(check: F, deadline: Duration) -> bool {
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
