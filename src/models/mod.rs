pub mod orchestration_state;

// Re-export models for easy access
pub use orchestration_state::{OrchestrationState, ReviewRecord, StageHalt, StageOutput};
