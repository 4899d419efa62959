pub mod publisher;

// Re-export key types for convenience
pub use publisher::{FlowEvent, FlowEventPublisher};
