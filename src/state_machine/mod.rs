// State machine module for the invoice pipeline
//
// Status values, the transition table and the review decisions that drive a
// suspended flow. The table is a plain match rather than a graph library.

pub mod errors;
pub mod events;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::ReviewDecision;
pub use states::{FlowStatus, Stage};
