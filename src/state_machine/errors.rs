use thiserror::Error;

/// Errors raised by the flow state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No node to execute in state {status}")]
    NothingToExecute { status: String },

    #[error("Output for stage {stage} is already recorded")]
    OutputAlreadyRecorded { stage: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StateMachineError::InvalidTransition {
            from: "COMPLETED".to_string(),
            to: "RUNNING_MAPPING".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition from COMPLETED to RUNNING_MAPPING"
        );
    }
}
