use invoice_flow::orchestration::{StageError, StubValidation};
use invoice_flow::Stage;
use proptest::prelude::*;

/// Strategy for generating document identifiers
pub fn document_id_strategy() -> impl Strategy<Value = String> {
    "inv-[a-z0-9]{1,12}"
}

/// Strategy for generating validation verdicts
pub fn validation_strategy() -> impl Strategy<Value = StubValidation> {
    (any::<bool>(), any::<bool>()).prop_map(|(valid, requires_human_review)| StubValidation {
        valid,
        requires_human_review,
        errors: if valid {
            Vec::new()
        } else {
            vec!["amount mismatch".to_string()]
        },
        warnings: Vec::new(),
    })
}

/// Strategy for picking a stage
pub fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop::sample::select(Stage::ALL.to_vec())
}

/// Strategy for generating stage failures
pub fn stage_error_strategy() -> impl Strategy<Value = StageError> {
    prop_oneof![
        Just(StageError::unavailable("connection refused")),
        Just(StageError::invalid_input("unreadable document")),
        Just(StageError::timeout("deadline exceeded")),
        Just(StageError::rejected("duplicate invoice")),
    ]
}

/// A sequence of up to four scripted stage failures
pub fn failure_script_strategy() -> impl Strategy<Value = Vec<(Stage, StageError)>> {
    prop::collection::vec((stage_strategy(), stage_error_strategy()), 0..4)
}
