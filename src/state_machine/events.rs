use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision delivered by a human reviewer for a suspended flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// Continue at conversion as if validation had passed
    Approve,
    /// End the flow as rejected
    Reject,
}

impl ReviewDecision {
    /// Get a string representation of the decision for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReviewDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(format!(
                "Invalid decision '{s}'. Must be 'approve' or 'reject'"
            )),
        }
    }
}
