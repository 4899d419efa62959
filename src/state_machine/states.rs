use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing stages an invoice passes through, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// OCR / text extraction
    Extraction,
    /// Extracted fields mapped onto the invoice schema
    Mapping,
    /// Business-rule validation
    Validation,
    /// Validation report generation
    Report,
    /// Conversion into each configured target format
    Conversion,
    /// Push of each converted artifact to its target system
    Integration,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 6] = [
        Stage::Extraction,
        Stage::Mapping,
        Stage::Validation,
        Stage::Report,
        Stage::Conversion,
        Stage::Integration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Mapping => "mapping",
            Self::Validation => "validation",
            Self::Report => "report",
            Self::Conversion => "conversion",
            Self::Integration => "integration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extraction" => Ok(Self::Extraction),
            "mapping" => Ok(Self::Mapping),
            "validation" => Ok(Self::Validation),
            "report" => Ok(Self::Report),
            "conversion" => Ok(Self::Conversion),
            "integration" => Ok(Self::Integration),
            _ => Err(format!("Invalid stage: {s}")),
        }
    }
}

/// Authoritative phase of an orchestration
///
/// Serialized as a flat string (`STARTED`, `RUNNING_MAPPING`, `PENDING_REVIEW`, ...)
/// so persisted snapshots stay readable by any backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FlowStatus {
    /// Snapshot created, no node executed yet
    Started,
    /// The given stage is the current node (about to run, or halted there)
    Running(Stage),
    /// Suspended until a human review decision arrives
    PendingReview,
    /// Terminal: validation failed or a reviewer rejected the document
    Rejected,
    /// Terminal: every stage completed
    Completed,
}

impl FlowStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Check if the flow is waiting for an external review decision
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::PendingReview)
    }

    /// Check if the flow still has nodes to execute
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Running(_))
    }

    /// Stage that is current, if the flow is running
    pub fn running_stage(&self) -> Option<Stage> {
        match self {
            Self::Running(stage) => Some(*stage),
            _ => None,
        }
    }

    /// Position along the pipeline, used to check monotonic progress
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Started => 0,
            Self::Running(Stage::Extraction) => 1,
            Self::Running(Stage::Mapping) => 2,
            Self::Running(Stage::Validation) => 3,
            Self::Running(Stage::Report) => 4,
            Self::PendingReview | Self::Rejected => 5,
            Self::Running(Stage::Conversion) => 6,
            Self::Running(Stage::Integration) => 7,
            Self::Completed => 8,
        }
    }
}

impl Default for FlowStatus {
    fn default() -> Self {
        Self::Started
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::Running(stage) => write!(f, "RUNNING_{}", stage.as_str().to_uppercase()),
            Self::PendingReview => write!(f, "PENDING_REVIEW"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl std::str::FromStr for FlowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(Self::Started),
            "PENDING_REVIEW" => Ok(Self::PendingReview),
            "REJECTED" => Ok(Self::Rejected),
            "COMPLETED" => Ok(Self::Completed),
            other => other
                .strip_prefix("RUNNING_")
                .and_then(|stage| stage.to_lowercase().parse::<Stage>().ok())
                .map(Self::Running)
                .ok_or_else(|| format!("Invalid flow status: {s}")),
        }
    }
}

impl From<FlowStatus> for String {
    fn from(status: FlowStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for FlowStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
