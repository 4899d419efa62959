//! # System Constants
//!
//! Defaults and event names that define the operational boundaries of the
//! invoice flow engine.

/// Flow lifecycle events published after each persisted transition
pub mod events {
    pub const FLOW_STARTED: &str = "flow.started";
    pub const FLOW_STAGE_COMPLETED: &str = "flow.stage_completed";
    pub const FLOW_STAGE_FAILED: &str = "flow.stage_failed";
    pub const FLOW_SUSPENDED: &str = "flow.suspended";
    pub const FLOW_REVIEW_RESOLVED: &str = "flow.review_resolved";
    pub const FLOW_REJECTED: &str = "flow.rejected";
    pub const FLOW_COMPLETED: &str = "flow.completed";
}

/// System-wide defaults
pub mod system {
    /// Conversion/integration targets used when none are configured
    pub const DEFAULT_CONVERSION_TARGETS: [&str; 2] = ["tally", "zoho"];
    pub const DEFAULT_VALIDATION_RULESET: &str = "default";
    pub const DEFAULT_REPORT_USER_ID: &str = "system";

    pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1_000;

    pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 1;
    pub const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 200;
    pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 10_000;
    pub const DEFAULT_RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

    pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

    /// Environment variable prefix for configuration overrides
    pub const CONFIG_ENV_PREFIX: &str = "INVOICE_FLOW";
    pub const CONFIG_FILE_STEM: &str = "invoice-flow";
}
