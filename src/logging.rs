//! # Structured Logging Module
//!
//! Environment-aware structured logging for long-running document flows.

use crate::config::ConfigManager;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging for the environment detected from
/// `INVOICE_FLOW_ENV` / `APP_ENV`
pub fn init_structured_logging() {
    init_structured_logging_for(&ConfigManager::detect_environment());
}

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` takes precedence over the environment default. Production emits
/// JSON lines, every other environment human-readable output. Only the first
/// call in a process takes effect.
pub fn init_structured_logging_for(environment: &str) {
    let environment = ConfigManager::normalize_environment(environment);
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = std::env::var("RUST_LOG")
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if uses_json_output(&environment) {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized, keeping it");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn uses_json_output(environment: &str) -> bool {
    environment == "production"
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for flow operations (start, resume, retry)
pub fn log_flow_operation(
    operation: &str,
    document_id: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        document_id = %document_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 FLOW_OPERATION"
    );
}

/// Log structured data for a single stage invocation
pub fn log_stage_operation(
    document_id: &str,
    stage: &str,
    target: Option<&str>,
    outcome: &str,
    duration_ms: u64,
    details: Option<&str>,
) {
    tracing::info!(
        document_id = %document_id,
        stage = %stage,
        target = target,
        outcome = %outcome,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 STAGE_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
