//! # Invoice Flow CLI
//!
//! Operator tool for driving and inspecting orchestrations. Stage calls go to the
//! in-process stub stages; persistence follows `persistence.backend` in the
//! loaded configuration. Every command prints the resulting snapshot as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use invoice_flow::config::ConfigManager;
use invoice_flow::logging::{init_structured_logging, init_structured_logging_for};
use invoice_flow::orchestration::{OrchestrationService, StubStageClient};
use invoice_flow::OrchestrationState;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(name = "invoice-flow")]
#[command(about = "Drive invoices through the processing pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration directory (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment overlay to apply (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the flow for a document
    Start { document_id: String },

    /// Resolve a pending human review
    Resume {
        document_id: String,
        /// approve or reject
        decision: String,
        /// Free-form reviewer notes
        notes: Option<String>,
    },

    /// Re-run the stage a flow halted on
    Retry { document_id: String },

    /// Show the stored snapshot
    Get { document_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match cli.environment.as_deref() {
        Some(environment) => init_structured_logging_for(environment),
        None => init_structured_logging(),
    }

    match run(cli).await {
        Ok(state) => match serde_json::to_string_pretty(&state) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!(error = %e, "Failed to render snapshot");
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<OrchestrationState> {
    let manager = match cli.environment {
        Some(environment) => {
            ConfigManager::load_from_directory_with_env(cli.config_dir, &environment)
        }
        None => ConfigManager::load_from_directory(cli.config_dir),
    }
    .context("Failed to load configuration")?;

    let service = OrchestrationService::bootstrap(&manager, Arc::new(StubStageClient::new()))
        .await
        .context("Failed to bootstrap orchestration service")?;

    let state = match cli.command {
        Commands::Start { document_id } => service.start(&document_id).await,
        Commands::Resume {
            document_id,
            decision,
            notes,
        } => service.resume(&document_id, &decision, notes).await,
        Commands::Retry { document_id } => service.retry(&document_id).await,
        Commands::Get { document_id } => service.get(&document_id).await,
    }?;

    Ok(state)
}
