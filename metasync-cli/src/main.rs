//! metasync
//!
//! Copies record definitions and records from a source store to a target
//! store, translating references between them.
//!
//! Usage:
//!   metasync author,book --config metasync.json
//!   metasync all --live --limit 10
//!
//! Runs are simulated unless `--live` is given.

use std::process::ExitCode;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use metasync_cli::{render_summary, Args, FileConfig};
use metasync_engine::SyncOrchestrator;
use metasync_store::GraphqlStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let file = FileConfig::load(&args.config)?;
    let config = args.run_config(&file.run);
    info!(
        "{} -> {}, types: {}",
        file.source.name, file.target.name, args.types
    );

    let source = Arc::new(GraphqlStore::new(file.source));
    let target = Arc::new(GraphqlStore::new(file.target));
    let mut orchestrator = SyncOrchestrator::new(source, target, config);
    let result = orchestrator.run().await.context("Sync did not start")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to encode result")?
        );
    } else {
        println!("\n{}", render_summary(&result, orchestrator.is_live()));
    }

    Ok(if result.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
