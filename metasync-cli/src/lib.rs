//! Argument parsing, config file loading and result display for the
//! `metasync` binary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use metasync_engine::{RunConfig, SyncMode, SyncResult, TypeSelection};
use metasync_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(name = "metasync", version)]
#[command(about = "Copy record definitions and records from one store to another")]
pub struct Args {
    /// Record types to sync: `all` or a comma-separated list
    #[arg(default_value = "all")]
    pub types: String,

    /// Path to the JSON config file holding both stores' settings
    #[arg(short, long, default_value = "metasync.json")]
    pub config: PathBuf,

    /// Apply changes to the target; without this flag the run is simulated
    #[arg(long)]
    pub live: bool,

    /// Maximum definitions per run and records per type
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only sync the record with this handle
    #[arg(long)]
    pub handle: Option<String>,

    /// Sync definitions and skip records
    #[arg(long, conflicts_with = "data_only")]
    pub definitions_only: bool,

    /// Sync records and leave definitions untouched
    #[arg(long)]
    pub data_only: bool,

    /// Trim and lowercase handles before matching
    #[arg(long)]
    pub normalize_handles: bool,

    /// Print the result as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Builds the run configuration. Flags override the file's `run` section.
    pub fn run_config(&self, file: &RunSection) -> RunConfig {
        let mode = if self.definitions_only {
            SyncMode::DefinitionsOnly
        } else if self.data_only {
            SyncMode::DataOnly
        } else {
            SyncMode::Full
        };
        RunConfig {
            types: TypeSelection::parse(&self.types),
            live: self.live,
            limit: self.limit.or(file.limit),
            single_handle: self.handle.clone(),
            mode,
            normalize_handles: self.normalize_handles || file.normalize_handles,
        }
    }
}

/// Run defaults read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub limit: Option<usize>,
    pub normalize_handles: bool,
}

/// Contents of the JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub source: StoreConfig,
    pub target: StoreConfig,
    #[serde(default)]
    pub run: RunSection,
}

impl FileConfig {
    /// Reads and validates the config file at `path`.
    ///
    /// Stores left with the default name are labelled `source` and `target`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: FileConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let default_name = StoreConfig::default().name;
        if config.source.name == default_name {
            config.source.name = "source".to_string();
        }
        if config.target.name == default_name {
            config.target.name = "target".to_string();
        }
        if config.source.name == config.target.name {
            bail!("source and target must have different names");
        }
        for store in [&config.source, &config.target] {
            if let Err(e) = store.validate() {
                bail!("Invalid store settings: {}", e);
            }
        }
        Ok(config)
    }
}

/// Human-readable summary of a run.
pub fn render_summary(result: &SyncResult, live: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "========================================");
    let _ = writeln!(
        out,
        "  Sync {}",
        if live { "complete" } else { "rehearsal complete (dry run)" }
    );
    let _ = writeln!(out, "========================================");
    let d = &result.definitions;
    let _ = writeln!(
        out,
        "  Definitions: {} created, {} updated, {} skipped, {} failed",
        d.created, d.updated, d.skipped, d.failed
    );
    let r = &result.records;
    let _ = writeln!(
        out,
        "  Records:     {} created, {} updated, {} skipped, {} failed",
        r.created, r.updated, r.skipped, r.failed
    );
    for (definition_type, counts) in &result.by_type {
        let _ = writeln!(
            out,
            "    {:<20} {} created, {} updated, {} skipped, {} failed",
            definition_type, counts.created, counts.updated, counts.skipped, counts.failed
        );
    }

    let refs = &result.reference_stats;
    let _ = writeln!(
        out,
        "  References:  {} processed, {} translated, {} blanked, {} warnings, {} errors",
        refs.processed, refs.transformed, refs.blanked, refs.warnings, refs.errors
    );
    if !refs.unsupported_types.is_empty() {
        let types: Vec<&str> = refs.unsupported_types.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  Not translated: {}", types.join(", "));
    }
    if !result.failed_types.is_empty() {
        let _ = writeln!(out, "  Could not list: {}", result.failed_types.join(", "));
    }
    let _ = writeln!(out, "========================================");
    out
}
