use clap::Parser;
use metasync_cli::{render_summary, Args, FileConfig, RunSection};
use metasync_engine::{Outcome, SyncMode, SyncResult, TypeSelection};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

const VALID: &str = r#"{
    "source": { "shop_domain": "source.example.com", "access_token": "shpat_source" },
    "target": { "shop_domain": "target.example.com", "access_token": "shpat_target", "page_size": 100 },
    "run": { "limit": 25, "normalize_handles": true }
}"#;

// ── Config file ──────────────────────────────────────────────────

#[test]
fn loads_store_settings_and_run_defaults() {
    let file = write_config(VALID);

    let config = FileConfig::load(file.path()).unwrap();

    assert_eq!(config.source.name, "source");
    assert_eq!(config.target.name, "target");
    assert_eq!(config.source.shop_domain, "source.example.com");
    assert_eq!(config.target.page_size, 100);
    assert_eq!(config.source.api_version, "2025-01");
    assert_eq!(
        config.run,
        RunSection {
            limit: Some(25),
            normalize_handles: true
        }
    );
}

#[test]
fn run_section_is_optional() {
    let file = write_config(
        r#"{
            "source": { "shop_domain": "a.example.com", "access_token": "x" },
            "target": { "shop_domain": "b.example.com", "access_token": "y" }
        }"#,
    );

    let config = FileConfig::load(file.path()).unwrap();

    assert_eq!(config.run, RunSection::default());
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let err = FileConfig::load(&path).unwrap_err();

    assert!(format!("{err:#}").contains("absent.json"));
}

#[test]
fn malformed_json_is_rejected() {
    let file = write_config("{ not json");

    let err = FileConfig::load(file.path()).unwrap_err();

    assert!(format!("{err}").starts_with("Failed to parse config file"));
}

#[test]
fn incomplete_store_settings_are_rejected() {
    let file = write_config(
        r#"{
            "source": { "shop_domain": "a.example.com" },
            "target": { "shop_domain": "b.example.com", "access_token": "y" }
        }"#,
    );

    let err = FileConfig::load(file.path()).unwrap_err();

    assert!(format!("{err}").contains("source: access_token is required"));
}

#[test]
fn stores_need_distinct_names() {
    let file = write_config(
        r#"{
            "source": { "name": "shop", "shop_domain": "a.example.com", "access_token": "x" },
            "target": { "name": "shop", "shop_domain": "b.example.com", "access_token": "y" }
        }"#,
    );

    assert!(FileConfig::load(file.path()).is_err());
}

// ── Arguments ────────────────────────────────────────────────────

#[test]
fn defaults_to_a_dry_run_over_all_types() {
    let args = Args::try_parse_from(["metasync"]).unwrap();

    let config = args.run_config(&RunSection::default());

    assert_eq!(config.types, TypeSelection::All);
    assert!(!config.live);
    assert_eq!(config.limit, None);
    assert_eq!(config.mode, SyncMode::Full);
    assert!(!args.json);
}

#[test]
fn flags_override_the_file() {
    let args = Args::try_parse_from([
        "metasync",
        "author,book",
        "--live",
        "--limit",
        "5",
        "--handle",
        "jane",
        "--data-only",
    ])
    .unwrap();
    let file = RunSection {
        limit: Some(25),
        normalize_handles: true,
    };

    let config = args.run_config(&file);

    assert_eq!(
        config.types,
        TypeSelection::Only(vec!["author".to_string(), "book".to_string()])
    );
    assert!(config.live);
    assert_eq!(config.limit, Some(5));
    assert_eq!(config.single_handle.as_deref(), Some("jane"));
    assert_eq!(config.mode, SyncMode::DataOnly);
    assert!(config.normalize_handles);
}

#[test]
fn file_limit_applies_without_flag() {
    let args = Args::try_parse_from(["metasync", "--definitions-only"]).unwrap();
    let file = RunSection {
        limit: Some(25),
        normalize_handles: false,
    };

    let config = args.run_config(&file);

    assert_eq!(config.limit, Some(25));
    assert_eq!(config.mode, SyncMode::DefinitionsOnly);
}

#[test]
fn phase_flags_conflict() {
    assert!(Args::try_parse_from(["metasync", "--definitions-only", "--data-only"]).is_err());
}

// ── Summary ──────────────────────────────────────────────────────

#[test]
fn summary_lists_counters_and_problems() {
    let mut result = SyncResult::default();
    result.record("author", Outcome::Created);
    result.record("author", Outcome::Failed);
    result.record_definition(Outcome::Updated);
    result.record_failed_type("book");
    result.reference_stats.processed = 4;
    result.reference_stats.transformed = 3;
    result.reference_stats.blanked = 1;
    result
        .reference_stats
        .unsupported_types
        .insert("file_reference".to_string());

    let summary = render_summary(&result, true);

    assert!(summary.contains("Sync complete"));
    assert!(summary.contains("Definitions: 0 created, 1 updated, 0 skipped, 0 failed"));
    assert!(summary.contains("Records:     1 created, 0 updated, 0 skipped, 1 failed"));
    assert!(summary.contains("4 processed, 3 translated, 1 blanked"));
    assert!(summary.contains("Not translated: file_reference"));
    assert!(summary.contains("Could not list: book"));
}

#[test]
fn summary_marks_dry_runs() {
    let summary = render_summary(&SyncResult::default(), false);

    assert!(summary.contains("dry run"));
    assert!(!summary.contains("Not translated"));
}
