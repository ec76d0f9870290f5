//! Run result aggregation.

use crate::resolver::ReferenceStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happened to one definition or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
    Failed,
}

/// Created/updated/skipped/failed counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncCounts {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Created plus updated.
    pub fn applied(&self) -> usize {
        self.created + self.updated
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// Aggregate result of one run.
///
/// `records` covers records only and is serialized as top-level
/// `created`/`updated`/`skipped`/`failed`; definitions have their own
/// counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    #[serde(flatten)]
    pub records: SyncCounts,
    pub reference_stats: ReferenceStats,
    pub definitions: SyncCounts,
    pub by_type: BTreeMap<String, SyncCounts>,
    /// Types whose source records could not be listed.
    pub failed_types: Vec<String>,
}

impl SyncResult {
    /// Records the outcome of one record of `definition_type`.
    pub fn record(&mut self, definition_type: &str, outcome: Outcome) {
        self.records.record(outcome);
        self.by_type
            .entry(definition_type.to_string())
            .or_default()
            .record(outcome);
    }

    /// Records the outcome of one definition.
    pub fn record_definition(&mut self, outcome: Outcome) {
        self.definitions.record(outcome);
    }

    pub fn record_failed_type(&mut self, definition_type: &str) {
        if !self.failed_types.iter().any(|t| t == definition_type) {
            self.failed_types.push(definition_type.to_string());
        }
    }

    /// Counters for one type; zero if nothing of that type was processed.
    pub fn counts_for(&self, definition_type: &str) -> SyncCounts {
        self.by_type.get(definition_type).cloned().unwrap_or_default()
    }

    /// True when nothing failed.
    pub fn is_clean(&self) -> bool {
        self.records.failed == 0 && self.definitions.failed == 0 && self.failed_types.is_empty()
    }
}
