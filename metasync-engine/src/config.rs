//! Run configuration.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Which record types a run covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSelection {
    /// Every type the source catalog reports.
    All,
    /// An explicit list, in the order given.
    Only(Vec<String>),
}

impl TypeSelection {
    /// Parses `all` or a comma-separated list of types.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("all") {
            return TypeSelection::All;
        }
        TypeSelection::Only(
            value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// A selection of exactly one type.
    pub fn single(definition_type: impl Into<String>) -> Self {
        TypeSelection::Only(vec![definition_type.into()])
    }
}

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Full,
    DefinitionsOnly,
    DataOnly,
}

impl SyncMode {
    pub fn includes_definitions(self) -> bool {
        matches!(self, SyncMode::Full | SyncMode::DefinitionsOnly)
    }

    pub fn includes_data(self) -> bool {
        matches!(self, SyncMode::Full | SyncMode::DataOnly)
    }
}

/// Configuration for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub types: TypeSelection,
    /// Apply mutations to the target. When false, mutations are simulated.
    pub live: bool,
    /// Bounds definitions processed per run and records processed per type.
    /// `None` means unbounded.
    pub limit: Option<usize>,
    /// Only sync the record with this handle.
    pub single_handle: Option<String>,
    pub mode: SyncMode,
    /// Trim and lowercase handles on both sides before matching.
    pub normalize_handles: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            types: TypeSelection::All,
            live: false,
            limit: None,
            single_handle: None,
            mode: SyncMode::Full,
            normalize_handles: false,
        }
    }
}

impl RunConfig {
    /// A dry run over `types` with no limit.
    pub fn new(types: TypeSelection) -> Self {
        Self {
            types,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_single_handle(mut self, handle: impl Into<String>) -> Self {
        self.single_handle = Some(handle.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn normalize_handles(mut self, normalize: bool) -> Self {
        self.normalize_handles = normalize;
        self
    }

    /// Rejects configurations that cannot do any meaningful work.
    pub fn validate(&self) -> EngineResult<()> {
        if self.limit == Some(0) {
            return Err(EngineError::InvalidConfig(
                "limit must be at least 1".to_string(),
            ));
        }
        if let TypeSelection::Only(types) = &self.types {
            if types.is_empty() {
                return Err(EngineError::InvalidConfig("no types selected".to_string()));
            }
            if types.iter().any(|t| t.trim().is_empty()) {
                return Err(EngineError::InvalidConfig(
                    "type names must not be empty".to_string(),
                ));
            }
        }
        if self
            .single_handle
            .as_deref()
            .is_some_and(|h| h.trim().is_empty())
        {
            return Err(EngineError::InvalidConfig(
                "single handle must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
