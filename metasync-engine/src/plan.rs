//! Expansion of a [`TypeSelection`] into an ordered list of sync tasks.

use crate::catalog::DefinitionCatalog;
use crate::config::TypeSelection;
use std::collections::HashSet;

/// Sync work for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    pub definition_type: String,
}

/// The explicit task list a run executes.
///
/// Types referenced by other selected types come first, so their target
/// definitions and records exist when the referencing type is synced.
/// Within a reference cycle, the type reached first in selection order is
/// placed last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    tasks: Vec<SyncTask>,
}

impl SyncPlan {
    /// Builds the plan. `All` expands to every type in `source`, in listing
    /// order; repeated types are dropped.
    pub fn build(selection: &TypeSelection, source: &DefinitionCatalog) -> Self {
        let requested: Vec<String> = match selection {
            TypeSelection::All => source.types().to_vec(),
            TypeSelection::Only(types) => {
                let mut seen = HashSet::new();
                types
                    .iter()
                    .filter(|t| seen.insert(t.as_str()))
                    .cloned()
                    .collect()
            }
        };

        let selected: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let mut visited = HashSet::new();
        let mut ordered = Vec::with_capacity(requested.len());
        for definition_type in &requested {
            visit(definition_type, source, &selected, &mut visited, &mut ordered);
        }

        Self {
            tasks: ordered
                .into_iter()
                .map(|definition_type| SyncTask { definition_type })
                .collect(),
        }
    }

    pub fn tasks(&self) -> &[SyncTask] {
        &self.tasks
    }

    pub fn types(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.definition_type.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn visit(
    definition_type: &str,
    source: &DefinitionCatalog,
    selected: &HashSet<&str>,
    visited: &mut HashSet<String>,
    ordered: &mut Vec<String>,
) {
    if !visited.insert(definition_type.to_string()) {
        return;
    }
    if let Some(definition) = source.by_type(definition_type) {
        for field in &definition.field_definitions {
            for id in field.referenced_definition_ids() {
                if let Some(dependency) = source.type_for_id(&id) {
                    if selected.contains(dependency) {
                        visit(dependency, source, selected, visited, ordered);
                    }
                }
            }
        }
    }
    ordered.push(definition_type.to_string());
}
