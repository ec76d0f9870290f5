//! Per-store definition catalog.

use metasync_store::DataStore;
use metasync_types::Definition;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// All definitions of one store, indexed by id and by type.
///
/// Built once per run. A failed listing yields an empty catalog: callers
/// cannot tell "no definitions" from "fetch failed" and must not need to.
#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    store_name: String,
    definitions: HashMap<String, Definition>,
    id_by_type: HashMap<String, String>,
    /// Types in the order the store listed them, then discovery order.
    order: Vec<String>,
}

impl DefinitionCatalog {
    /// Loads every definition of `store`.
    pub async fn load(store: &dyn DataStore) -> Self {
        let definitions = match store.fetch_definitions().await {
            Ok(definitions) => definitions,
            Err(e) => {
                warn!(
                    "{}: failed to fetch definitions, continuing with none: {}",
                    store.name(),
                    e
                );
                Vec::new()
            }
        };
        info!("{}: {} definitions", store.name(), definitions.len());
        Self::from_definitions(store.name(), definitions)
    }

    /// Builds a catalog from definitions already in hand.
    pub fn from_definitions(
        store_name: impl Into<String>,
        definitions: impl IntoIterator<Item = Definition>,
    ) -> Self {
        let mut catalog = Self {
            store_name: store_name.into(),
            ..Default::default()
        };
        for definition in definitions {
            catalog.insert(definition);
        }
        catalog
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Returns the definition with `id`, fetching and caching it if unknown.
    ///
    /// Fetch failures and unknown ids both yield `None`.
    pub async fn fetch_by_id(&mut self, store: &dyn DataStore, id: &str) -> Option<&Definition> {
        if !self.definitions.contains_key(id) {
            match store.fetch_definition_by_id(id).await {
                Ok(Some(definition)) => {
                    debug!(
                        "{}: discovered definition {} ({})",
                        self.store_name, definition.definition_type, id
                    );
                    self.insert(definition);
                }
                Ok(None) => {
                    warn!("{}: definition {} does not exist", self.store_name, id);
                    return None;
                }
                Err(e) => {
                    warn!("{}: failed to fetch definition {}: {}", self.store_name, id, e);
                    return None;
                }
            }
        }
        self.definitions.get(id)
    }

    /// Adds or replaces a definition. An existing entry for the same type is
    /// dropped.
    pub fn insert(&mut self, definition: Definition) {
        if let Some(old_id) = self.id_by_type.get(&definition.definition_type) {
            if *old_id != definition.id {
                self.definitions.remove(old_id);
            }
        } else {
            self.order.push(definition.definition_type.clone());
        }
        self.id_by_type
            .insert(definition.definition_type.clone(), definition.id.clone());
        self.definitions.insert(definition.id.clone(), definition);
    }

    pub fn get(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(id)
    }

    pub fn by_type(&self, definition_type: &str) -> Option<&Definition> {
        self.id_by_type
            .get(definition_type)
            .and_then(|id| self.definitions.get(id))
    }

    /// This store's id for `definition_type`.
    pub fn id_for_type(&self, definition_type: &str) -> Option<&str> {
        self.id_by_type.get(definition_type).map(String::as_str)
    }

    /// The type of the definition with `id`, if cached.
    pub fn type_for_id(&self, id: &str) -> Option<&str> {
        self.definitions
            .get(id)
            .map(|d| d.definition_type.as_str())
    }

    /// Known types, in listing order.
    pub fn types(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
