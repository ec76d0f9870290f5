//! Cross-store reference translation.
//!
//! Reference fields hold store-local record ids. To copy such a field, the
//! resolver looks up the referenced source record, takes its `(type, handle)`
//! and finds the target record with the same pair. The translated field holds
//! that record's target id.
//!
//! A reference that cannot be resolved is blanked (single references) or
//! dropped (list entries) and counted in [`ReferenceStats`]. A source lookup
//! that fails in transport is returned as a [`StoreError`] instead, so the
//! caller can fail the record without overwriting the target's value.

use crate::catalog::DefinitionCatalog;
use crate::diagnostics::preview;
use crate::field_policy::FieldTypePolicy;
use crate::matcher::{EntityMatcher, HandleIndex};
use crate::pages::collect_instances;
use futures::stream::{self, StreamExt};
use metasync_store::{DataStore, StoreError, StoreResult};
use metasync_types::{parse_reference_list, Definition, Field, FieldKind, Instance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source lookups in flight at once while translating a list reference.
const LOOKUP_CONCURRENCY: usize = 4;

const EMPTY_LIST: &str = "[]";

/// Reference translation counters for one run.
///
/// Each single reference and each list entry counts once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceStats {
    pub processed: usize,
    pub transformed: usize,
    pub blanked: usize,
    pub warnings: usize,
    /// List values that could not be parsed.
    pub errors: usize,
    /// Declared field types whose references this engine cannot translate.
    pub unsupported_types: BTreeSet<String>,
}

#[derive(Debug)]
enum Unresolved {
    SourceMissing,
    NoHandle,
    NoTargetDefinition(String),
    NoCounterpart { instance_type: String, handle: String },
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::SourceMissing => f.write_str("source record not found"),
            Unresolved::NoHandle => f.write_str("source record has no handle"),
            Unresolved::NoTargetDefinition(t) => write!(f, "target has no definition for {t}"),
            Unresolved::NoCounterpart {
                instance_type,
                handle,
            } => write!(f, "no {instance_type} '{handle}' in target"),
        }
    }
}

/// Translates reference fields from source ids to target ids.
///
/// Holds per-run state: visited types, target handle indexes and a cache of
/// source records already looked up.
pub struct ReferenceResolver {
    source: Arc<dyn DataStore>,
    target: Arc<dyn DataStore>,
    matcher: EntityMatcher,
    policy: FieldTypePolicy,
    visited: HashSet<String>,
    referenced: Vec<String>,
    /// `None` marks a type that cannot be indexed.
    indexes: HashMap<String, Option<HandleIndex>>,
    /// Records created before their type's index was built.
    pending: HashMap<String, Vec<Instance>>,
    source_cache: HashMap<String, Option<Instance>>,
    stats: ReferenceStats,
}

impl ReferenceResolver {
    pub fn new(
        source: Arc<dyn DataStore>,
        target: Arc<dyn DataStore>,
        matcher: EntityMatcher,
        policy: FieldTypePolicy,
    ) -> Self {
        Self {
            source,
            target,
            matcher,
            policy,
            visited: HashSet::new(),
            referenced: Vec::new(),
            indexes: HashMap::new(),
            pending: HashMap::new(),
            source_cache: HashMap::new(),
            stats: ReferenceStats::default(),
        }
    }

    pub fn stats(&self) -> &ReferenceStats {
        &self.stats
    }

    pub fn into_stats(self) -> ReferenceStats {
        self.stats
    }

    /// Types referenced by any type discovered so far, in discovery order.
    pub fn referenced_types(&self) -> &[String] {
        &self.referenced
    }

    /// Whether a usable target index exists for `definition_type`.
    pub fn has_index(&self, definition_type: &str) -> bool {
        matches!(self.indexes.get(definition_type), Some(Some(_)))
    }

    // ── Discovery ────────────────────────────────────────────────

    /// Walks the reference graph from `types`, loading source definitions
    /// that are not yet in `source_catalog`.
    ///
    /// Each type is visited once, so reference cycles terminate. Returns the
    /// referenced types found by this call.
    pub async fn discover(
        &mut self,
        source_catalog: &mut DefinitionCatalog,
        types: &[String],
    ) -> Vec<String> {
        let mut queue: VecDeque<String> = types.iter().cloned().collect();
        let mut found = Vec::new();

        while let Some(definition_type) = queue.pop_front() {
            if !self.visited.insert(definition_type.clone()) {
                continue;
            }
            let Some(definition) = source_catalog.by_type(&definition_type).cloned() else {
                debug!("no source definition for {}", definition_type);
                continue;
            };

            for field in &definition.field_definitions {
                if !self.policy.classify(field).is_reference() {
                    continue;
                }
                for id in field.referenced_definition_ids() {
                    let referenced = match source_catalog.fetch_by_id(&*self.source, &id).await {
                        Some(d) => d.definition_type.clone(),
                        None => {
                            warn!(
                                "{}.{}: referenced definition {} is unknown",
                                definition_type, field.key, id
                            );
                            continue;
                        }
                    };
                    if !self.referenced.contains(&referenced) {
                        self.referenced.push(referenced.clone());
                        found.push(referenced.clone());
                    }
                    if !self.visited.contains(&referenced) {
                        queue.push_back(referenced);
                    }
                }
            }
        }

        if !found.is_empty() {
            info!("referenced types: {}", found.join(", "));
        }
        found
    }

    // ── Target indexes ───────────────────────────────────────────

    /// Builds target handle indexes for every referenced type.
    pub async fn build_indexes(&mut self, target_catalog: &DefinitionCatalog) {
        for definition_type in self.referenced.clone() {
            self.ensure_index(target_catalog, &definition_type).await;
        }
    }

    /// Returns the target index for `definition_type`, building it on first use.
    pub async fn ensure_index(
        &mut self,
        target_catalog: &DefinitionCatalog,
        definition_type: &str,
    ) -> Option<&HandleIndex> {
        if !self.indexes.contains_key(definition_type) {
            let index = self.load_index(target_catalog, definition_type).await;
            self.indexes.insert(definition_type.to_string(), index);
        }
        self.indexes.get(definition_type).and_then(Option::as_ref)
    }

    async fn load_index(
        &mut self,
        target_catalog: &DefinitionCatalog,
        definition_type: &str,
    ) -> Option<HandleIndex> {
        if target_catalog.by_type(definition_type).is_none() {
            warn!(
                "{}: no definition for {}, references to it will be blanked",
                self.target.name(),
                definition_type
            );
            return None;
        }
        match collect_instances(&*self.target, definition_type, None).await {
            Ok(instances) => {
                let mut index = self.matcher.build_index(instances);
                for instance in self.pending.remove(definition_type).unwrap_or_default() {
                    self.matcher.add(&mut index, instance);
                }
                debug!("indexed {} {} records", index.len(), definition_type);
                Some(index)
            }
            Err(e) => {
                warn!(
                    "{}: failed to list {}, references to it will be blanked: {}",
                    self.target.name(),
                    definition_type,
                    e
                );
                None
            }
        }
    }

    /// Makes a record created during this run resolvable.
    pub fn register(&mut self, definition_type: &str, instance: &Instance) {
        match self.indexes.get_mut(definition_type) {
            Some(Some(index)) => self.matcher.add(index, instance.clone()),
            Some(None) => {}
            None => self
                .pending
                .entry(definition_type.to_string())
                .or_default()
                .push(instance.clone()),
        }
    }

    // ── Translation ──────────────────────────────────────────────

    /// Returns `instance`'s fields with every reference translated.
    pub async fn resolve(
        &mut self,
        target_catalog: &DefinitionCatalog,
        definition: &Definition,
        instance: &Instance,
    ) -> StoreResult<Vec<Field>> {
        let mut fields = instance.fields.clone();
        self.translate_fields(target_catalog, definition, &mut fields)
            .await?;
        Ok(fields)
    }

    /// Translates reference fields of `definition` in place.
    ///
    /// Stops at the first source lookup that fails in transport; fields
    /// after it are left untouched.
    pub async fn translate_fields(
        &mut self,
        target_catalog: &DefinitionCatalog,
        definition: &Definition,
        fields: &mut [Field],
    ) -> StoreResult<()> {
        for field in fields.iter_mut() {
            let Some(field_definition) = definition.field(&field.key) else {
                continue;
            };
            let Some(value) = field
                .value
                .clone()
                .filter(|v| !v.is_empty() && v != EMPTY_LIST)
            else {
                continue;
            };

            match self.policy.classify(field_definition) {
                FieldKind::Reference => {
                    let translated = self
                        .translate_single(target_catalog, &field.key, &value)
                        .await?;
                    field.value = Some(translated);
                }
                FieldKind::ListReference => {
                    let translated = self
                        .translate_list(target_catalog, &field.key, &value)
                        .await?;
                    field.value = Some(translated);
                }
                FieldKind::ExternalReference { list } => {
                    self.stats.processed += 1;
                    self.stats.blanked += 1;
                    self.stats.warnings += 1;
                    self.stats
                        .unsupported_types
                        .insert(field_definition.field_type.clone());
                    warn!(
                        "field '{}': {} values are not translated, blanked (was '{}')",
                        field.key,
                        field_definition.field_type,
                        preview(&value)
                    );
                    field.value = Some(if list { EMPTY_LIST } else { "" }.to_string());
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn translate_single(
        &mut self,
        target_catalog: &DefinitionCatalog,
        key: &str,
        source_id: &str,
    ) -> StoreResult<String> {
        let lookup = self.lookup(target_catalog, source_id).await?;
        self.stats.processed += 1;
        Ok(match lookup {
            Ok(target_id) => {
                self.stats.transformed += 1;
                target_id
            }
            Err(reason) => {
                self.stats.blanked += 1;
                self.stats.warnings += 1;
                warn!(
                    "field '{}': reference '{}' unresolved ({}), blanked",
                    key,
                    preview(source_id),
                    reason
                );
                String::new()
            }
        })
    }

    async fn translate_list(
        &mut self,
        target_catalog: &DefinitionCatalog,
        key: &str,
        value: &str,
    ) -> StoreResult<String> {
        let ids = match parse_reference_list(value) {
            Ok(ids) => ids,
            Err(e) => {
                self.stats.errors += 1;
                warn!(
                    "field '{}': unreadable list value '{}' replaced with []: {}",
                    key,
                    preview(value),
                    e
                );
                return Ok(EMPTY_LIST.to_string());
            }
        };

        self.prefetch(&ids).await;
        let mut translated = Vec::with_capacity(ids.len());
        for id in &ids {
            let target_id = self.translate_single(target_catalog, key, id).await?;
            if !target_id.is_empty() {
                translated.push(target_id);
            }
        }
        Ok(serde_json::to_string(&translated).unwrap_or_else(|_| EMPTY_LIST.to_string()))
    }

    /// The outer error is a failed source lookup; the inner one explains a
    /// reference that resolved to nothing.
    async fn lookup(
        &mut self,
        target_catalog: &DefinitionCatalog,
        source_id: &str,
    ) -> Result<Result<String, Unresolved>, StoreError> {
        let Some(source) = self.source_instance(source_id).await? else {
            return Ok(Err(Unresolved::SourceMissing));
        };
        let Some(handle) = source.handle().map(str::to_string) else {
            return Ok(Err(Unresolved::NoHandle));
        };
        let instance_type = source.instance_type;

        let matcher = self.matcher;
        let Some(index) = self.ensure_index(target_catalog, &instance_type).await else {
            return Ok(Err(Unresolved::NoTargetDefinition(instance_type)));
        };
        Ok(match matcher.find_handle(&handle, index) {
            Some(target) => Ok(target.id.clone()),
            None => Err(Unresolved::NoCounterpart {
                instance_type,
                handle,
            }),
        })
    }

    /// Looks up a source record once per run. Misses are cached, errors are not.
    async fn source_instance(&mut self, id: &str) -> StoreResult<Option<Instance>> {
        if let Some(cached) = self.source_cache.get(id) {
            return Ok(cached.clone());
        }
        let fetched = self.source.fetch_instance_by_id(id).await?;
        self.source_cache.insert(id.to_string(), fetched.clone());
        Ok(fetched)
    }

    /// Loads uncached source records for `ids` with bounded concurrency.
    async fn prefetch(&mut self, ids: &[String]) {
        let mut seen: HashSet<&String> = HashSet::new();
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !self.source_cache.contains_key(id.as_str()))
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();
        if missing.len() < 2 {
            return;
        }

        let source = Arc::clone(&self.source);
        let results: Vec<_> = stream::iter(missing)
            .map(|id| {
                let source = Arc::clone(&source);
                async move {
                    let result = source.fetch_instance_by_id(&id).await;
                    (id, result)
                }
            })
            .buffered(LOOKUP_CONCURRENCY)
            .collect()
            .await;

        for (id, result) in results {
            match result {
                Ok(instance) => {
                    self.source_cache.insert(id, instance);
                }
                // Left uncached; the per-id lookup retries and reports it.
                Err(e) => debug!("{}: prefetch of {} failed: {}", source.name(), id, e),
            }
        }
    }
}
