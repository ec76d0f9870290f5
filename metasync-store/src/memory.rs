//! In-process store.
//!
//! Behaves like a remote store for the engine: store-local ids, handle
//! uniqueness per type, required-field and unknown-key validation, paginated
//! listings. Every mutation is recorded so tests can assert exactly what a run
//! wrote, and failures can be injected per operation.

use crate::error::{StoreError, StoreResult};
use crate::port::{DataStore, MutationOutcome, Page, DEFINITION_PAGE_CAP};
use async_trait::async_trait;
use metasync_types::{
    Definition, DefinitionInput, DefinitionUpdate, Field, FieldDefinitionInput,
    FieldDefinitionOperation, FieldInput, Instance, InstanceInput, UserError,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A mutation the store accepted or rejected, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    CreateDefinition { definition_type: String },
    UpdateDefinition { id: String },
    CreateInstance { instance_type: String, handle: Option<String> },
    UpdateInstance { id: String },
}

#[derive(Debug, Default)]
struct MemoryState {
    definitions: Vec<Definition>,
    instances: Vec<Instance>,
    next_id: u64,
    mutations: Vec<MutationRecord>,
    instance_page_fetches: usize,
    instance_lookups: usize,
    unreachable: bool,
    fail_definition_fetch: bool,
    fail_instance_fetch: HashSet<String>,
    throttle_lookups: bool,
    rejected_handles: HashMap<String, String>,
}

impl MemoryState {
    fn allocate_id(&mut self, store: &str, kind: &str) -> String {
        self.next_id += 1;
        format!("gid://{store}/{kind}/{}", self.next_id)
    }

    fn definition_for_type(&self, definition_type: &str) -> Option<&Definition> {
        self.definitions
            .iter()
            .find(|d| d.definition_type == definition_type)
    }

    fn handle_taken(&self, instance_type: &str, handle: &str) -> bool {
        self.instances
            .iter()
            .any(|i| i.instance_type == instance_type && i.handle() == Some(handle))
    }

    /// Validates field keys and reference targets against the definition.
    fn check_fields(&self, definition: &Definition, fields: &[FieldInput]) -> Vec<UserError> {
        let mut errors = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            let idx = index.to_string();
            let Some(field_def) = definition.field(&field.key) else {
                errors.push(
                    UserError::new(
                        &["fields", idx.as_str(), "key"],
                        format!("Field '{}' is not defined", field.key),
                    )
                    .with_code("UNDEFINED_OBJECT_FIELD"),
                );
                continue;
            };
            if field_def.field_type == "metaobject_reference"
                && !field.value.is_empty()
                && !self.instances.iter().any(|i| i.id == field.value)
            {
                errors.push(
                    UserError::new(
                        &["fields", idx.as_str(), "value"],
                        "Value references a missing record",
                    )
                    .with_code("INVALID_VALUE"),
                );
            }
        }
        errors
    }

    fn check_definition_references(
        &self,
        fields: &[&FieldDefinitionInput],
    ) -> Vec<UserError> {
        let mut errors = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            let idx = index.to_string();
            for id in field.to_field_definition().referenced_definition_ids() {
                if !self.definitions.iter().any(|d| d.id == id) {
                    errors.push(
                        UserError::new(
                            &["fieldDefinitions", idx.as_str(), "validations"],
                            format!("Definition {id} does not exist"),
                        )
                        .with_code("INVALID_OPTION"),
                    );
                }
            }
        }
        errors
    }
}

/// [`DataStore`] held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    page_size: usize,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store. `name` prefixes every id it allocates.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page_size: 50,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Sets the number of records per listing page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.state().unreachable {
            return Err(StoreError::Unavailable(format!("{} is unreachable", self.name)));
        }
        Ok(())
    }

    // ── Seeding ──────────────────────────────────────────────────

    /// Inserts a definition as-is, keeping its id.
    pub fn insert_definition(&self, definition: Definition) {
        self.state().definitions.push(definition);
    }

    /// Inserts a record as-is, keeping its id.
    pub fn insert_instance(&self, instance: Instance) {
        self.state().instances.push(instance);
    }

    // ── Inspection ───────────────────────────────────────────────

    pub fn definitions(&self) -> Vec<Definition> {
        self.state().definitions.clone()
    }

    pub fn definition_by_type(&self, definition_type: &str) -> Option<Definition> {
        self.state().definition_for_type(definition_type).cloned()
    }

    /// Records of `instance_type`, in insertion order.
    pub fn instances_of(&self, instance_type: &str) -> Vec<Instance> {
        self.state()
            .instances
            .iter()
            .filter(|i| i.instance_type == instance_type)
            .cloned()
            .collect()
    }

    pub fn instance_by_handle(&self, instance_type: &str, handle: &str) -> Option<Instance> {
        self.state()
            .instances
            .iter()
            .find(|i| i.instance_type == instance_type && i.handle() == Some(handle))
            .cloned()
    }

    /// Every mutation call received, accepted or not.
    pub fn mutations(&self) -> Vec<MutationRecord> {
        self.state().mutations.clone()
    }

    /// Number of `fetch_instances` calls served.
    pub fn instance_page_fetches(&self) -> usize {
        self.state().instance_page_fetches
    }

    /// Number of `fetch_instance_by_id` calls served.
    pub fn instance_lookups(&self) -> usize {
        self.state().instance_lookups
    }

    // ── Failure injection ────────────────────────────────────────

    /// Makes every call fail with [`StoreError::Unavailable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Makes definition listing fail with a network error.
    pub fn fail_definition_fetch(&self, fail: bool) {
        self.state().fail_definition_fetch = fail;
    }

    /// Makes record listing for `instance_type` fail with a network error.
    pub fn fail_instance_fetch(&self, instance_type: impl Into<String>) {
        self.state().fail_instance_fetch.insert(instance_type.into());
    }

    /// Makes single-record lookups fail with [`StoreError::Throttled`].
    pub fn throttle_lookups(&self, throttled: bool) {
        self.state().throttle_lookups = throttled;
    }

    /// Rejects creates and updates of records with `handle`.
    pub fn reject_handle(&self, handle: impl Into<String>, message: impl Into<String>) {
        self.state()
            .rejected_handles
            .insert(handle.into(), message.into());
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_reachable()
    }

    async fn fetch_definitions(&self) -> StoreResult<Vec<Definition>> {
        self.check_reachable()?;
        let state = self.state();
        if state.fail_definition_fetch {
            return Err(StoreError::Network("definition listing failed".to_string()));
        }
        Ok(state
            .definitions
            .iter()
            .take(DEFINITION_PAGE_CAP)
            .cloned()
            .collect())
    }

    async fn fetch_definition_by_id(&self, id: &str) -> StoreResult<Option<Definition>> {
        self.check_reachable()?;
        Ok(self.state().definitions.iter().find(|d| d.id == id).cloned())
    }

    async fn fetch_instances(
        &self,
        instance_type: &str,
        cursor: Option<&str>,
    ) -> StoreResult<Page<Instance>> {
        self.check_reachable()?;
        let mut state = self.state();
        if state.fail_instance_fetch.contains(instance_type) {
            return Err(StoreError::Network(format!(
                "listing {instance_type} records failed"
            )));
        }
        state.instance_page_fetches += 1;

        let offset = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| StoreError::Decode(format!("invalid cursor: {c}")))?,
            None => 0,
        };
        let matching: Vec<&Instance> = state
            .instances
            .iter()
            .filter(|i| i.instance_type == instance_type)
            .collect();
        let items: Vec<Instance> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|i| (*i).clone())
            .collect();
        let end = offset + items.len();
        let next_cursor = (end < matching.len()).then(|| end.to_string());
        Ok(Page { items, next_cursor })
    }

    async fn fetch_instance_by_id(&self, id: &str) -> StoreResult<Option<Instance>> {
        self.check_reachable()?;
        let mut state = self.state();
        state.instance_lookups += 1;
        if state.throttle_lookups {
            return Err(StoreError::Throttled {
                retry_after_ms: 1000,
            });
        }
        Ok(state.instances.iter().find(|i| i.id == id).cloned())
    }

    async fn create_definition(
        &self,
        input: &DefinitionInput,
    ) -> StoreResult<MutationOutcome<Definition>> {
        self.check_reachable()?;
        let mut state = self.state();
        state.mutations.push(MutationRecord::CreateDefinition {
            definition_type: input.definition_type.clone(),
        });

        if state.definition_for_type(&input.definition_type).is_some() {
            return Ok(MutationOutcome::rejected(vec![
                UserError::new(&["definition", "type"], "Type has already been taken")
                    .with_code("TAKEN"),
            ]));
        }
        let fields: Vec<_> = input.field_definitions.iter().collect();
        let errors = state.check_definition_references(&fields);
        if !errors.is_empty() {
            return Ok(MutationOutcome::rejected(errors));
        }

        let id = state.allocate_id(&self.name, "MetaobjectDefinition");
        let definition = Definition {
            id,
            definition_type: input.definition_type.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            field_definitions: input
                .field_definitions
                .iter()
                .map(FieldDefinitionInput::to_field_definition)
                .collect(),
            capabilities: input.capabilities.clone(),
            access: input.access.clone(),
        };
        state.definitions.push(definition.clone());
        Ok(MutationOutcome::ok(definition))
    }

    async fn update_definition(
        &self,
        id: &str,
        input: &DefinitionUpdate,
    ) -> StoreResult<MutationOutcome<Definition>> {
        self.check_reachable()?;
        let mut state = self.state();
        state.mutations.push(MutationRecord::UpdateDefinition { id: id.to_string() });

        let Some(position) = state.definitions.iter().position(|d| d.id == id) else {
            return Ok(MutationOutcome::rejected(vec![UserError::new(
                &["id"],
                "Definition does not exist",
            )
            .with_code("NOT_FOUND")]));
        };

        let inputs: Vec<_> = input
            .field_definitions
            .iter()
            .map(|op| match op {
                FieldDefinitionOperation::Create(f) | FieldDefinitionOperation::Update(f) => f,
            })
            .collect();
        let mut errors = state.check_definition_references(&inputs);

        let mut definition = state.definitions[position].clone();
        for (index, op) in input.field_definitions.iter().enumerate() {
            let idx = index.to_string();
            match op {
                FieldDefinitionOperation::Create(f) => {
                    if definition.field(&f.key).is_some() {
                        errors.push(
                            UserError::new(
                                &["fieldDefinitions", idx.as_str(), "key"],
                                "Key is in use",
                            )
                            .with_code("TAKEN"),
                        );
                        continue;
                    }
                    definition.field_definitions.push(f.to_field_definition());
                }
                FieldDefinitionOperation::Update(f) => {
                    match definition
                        .field_definitions
                        .iter_mut()
                        .find(|existing| existing.key == f.key)
                    {
                        Some(existing) => {
                            existing.name = f.name.clone();
                            existing.description = f.description.clone();
                            existing.required = f.required;
                            existing.validations = f.validations.clone();
                        }
                        None => errors.push(
                            UserError::new(
                                &["fieldDefinitions", idx.as_str(), "key"],
                                "Key does not exist",
                            )
                            .with_code("NOT_FOUND"),
                        ),
                    }
                }
            }
        }
        if !errors.is_empty() {
            return Ok(MutationOutcome::rejected(errors));
        }

        definition.name = input.name.clone();
        definition.description = input.description.clone();
        if !input.capabilities.is_null() {
            definition.capabilities = input.capabilities.clone();
        }
        state.definitions[position] = definition.clone();
        Ok(MutationOutcome::ok(definition))
    }

    async fn create_instance(
        &self,
        input: &InstanceInput,
    ) -> StoreResult<MutationOutcome<Instance>> {
        self.check_reachable()?;
        let mut state = self.state();
        state.mutations.push(MutationRecord::CreateInstance {
            instance_type: input.instance_type.clone(),
            handle: input.handle.clone(),
        });

        if let Some(message) = input
            .handle
            .as_ref()
            .and_then(|h| state.rejected_handles.get(h))
        {
            return Ok(MutationOutcome::rejected(vec![UserError::new(
                &["handle"],
                message.clone(),
            )]));
        }
        let Some(definition) = state.definition_for_type(&input.instance_type).cloned() else {
            return Ok(MutationOutcome::rejected(vec![UserError::new(
                &["type"],
                format!("No definition exists for type '{}'", input.instance_type),
            )
            .with_code("RECORD_NOT_FOUND")]));
        };

        let mut errors = state.check_fields(&definition, &input.fields);
        for required in definition.required_fields() {
            if !input.fields.iter().any(|f| f.key == required.key) {
                errors.push(
                    UserError::new(&["fields"], format!("Field '{}' is required", required.key))
                        .with_code("OBJECT_FIELD_REQUIRED"),
                );
            }
        }
        if let Some(handle) = input.handle.as_deref().filter(|h| !h.is_empty()) {
            if state.handle_taken(&input.instance_type, handle) {
                errors.push(
                    UserError::new(&["handle"], "Handle has already been taken").with_code("TAKEN"),
                );
            }
        }
        if !errors.is_empty() {
            return Ok(MutationOutcome::rejected(errors));
        }

        let id = state.allocate_id(&self.name, "Metaobject");
        let handle = match input.handle.as_deref().filter(|h| !h.is_empty()) {
            Some(h) => h.to_string(),
            None => format!("{}-{}", input.instance_type, state.next_id),
        };
        let instance = Instance {
            id,
            handle: Some(handle),
            instance_type: input.instance_type.clone(),
            fields: input
                .fields
                .iter()
                .map(|f| Field::new(f.key.clone(), f.value.clone()))
                .collect(),
            capabilities: input.capabilities.clone().unwrap_or_default(),
        };
        state.instances.push(instance.clone());
        Ok(MutationOutcome::ok(instance))
    }

    async fn update_instance(
        &self,
        id: &str,
        fields: &[FieldInput],
    ) -> StoreResult<MutationOutcome<Instance>> {
        self.check_reachable()?;
        let mut state = self.state();
        state.mutations.push(MutationRecord::UpdateInstance { id: id.to_string() });

        let Some(position) = state.instances.iter().position(|i| i.id == id) else {
            return Ok(MutationOutcome::rejected(vec![UserError::new(
                &["id"],
                "Record does not exist",
            )
            .with_code("RECORD_NOT_FOUND")]));
        };
        let existing = state.instances[position].clone();
        if let Some(message) = existing
            .handle()
            .and_then(|h| state.rejected_handles.get(h))
        {
            return Ok(MutationOutcome::rejected(vec![UserError::new(
                &["handle"],
                message.clone(),
            )]));
        }
        let Some(definition) = state.definition_for_type(&existing.instance_type).cloned() else {
            return Ok(MutationOutcome::rejected(vec![UserError::new(
                &["type"],
                "Definition no longer exists",
            )]));
        };
        let errors = state.check_fields(&definition, fields);
        if !errors.is_empty() {
            return Ok(MutationOutcome::rejected(errors));
        }

        let mut updated = existing;
        for input in fields {
            match updated.fields.iter_mut().find(|f| f.key == input.key) {
                Some(field) => field.value = Some(input.value.clone()),
                None => updated
                    .fields
                    .push(Field::new(input.key.clone(), input.value.clone())),
            }
        }
        state.instances[position] = updated.clone();
        Ok(MutationOutcome::ok(updated))
    }
}
