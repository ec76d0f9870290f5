//! Mutation execution strategies.
//!
//! The orchestrator hands every mutation to an [`Executor`] and never checks
//! whether the run is live. [`LiveExecutor`] forwards to the target store;
//! [`SimulatingExecutor`] logs the mutation and returns a synthesized record
//! with a placeholder id, so a rehearsal produces the same counters as a live
//! run.

use async_trait::async_trait;
use metasync_store::{DataStore, MutationOutcome, StoreResult};
use metasync_types::{
    Definition, DefinitionInput, DefinitionUpdate, Field, FieldDefinitionInput,
    FieldDefinitionOperation, FieldInput, Instance, InstanceInput,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Applies (or pretends to apply) mutations to the target store.
#[async_trait]
pub trait Executor: Send + Sync {
    /// True when mutations reach the target store.
    fn is_live(&self) -> bool;

    async fn create_definition(
        &self,
        input: &DefinitionInput,
    ) -> StoreResult<MutationOutcome<Definition>>;

    async fn update_definition(
        &self,
        existing: &Definition,
        update: &DefinitionUpdate,
    ) -> StoreResult<MutationOutcome<Definition>>;

    async fn create_instance(&self, input: &InstanceInput)
        -> StoreResult<MutationOutcome<Instance>>;

    async fn update_instance(
        &self,
        existing: &Instance,
        fields: &[FieldInput],
    ) -> StoreResult<MutationOutcome<Instance>>;
}

/// Forwards every mutation to the target store.
pub struct LiveExecutor {
    target: Arc<dyn DataStore>,
}

impl LiveExecutor {
    pub fn new(target: Arc<dyn DataStore>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl Executor for LiveExecutor {
    fn is_live(&self) -> bool {
        true
    }

    async fn create_definition(
        &self,
        input: &DefinitionInput,
    ) -> StoreResult<MutationOutcome<Definition>> {
        self.target.create_definition(input).await
    }

    async fn update_definition(
        &self,
        existing: &Definition,
        update: &DefinitionUpdate,
    ) -> StoreResult<MutationOutcome<Definition>> {
        self.target.update_definition(&existing.id, update).await
    }

    async fn create_instance(
        &self,
        input: &InstanceInput,
    ) -> StoreResult<MutationOutcome<Instance>> {
        self.target.create_instance(input).await
    }

    async fn update_instance(
        &self,
        existing: &Instance,
        fields: &[FieldInput],
    ) -> StoreResult<MutationOutcome<Instance>> {
        self.target.update_instance(&existing.id, fields).await
    }
}

/// Logs mutations and returns what the target would plausibly hold after
/// them. Never touches a store.
#[derive(Debug, Clone)]
pub struct SimulatingExecutor {
    store_name: String,
}

impl SimulatingExecutor {
    /// `store_name` labels the placeholder ids.
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
        }
    }

    fn placeholder_id(&self, kind: &str) -> String {
        format!("dry-run://{}/{}/{}", self.store_name, kind, Uuid::new_v4())
    }
}

#[async_trait]
impl Executor for SimulatingExecutor {
    fn is_live(&self) -> bool {
        false
    }

    async fn create_definition(
        &self,
        input: &DefinitionInput,
    ) -> StoreResult<MutationOutcome<Definition>> {
        info!(
            "[dry run] would create definition {} with {} fields",
            input.definition_type,
            input.field_definitions.len()
        );
        Ok(MutationOutcome::ok(Definition {
            id: self.placeholder_id("MetaobjectDefinition"),
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
        }))
    }

    async fn update_definition(
        &self,
        existing: &Definition,
        update: &DefinitionUpdate,
    ) -> StoreResult<MutationOutcome<Definition>> {
        let mut definition = existing.clone();
        let mut created = 0;
        for operation in &update.field_definitions {
            match operation {
                FieldDefinitionOperation::Create(input) => {
                    created += 1;
                    definition.field_definitions.push(input.to_field_definition());
                }
                FieldDefinitionOperation::Update(input) => {
                    if let Some(field) = definition
                        .field_definitions
                        .iter_mut()
                        .find(|f| f.key == input.key)
                    {
                        *field = input.to_field_definition();
                    }
                }
            }
        }
        info!(
            "[dry run] would update definition {} ({} new fields, {} updated)",
            existing.definition_type,
            created,
            update.field_definitions.len() - created
        );
        definition.name = update.name.clone();
        definition.description = update.description.clone();
        Ok(MutationOutcome::ok(definition))
    }

    async fn create_instance(
        &self,
        input: &InstanceInput,
    ) -> StoreResult<MutationOutcome<Instance>> {
        let id = self.placeholder_id("Metaobject");
        let handle = match input.handle.as_deref().filter(|h| !h.is_empty()) {
            Some(handle) => handle.to_string(),
            None => format!("{}-{}", input.instance_type, &id[id.len() - 8..]),
        };
        info!(
            "[dry run] would create {} '{}' with {} fields",
            input.instance_type,
            handle,
            input.fields.len()
        );
        Ok(MutationOutcome::ok(Instance {
            id,
            handle: Some(handle),
            instance_type: input.instance_type.clone(),
            fields: input
                .fields
                .iter()
                .map(|f| Field::new(f.key.clone(), f.value.clone()))
                .collect(),
            capabilities: input.capabilities.clone().unwrap_or_default(),
        }))
    }

    async fn update_instance(
        &self,
        existing: &Instance,
        fields: &[FieldInput],
    ) -> StoreResult<MutationOutcome<Instance>> {
        info!(
            "[dry run] would update {} '{}' ({} fields)",
            existing.instance_type,
            existing.handle().unwrap_or_default(),
            fields.len()
        );
        let mut updated = existing.clone();
        for input in fields {
            match updated.fields.iter_mut().find(|f| f.key == input.key) {
                Some(field) => field.value = Some(input.value.clone()),
                None => updated
                    .fields
                    .push(Field::new(input.key.clone(), input.value.clone())),
            }
        }
        Ok(MutationOutcome::ok(updated))
    }
}
