//! The per-run control loop.
//!
//! A run moves `Idle → DefinitionPhase → DataPhase → Done`. Only setup
//! problems (invalid configuration, unreachable store) end it in `Failed`;
//! everything after setup is recovered per definition or per record and
//! shows up in the [`SyncResult`] counters.

use crate::catalog::DefinitionCatalog;
use crate::config::RunConfig;
use crate::diagnostics::{describe_definition_error, describe_user_error, operation_keys};
use crate::error::{EngineError, EngineResult};
use crate::executor::{Executor, LiveExecutor, SimulatingExecutor};
use crate::field_policy::FieldTypePolicy;
use crate::matcher::{EntityMatcher, HandleIndex};
use crate::pages::collect_instances;
use crate::plan::SyncPlan;
use crate::resolver::ReferenceResolver;
use crate::result::{Outcome, SyncResult};
use metasync_store::{DataStore, MutationOutcome, StoreError};
use metasync_types::{
    Definition, DefinitionInput, DefinitionUpdate, FieldDefinitionInput,
    FieldDefinitionOperation, FieldInput, Instance, InstanceInput,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    DefinitionPhase,
    DataPhase,
    Done,
    Failed,
}

/// Syncs definitions and records from a source store to a target store.
pub struct SyncOrchestrator {
    source: Arc<dyn DataStore>,
    target: Arc<dyn DataStore>,
    config: RunConfig,
    policy: FieldTypePolicy,
    matcher: EntityMatcher,
    executor: Box<dyn Executor>,
    state: RunState,
    /// Numbers store calls within the run, for error context.
    sequence: AtomicU64,
}

impl SyncOrchestrator {
    /// Creates an orchestrator. `config.live` picks the executor.
    pub fn new(source: Arc<dyn DataStore>, target: Arc<dyn DataStore>, config: RunConfig) -> Self {
        let executor: Box<dyn Executor> = if config.live {
            Box::new(LiveExecutor::new(Arc::clone(&target)))
        } else {
            Box::new(SimulatingExecutor::new(target.name()))
        };
        Self {
            matcher: EntityMatcher::new(config.normalize_handles),
            policy: FieldTypePolicy::new(),
            executor,
            state: RunState::Idle,
            sequence: AtomicU64::new(0),
            source,
            target,
            config,
        }
    }

    /// Replaces the field policy (e.g. to pin the clock for date defaults).
    #[must_use]
    pub fn with_policy(mut self, policy: FieldTypePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the executor chosen from `config.live`.
    #[must_use]
    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn is_live(&self) -> bool {
        self.executor.is_live()
    }

    /// Executes one run.
    ///
    /// Returns an error only for setup failures; nothing has been written
    /// to the target in that case.
    pub async fn run(&mut self) -> EngineResult<SyncResult> {
        if let Err(e) = self.setup().await {
            error!("{}", e);
            self.state = RunState::Failed;
            return Err(e);
        }
        info!(
            "syncing {} -> {} ({})",
            self.source.name(),
            self.target.name(),
            if self.is_live() { "live" } else { "dry run" }
        );

        let mut source_catalog = DefinitionCatalog::load(&*self.source).await;
        let mut target_catalog = DefinitionCatalog::load(&*self.target).await;
        let plan = SyncPlan::build(&self.config.types, &source_catalog);
        if plan.is_empty() {
            warn!("no types to sync");
        }
        let mut result = SyncResult::default();

        if self.config.mode.includes_definitions() {
            self.state = RunState::DefinitionPhase;
            self.sync_definitions(&plan, &source_catalog, &mut target_catalog, &mut result)
                .await;
        }

        if self.config.mode.includes_data() {
            self.state = RunState::DataPhase;
            let mut resolver = ReferenceResolver::new(
                Arc::clone(&self.source),
                Arc::clone(&self.target),
                self.matcher,
                self.policy.clone(),
            );
            resolver.discover(&mut source_catalog, &plan.types()).await;
            resolver.build_indexes(&target_catalog).await;

            for task in plan.tasks() {
                self.sync_type(
                    &task.definition_type,
                    &source_catalog,
                    &target_catalog,
                    &mut resolver,
                    &mut result,
                )
                .await;
            }
            result.reference_stats = resolver.into_stats();
        }

        self.state = RunState::Done;
        let records = &result.records;
        info!(
            "done: {} created, {} updated, {} skipped, {} failed",
            records.created, records.updated, records.skipped, records.failed
        );
        Ok(result)
    }

    async fn setup(&self) -> EngineResult<()> {
        self.config.validate()?;
        for store in [&self.source, &self.target] {
            store.ping().await.map_err(|e| {
                EngineError::Setup(format!("{} is unreachable: {}", store.name(), e))
            })?;
        }
        Ok(())
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn store_error(
        &self,
        operation: &'static str,
        sequence: u64,
        store: &dyn DataStore,
        source: StoreError,
    ) -> EngineError {
        EngineError::Store {
            operation,
            sequence,
            store: store.name().to_string(),
            source,
        }
    }

    // ── Definition phase ─────────────────────────────────────────

    async fn sync_definitions(
        &self,
        plan: &SyncPlan,
        source_catalog: &DefinitionCatalog,
        target_catalog: &mut DefinitionCatalog,
        result: &mut SyncResult,
    ) {
        let mut processed = 0;
        for task in plan.tasks() {
            let definition_type = &task.definition_type;
            if self.config.limit.is_some_and(|limit| processed >= limit) {
                info!("definition limit reached, skipping {}", definition_type);
                result.record_definition(Outcome::Skipped);
                continue;
            }
            let Some(source_definition) = source_catalog.by_type(definition_type) else {
                warn!("{}: no definition for {}", self.source.name(), definition_type);
                result.record_definition(Outcome::Skipped);
                continue;
            };
            processed += 1;
            let outcome = self
                .sync_definition(source_definition, source_catalog, target_catalog)
                .await;
            result.record_definition(outcome);
        }
    }

    #[instrument(skip_all, fields(definition_type = %source_definition.definition_type))]
    async fn sync_definition(
        &self,
        source_definition: &Definition,
        source_catalog: &DefinitionCatalog,
        target_catalog: &mut DefinitionCatalog,
    ) -> Outcome {
        let fields: Vec<FieldDefinitionInput> = source_definition
            .field_definitions
            .iter()
            .map(|field| {
                let validations = self
                    .policy
                    .build_create_validations(field, source_catalog, target_catalog);
                FieldDefinitionInput::from_field(field, validations)
            })
            .collect();

        let existing = target_catalog
            .by_type(&source_definition.definition_type)
            .cloned();
        match existing {
            None => {
                let input = DefinitionInput::from_definition(source_definition, fields);
                let keys: Vec<&str> = input
                    .field_definitions
                    .iter()
                    .map(|f| f.key.as_str())
                    .collect();
                let sequence = self.next_sequence();
                debug!("create_definition #{}", sequence);
                match self.executor.create_definition(&input).await {
                    Ok(outcome) => {
                        accept_definition(outcome, Outcome::Created, &keys, target_catalog)
                    }
                    Err(e) => {
                        let e = self.store_error("create_definition", sequence, &*self.target, e);
                        error!("{}", e);
                        Outcome::Failed
                    }
                }
            }
            Some(existing) => {
                let operations = fields
                    .into_iter()
                    .map(|field| {
                        if existing.field(&field.key).is_some() {
                            FieldDefinitionOperation::Update(field)
                        } else {
                            FieldDefinitionOperation::Create(field)
                        }
                    })
                    .collect();
                let update = DefinitionUpdate {
                    name: source_definition.name.clone(),
                    description: source_definition.description.clone(),
                    field_definitions: operations,
                    capabilities: source_definition.capabilities.clone(),
                };
                let keys = operation_keys(&update.field_definitions);
                let sequence = self.next_sequence();
                debug!("update_definition #{}", sequence);
                match self.executor.update_definition(&existing, &update).await {
                    Ok(outcome) => {
                        accept_definition(outcome, Outcome::Updated, &keys, target_catalog)
                    }
                    Err(e) => {
                        let e = self.store_error("update_definition", sequence, &*self.target, e);
                        error!("{}", e);
                        Outcome::Failed
                    }
                }
            }
        }
    }

    // ── Data phase ───────────────────────────────────────────────

    #[instrument(skip_all, fields(definition_type = %definition_type))]
    async fn sync_type(
        &self,
        definition_type: &str,
        source_catalog: &DefinitionCatalog,
        target_catalog: &DefinitionCatalog,
        resolver: &mut ReferenceResolver,
        result: &mut SyncResult,
    ) {
        let Some(source_definition) = source_catalog.by_type(definition_type) else {
            warn!("{}: no definition for {}", self.source.name(), definition_type);
            return;
        };

        // A handle filter can match anywhere in the listing, so it disables
        // the early stop.
        let cap = match self.config.single_handle {
            Some(_) => None,
            None => self.config.limit,
        };
        let sequence = self.next_sequence();
        let mut records = match collect_instances(&*self.source, definition_type, cap).await {
            Ok(records) => records,
            Err(e) => {
                let e = self.store_error("fetch_instances", sequence, &*self.source, e);
                error!("{}", e);
                result.record_failed_type(definition_type);
                return;
            }
        };
        if let Some(handle) = &self.config.single_handle {
            records.retain(|r| r.handle().is_some_and(|h| self.matcher.same_handle(h, handle)));
            if records.is_empty() {
                info!("no {} record with handle '{}'", definition_type, handle);
            }
        }
        if let Some(limit) = self.config.limit {
            records.truncate(limit);
        }
        info!("{} records to sync", records.len());

        let Some(target_definition) = target_catalog.by_type(definition_type) else {
            warn!(
                "{}: no definition for {}, skipping {} records",
                self.target.name(),
                definition_type,
                records.len()
            );
            for _ in &records {
                result.record(definition_type, Outcome::Skipped);
            }
            return;
        };

        let sequence = self.next_sequence();
        let existing = match collect_instances(&*self.target, definition_type, None).await {
            Ok(existing) => existing,
            Err(e) => {
                let e = self.store_error("fetch_instances", sequence, &*self.target, e);
                warn!("{}; matching against no records", e);
                Vec::new()
            }
        };
        let mut index = self.matcher.build_index(existing);
        debug!("{} target records indexed", index.len());

        for record in &records {
            let outcome = self
                .sync_record(
                    record,
                    source_definition,
                    target_definition,
                    target_catalog,
                    resolver,
                    &mut index,
                )
                .await;
            result.record(definition_type, outcome);
        }

        if let Some(quota) = self.target.quota() {
            debug!(
                "{}: {:.0}% of request quota available",
                self.target.name(),
                quota.remaining_ratio() * 100.0
            );
        }
    }

    #[instrument(skip_all, fields(handle = record.handle().unwrap_or("-")))]
    async fn sync_record(
        &self,
        record: &Instance,
        source_definition: &Definition,
        target_definition: &Definition,
        target_catalog: &DefinitionCatalog,
        resolver: &mut ReferenceResolver,
        index: &mut HandleIndex,
    ) -> Outcome {
        let mut fields = record.fields.clone();
        for key in self
            .policy
            .fill_required_defaults(target_definition, &mut fields)
        {
            debug!("required field '{}' is empty, using default", key);
        }
        let sequence = self.next_sequence();
        if let Err(e) = resolver
            .translate_fields(target_catalog, source_definition, &mut fields)
            .await
        {
            let e = self.store_error("fetch_instance_by_id", sequence, &*self.source, e);
            error!("{}; record left unchanged", e);
            return Outcome::Failed;
        }

        let inputs: Vec<FieldInput> = fields
            .into_iter()
            .filter(|f| {
                let known = target_definition.field(&f.key).is_some();
                if !known {
                    debug!("field '{}' is not in the target definition, dropped", f.key);
                }
                known
            })
            .filter_map(|f| f.value.map(|value| FieldInput::new(f.key, value)))
            .collect();

        if let Some(existing) = self.matcher.find(record, index).cloned() {
            let sequence = self.next_sequence();
            debug!("update_instance #{}", sequence);
            return match self.executor.update_instance(&existing, &inputs).await {
                Ok(outcome) => match accept_instance(outcome, &inputs) {
                    Some(_) => Outcome::Updated,
                    None => Outcome::Failed,
                },
                Err(e) => {
                    let e = self.store_error("update_instance", sequence, &*self.target, e);
                    error!("{}", e);
                    Outcome::Failed
                }
            };
        }

        let input = InstanceInput {
            instance_type: target_definition.definition_type.clone(),
            handle: record.handle().map(str::to_string),
            fields: inputs,
            capabilities: (!record.capabilities.is_null()).then(|| record.capabilities.clone()),
        };
        let sequence = self.next_sequence();
        debug!("create_instance #{}", sequence);
        match self.executor.create_instance(&input).await {
            Ok(outcome) => match accept_instance(outcome, &input.fields) {
                Some(created) => {
                    resolver.register(&input.instance_type, &created);
                    self.matcher.add(index, created);
                    Outcome::Created
                }
                None => Outcome::Failed,
            },
            Err(e) => {
                let e = self.store_error("create_instance", sequence, &*self.target, e);
                error!("{}", e);
                Outcome::Failed
            }
        }
    }
}

fn accept_definition(
    outcome: MutationOutcome<Definition>,
    success: Outcome,
    keys: &[&str],
    target_catalog: &mut DefinitionCatalog,
) -> Outcome {
    if !outcome.errors.is_empty() {
        for e in &outcome.errors {
            warn!("definition rejected: {}", describe_definition_error(e, keys));
        }
        return Outcome::Failed;
    }
    match outcome.record {
        Some(definition) => {
            info!(
                "definition {} {}",
                definition.definition_type,
                if success == Outcome::Created { "created" } else { "updated" }
            );
            target_catalog.insert(definition);
            success
        }
        None => {
            warn!("store returned no definition");
            Outcome::Failed
        }
    }
}

fn accept_instance(outcome: MutationOutcome<Instance>, fields: &[FieldInput]) -> Option<Instance> {
    if !outcome.errors.is_empty() {
        for e in &outcome.errors {
            warn!("record rejected: {}", describe_user_error(e, fields));
        }
        return None;
    }
    if outcome.record.is_none() {
        warn!("store returned no record");
    }
    outcome.record
}
