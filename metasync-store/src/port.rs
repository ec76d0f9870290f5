//! The capability interface the engine needs from each store.

use crate::error::StoreResult;
use async_trait::async_trait;
use metasync_types::{
    Definition, DefinitionInput, DefinitionUpdate, FieldInput, Instance, InstanceInput,
    UserError,
};
use serde::{Deserialize, Serialize};

/// Upper bound on definitions returned by one [`DataStore::fetch_definitions`] call.
pub const DEFINITION_PAGE_CAP: usize = 100;

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// What a mutating call returned: the record, validation errors, or both.
#[derive(Debug, Clone)]
pub struct MutationOutcome<T> {
    pub record: Option<T>,
    pub errors: Vec<UserError>,
}

impl<T> MutationOutcome<T> {
    pub fn ok(record: T) -> Self {
        Self {
            record: Some(record),
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<UserError>) -> Self {
        Self {
            record: None,
            errors,
        }
    }

    /// True when the store produced a record and reported no errors.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.record.is_some()
    }
}

/// Request-quota snapshot reported by a store after its latest call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub maximum_available: f64,
    pub currently_available: f64,
    pub restore_rate: f64,
}

impl QuotaStatus {
    /// Fraction of the quota still available, in `0.0..=1.0`.
    pub fn remaining_ratio(&self) -> f64 {
        if self.maximum_available <= 0.0 {
            return 0.0;
        }
        (self.currently_available / self.maximum_available).clamp(0.0, 1.0)
    }
}

/// Abstract store interface.
///
/// Definitions are always fetched broadly and filtered by the caller:
/// server-side type filters are not reliable across platform versions.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Name used in logs and error context.
    fn name(&self) -> &str;

    /// Checks that the store is reachable and the credentials are accepted.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Latest quota information, if the store reports any.
    fn quota(&self) -> Option<QuotaStatus> {
        None
    }

    /// Fetches every definition, up to [`DEFINITION_PAGE_CAP`].
    async fn fetch_definitions(&self) -> StoreResult<Vec<Definition>>;

    /// Fetches a single definition by its store-local id.
    async fn fetch_definition_by_id(&self, id: &str) -> StoreResult<Option<Definition>>;

    /// Fetches one page of records of `instance_type`.
    async fn fetch_instances(
        &self,
        instance_type: &str,
        cursor: Option<&str>,
    ) -> StoreResult<Page<Instance>>;

    /// Fetches a single record by its store-local id.
    async fn fetch_instance_by_id(&self, id: &str) -> StoreResult<Option<Instance>>;

    async fn create_definition(
        &self,
        input: &DefinitionInput,
    ) -> StoreResult<MutationOutcome<Definition>>;

    async fn update_definition(
        &self,
        id: &str,
        input: &DefinitionUpdate,
    ) -> StoreResult<MutationOutcome<Definition>>;

    async fn create_instance(&self, input: &InstanceInput)
        -> StoreResult<MutationOutcome<Instance>>;

    async fn update_instance(
        &self,
        id: &str,
        fields: &[FieldInput],
    ) -> StoreResult<MutationOutcome<Instance>>;
}
