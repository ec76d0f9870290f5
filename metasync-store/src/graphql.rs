//! GraphQL admin API adapter.
//!
//! Definitions and records map onto the platform's metaobject definitions
//! and metaobjects. Each request carries the access token header; the cost
//! extension of every response is kept as the latest [`QuotaStatus`].

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::port::{DataStore, MutationOutcome, Page, QuotaStatus, DEFINITION_PAGE_CAP};
use async_trait::async_trait;
use metasync_types::{
    Definition, DefinitionInput, DefinitionUpdate, FieldDefinition, FieldDefinitionInput,
    FieldDefinitionOperation, FieldInput, Instance, InstanceInput, UserError, Validation,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

const DEFINITION_FRAGMENT: &str = "
fragment DefinitionFields on MetaobjectDefinition {
  id
  type
  name
  description
  fieldDefinitions {
    key
    name
    description
    required
    type { name }
    validations { name value }
  }
  capabilities {
    publishable { enabled }
    translatable { enabled }
  }
  access { admin storefront }
}";

const INSTANCE_FRAGMENT: &str = "
fragment InstanceFields on Metaobject {
  id
  handle
  type
  fields { key value type }
  capabilities { publishable { status } }
}";

const PING_QUERY: &str = "query Ping { shop { name } }";

const DEFINITIONS_QUERY: &str = "
query Definitions($first: Int!) {
  metaobjectDefinitions(first: $first) { nodes { ...DefinitionFields } }
}";

const DEFINITION_QUERY: &str = "
query Definition($id: ID!) {
  metaobjectDefinition(id: $id) { ...DefinitionFields }
}";

const INSTANCES_QUERY: &str = "
query Instances($type: String!, $first: Int!, $after: String) {
  metaobjects(type: $type, first: $first, after: $after) {
    nodes { ...InstanceFields }
    pageInfo { hasNextPage endCursor }
  }
}";

const INSTANCE_QUERY: &str = "
query Instance($id: ID!) {
  metaobject(id: $id) { ...InstanceFields }
}";

const CREATE_DEFINITION_MUTATION: &str = "
mutation CreateDefinition($definition: MetaobjectDefinitionCreateInput!) {
  metaobjectDefinitionCreate(definition: $definition) {
    metaobjectDefinition { ...DefinitionFields }
    userErrors { field message code }
  }
}";

const UPDATE_DEFINITION_MUTATION: &str = "
mutation UpdateDefinition($id: ID!, $definition: MetaobjectDefinitionUpdateInput!) {
  metaobjectDefinitionUpdate(id: $id, definition: $definition) {
    metaobjectDefinition { ...DefinitionFields }
    userErrors { field message code }
  }
}";

const CREATE_INSTANCE_MUTATION: &str = "
mutation CreateInstance($metaobject: MetaobjectCreateInput!) {
  metaobjectCreate(metaobject: $metaobject) {
    metaobject { ...InstanceFields }
    userErrors { field message code }
  }
}";

const UPDATE_INSTANCE_MUTATION: &str = "
mutation UpdateInstance($id: ID!, $metaobject: MetaobjectUpdateInput!) {
  metaobjectUpdate(id: $id, metaobject: $metaobject) {
    metaobject { ...InstanceFields }
    userErrors { field message code }
  }
}";

// ── Wire structures ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
    extensions: Option<ResponseExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    extensions: Option<ErrorExtensions>,
}

impl GraphQlError {
    fn is_throttled(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|code| code == "THROTTLED")
    }
}

#[derive(Debug, Deserialize)]
struct ErrorExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseExtensions {
    cost: Option<QueryCost>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryCost {
    requested_query_cost: Option<f64>,
    throttle_status: Option<QuotaStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    nodes: Vec<T>,
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionNode {
    id: String,
    #[serde(rename = "type")]
    definition_type: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    field_definitions: Vec<FieldDefinitionNode>,
    #[serde(default)]
    capabilities: Value,
    #[serde(default)]
    access: Value,
}

#[derive(Debug, Deserialize)]
struct FieldDefinitionNode {
    key: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(rename = "type")]
    field_type: TypeNode,
    #[serde(default)]
    validations: Vec<Validation>,
}

#[derive(Debug, Deserialize)]
struct TypeNode {
    name: String,
}

impl From<DefinitionNode> for Definition {
    fn from(node: DefinitionNode) -> Self {
        Definition {
            id: node.id,
            definition_type: node.definition_type,
            name: node.name,
            description: node.description,
            field_definitions: node
                .field_definitions
                .into_iter()
                .map(|f| FieldDefinition {
                    key: f.key,
                    name: f.name,
                    description: f.description,
                    required: f.required,
                    field_type: f.field_type.name,
                    validations: f.validations,
                })
                .collect(),
            capabilities: node.capabilities,
            access: node.access,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserErrorNode {
    field: Option<Vec<String>>,
    message: String,
    code: Option<String>,
}

impl From<UserErrorNode> for UserError {
    fn from(node: UserErrorNode) -> Self {
        UserError {
            field: node.field.unwrap_or_default(),
            message: node.message,
            code: node.code,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionsData {
    metaobject_definitions: Connection<DefinitionNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionData {
    metaobject_definition: Option<DefinitionNode>,
}

#[derive(Debug, Deserialize)]
struct InstancesData {
    metaobjects: Connection<Instance>,
}

#[derive(Debug, Deserialize)]
struct InstanceData {
    metaobject: Option<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionPayload {
    metaobject_definition: Option<DefinitionNode>,
    #[serde(default)]
    user_errors: Vec<UserErrorNode>,
}

impl DefinitionPayload {
    fn into_outcome(self) -> MutationOutcome<Definition> {
        MutationOutcome {
            record: self.metaobject_definition.map(Definition::from),
            errors: self.user_errors.into_iter().map(UserError::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstancePayload {
    metaobject: Option<Instance>,
    #[serde(default)]
    user_errors: Vec<UserErrorNode>,
}

impl InstancePayload {
    fn into_outcome(self) -> MutationOutcome<Instance> {
        MutationOutcome {
            record: self.metaobject,
            errors: self.user_errors.into_iter().map(UserError::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDefinitionData {
    metaobject_definition_create: DefinitionPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDefinitionData {
    metaobject_definition_update: DefinitionPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstanceData {
    metaobject_create: InstancePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInstanceData {
    metaobject_update: InstancePayload,
}

// ── Input encoding ───────────────────────────────────────────────

fn insert_non_null(object: &mut Map<String, Value>, key: &str, value: &Value) {
    if !value.is_null() {
        object.insert(key.to_string(), value.clone());
    }
}

fn field_definition_create_input(field: &FieldDefinitionInput) -> Value {
    let mut object = Map::new();
    object.insert("key".into(), json!(field.key));
    object.insert("name".into(), json!(field.name));
    if let Some(description) = &field.description {
        object.insert("description".into(), json!(description));
    }
    object.insert("type".into(), json!(field.field_type));
    object.insert("required".into(), json!(field.required));
    object.insert("validations".into(), json!(field.validations));
    Value::Object(object)
}

/// The update form cannot change a field's type.
fn field_definition_update_input(field: &FieldDefinitionInput) -> Value {
    let mut object = Map::new();
    object.insert("key".into(), json!(field.key));
    object.insert("name".into(), json!(field.name));
    if let Some(description) = &field.description {
        object.insert("description".into(), json!(description));
    }
    object.insert("required".into(), json!(field.required));
    object.insert("validations".into(), json!(field.validations));
    Value::Object(object)
}

pub(crate) fn definition_create_variables(input: &DefinitionInput) -> Value {
    let mut definition = Map::new();
    definition.insert("type".into(), json!(input.definition_type));
    definition.insert("name".into(), json!(input.name));
    if let Some(description) = &input.description {
        definition.insert("description".into(), json!(description));
    }
    definition.insert(
        "fieldDefinitions".into(),
        Value::Array(
            input
                .field_definitions
                .iter()
                .map(field_definition_create_input)
                .collect(),
        ),
    );
    insert_non_null(&mut definition, "capabilities", &input.capabilities);
    insert_non_null(&mut definition, "access", &input.access);
    json!({ "definition": definition })
}

pub(crate) fn definition_update_variables(id: &str, input: &DefinitionUpdate) -> Value {
    let operations: Vec<Value> = input
        .field_definitions
        .iter()
        .map(|op| match op {
            FieldDefinitionOperation::Create(field) => {
                json!({ "create": field_definition_create_input(field) })
            }
            FieldDefinitionOperation::Update(field) => {
                json!({ "update": field_definition_update_input(field) })
            }
        })
        .collect();

    let mut definition = Map::new();
    definition.insert("name".into(), json!(input.name));
    if let Some(description) = &input.description {
        definition.insert("description".into(), json!(description));
    }
    definition.insert("fieldDefinitions".into(), Value::Array(operations));
    insert_non_null(&mut definition, "capabilities", &input.capabilities);
    json!({ "id": id, "definition": definition })
}

pub(crate) fn instance_create_variables(input: &InstanceInput) -> Value {
    let mut metaobject = Map::new();
    metaobject.insert("type".into(), json!(input.instance_type));
    if let Some(handle) = &input.handle {
        metaobject.insert("handle".into(), json!(handle));
    }
    metaobject.insert("fields".into(), json!(input.fields));
    if let Some(capabilities) = &input.capabilities {
        insert_non_null(&mut metaobject, "capabilities", capabilities);
    }
    json!({ "metaobject": metaobject })
}

pub(crate) fn instance_update_variables(id: &str, fields: &[FieldInput]) -> Value {
    json!({ "id": id, "metaobject": { "fields": fields } })
}

// ── Store ────────────────────────────────────────────────────────

/// [`DataStore`] over the platform's GraphQL admin API.
pub struct GraphqlStore {
    config: StoreConfig,
    client: Client,
    quota: Mutex<Option<QuotaStatus>>,
}

impl GraphqlStore {
    /// Creates a new GraphQL store client.
    pub fn new(config: StoreConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self {
            config,
            client,
            quota: Mutex::new(None),
        }
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn record_quota(&self, status: QuotaStatus) {
        if let Ok(mut guard) = self.quota.lock() {
            *guard = Some(status);
        }
    }

    /// Estimates how long until `requested` cost points are available again.
    fn retry_after_ms(&self, requested: Option<f64>) -> u64 {
        let Some(status) = self.quota() else {
            return DEFAULT_RETRY_AFTER_MS;
        };
        let requested = requested.unwrap_or(status.maximum_available / 10.0);
        if status.restore_rate <= 0.0 {
            return DEFAULT_RETRY_AFTER_MS;
        }
        let deficit = (requested - status.currently_available).max(0.0);
        ((deficit / status.restore_rate) * 1000.0).ceil() as u64
    }

    /// Sends one GraphQL document and decodes its `data`.
    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        document: String,
        variables: Value,
    ) -> StoreResult<T> {
        debug!("{}: {}", self.config.name, operation);

        let response = self
            .client
            .post(self.config.endpoint())
            .header(ACCESS_TOKEN_HEADER, &self.config.access_token)
            .json(&json!({ "query": document, "variables": variables }))
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("{operation} failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .map(|secs| (secs * 1000.0) as u64)
                .unwrap_or(DEFAULT_RETRY_AFTER_MS);
            return Err(StoreError::Throttled { retry_after_ms });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("{operation}: {e}")))?;

        let mut requested_cost = None;
        if let Some(cost) = body.extensions.and_then(|e| e.cost) {
            requested_cost = cost.requested_query_cost;
            if let Some(throttle) = cost.throttle_status {
                self.record_quota(throttle);
            }
        }

        if !body.errors.is_empty() {
            if body.errors.iter().any(GraphQlError::is_throttled) {
                let retry_after_ms = self.retry_after_ms(requested_cost);
                warn!(
                    "{}: {} throttled, retry after {}ms",
                    self.config.name, operation, retry_after_ms
                );
                return Err(StoreError::Throttled { retry_after_ms });
            }
            return Err(StoreError::GraphQl(
                body.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        body.data
            .ok_or_else(|| StoreError::Decode(format!("{operation}: response has no data")))
    }
}

fn with_fragment(document: &str, fragment: &str) -> String {
    format!("{document}\n{fragment}")
}

#[async_trait]
impl DataStore for GraphqlStore {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn ping(&self) -> StoreResult<()> {
        self.config.validate().map_err(StoreError::Config)?;
        let _: Value = self
            .execute("ping", PING_QUERY.to_string(), json!({}))
            .await
            .map_err(|e| match e {
                StoreError::Network(msg) => StoreError::Unavailable(msg),
                other => other,
            })?;
        Ok(())
    }

    fn quota(&self) -> Option<QuotaStatus> {
        self.quota.lock().ok().and_then(|guard| guard.clone())
    }

    async fn fetch_definitions(&self) -> StoreResult<Vec<Definition>> {
        let data: DefinitionsData = self
            .execute(
                "fetch_definitions",
                with_fragment(DEFINITIONS_QUERY, DEFINITION_FRAGMENT),
                json!({ "first": DEFINITION_PAGE_CAP }),
            )
            .await?;
        Ok(data
            .metaobject_definitions
            .nodes
            .into_iter()
            .map(Definition::from)
            .collect())
    }

    async fn fetch_definition_by_id(&self, id: &str) -> StoreResult<Option<Definition>> {
        let data: DefinitionData = self
            .execute(
                "fetch_definition_by_id",
                with_fragment(DEFINITION_QUERY, DEFINITION_FRAGMENT),
                json!({ "id": id }),
            )
            .await?;
        Ok(data.metaobject_definition.map(Definition::from))
    }

    async fn fetch_instances(
        &self,
        instance_type: &str,
        cursor: Option<&str>,
    ) -> StoreResult<Page<Instance>> {
        let data: InstancesData = self
            .execute(
                "fetch_instances",
                with_fragment(INSTANCES_QUERY, INSTANCE_FRAGMENT),
                json!({
                    "type": instance_type,
                    "first": self.config.page_size,
                    "after": cursor,
                }),
            )
            .await?;

        let next_cursor = data
            .metaobjects
            .page_info
            .filter(|p| p.has_next_page)
            .and_then(|p| p.end_cursor);
        Ok(Page {
            items: data.metaobjects.nodes,
            next_cursor,
        })
    }

    async fn fetch_instance_by_id(&self, id: &str) -> StoreResult<Option<Instance>> {
        let data: InstanceData = self
            .execute(
                "fetch_instance_by_id",
                with_fragment(INSTANCE_QUERY, INSTANCE_FRAGMENT),
                json!({ "id": id }),
            )
            .await?;
        Ok(data.metaobject)
    }

    async fn create_definition(
        &self,
        input: &DefinitionInput,
    ) -> StoreResult<MutationOutcome<Definition>> {
        let data: CreateDefinitionData = self
            .execute(
                "create_definition",
                with_fragment(CREATE_DEFINITION_MUTATION, DEFINITION_FRAGMENT),
                definition_create_variables(input),
            )
            .await?;
        Ok(data.metaobject_definition_create.into_outcome())
    }

    async fn update_definition(
        &self,
        id: &str,
        input: &DefinitionUpdate,
    ) -> StoreResult<MutationOutcome<Definition>> {
        let data: UpdateDefinitionData = self
            .execute(
                "update_definition",
                with_fragment(UPDATE_DEFINITION_MUTATION, DEFINITION_FRAGMENT),
                definition_update_variables(id, input),
            )
            .await?;
        Ok(data.metaobject_definition_update.into_outcome())
    }

    async fn create_instance(
        &self,
        input: &InstanceInput,
    ) -> StoreResult<MutationOutcome<Instance>> {
        let data: CreateInstanceData = self
            .execute(
                "create_instance",
                with_fragment(CREATE_INSTANCE_MUTATION, INSTANCE_FRAGMENT),
                instance_create_variables(input),
            )
            .await?;
        Ok(data.metaobject_create.into_outcome())
    }

    async fn update_instance(
        &self,
        id: &str,
        fields: &[FieldInput],
    ) -> StoreResult<MutationOutcome<Instance>> {
        let data: UpdateInstanceData = self
            .execute(
                "update_instance",
                with_fragment(UPDATE_INSTANCE_MUTATION, INSTANCE_FRAGMENT),
                instance_update_variables(id, fields),
            )
            .await?;
        Ok(data.metaobject_update.into_outcome())
    }
}
