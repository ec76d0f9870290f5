//! Schema types: a [`Definition`] describes one record type.

use serde::{Deserialize, Serialize};

/// Validation names that carry the identifier(s) of a referenced definition.
pub(crate) const REFERENCE_TARGET_VALIDATION: &str = "metaobject_definition_id";
pub(crate) const REFERENCE_TARGETS_VALIDATION: &str = "metaobject_definition_ids";

/// The schema of one record type in one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    /// Store-local opaque identifier.
    pub id: String,
    /// Stable cross-store key. Unique within one store.
    #[serde(rename = "type")]
    pub definition_type: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field_definitions: Vec<FieldDefinition>,
    /// Opaque capability flags (e.g. publishable), passed through untouched.
    #[serde(default)]
    pub capabilities: serde_json::Value,
    /// Opaque visibility flags, passed through untouched.
    #[serde(default)]
    pub access: serde_json::Value,
}

impl Definition {
    /// Creates a definition with no fields.
    pub fn new(
        id: impl Into<String>,
        definition_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            definition_type: definition_type.into(),
            name: name.into(),
            description: None,
            field_definitions: Vec::new(),
            capabilities: serde_json::Value::Null,
            access: serde_json::Value::Null,
        }
    }

    /// Appends a field definition.
    #[must_use]
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.field_definitions.push(field);
        self
    }

    /// Looks up a field definition by key.
    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.field_definitions.iter().find(|f| f.key == key)
    }

    /// Field definitions flagged `required`.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.field_definitions.iter().filter(|f| f.required)
    }
}

/// One field of a [`Definition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Unique within the owning definition.
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Declared type name as the store reports it (e.g. `boolean`,
    /// `metaobject_reference`, `list.metaobject_reference`).
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub validations: Vec<Validation>,
}

impl FieldDefinition {
    /// Creates an optional field whose display name equals its key.
    pub fn new(key: impl Into<String>, field_type: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            description: None,
            required: false,
            field_type: field_type.into(),
            validations: Vec::new(),
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Appends a validation rule.
    #[must_use]
    pub fn with_validation(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.validations.push(Validation::new(name, value));
        self
    }

    /// Returns the value of the first validation named `name`.
    pub fn validation(&self, name: &str) -> Option<&str> {
        self.validations
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Definition identifiers this field's validations say it may reference.
    ///
    /// Reads both the single-target and the multi-target (JSON array) forms.
    /// Malformed arrays yield nothing.
    pub fn referenced_definition_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for validation in &self.validations {
            match validation.name.as_str() {
                REFERENCE_TARGET_VALIDATION if !validation.value.is_empty() => {
                    ids.push(validation.value.clone());
                }
                REFERENCE_TARGETS_VALIDATION => {
                    if let Ok(list) = serde_json::from_str::<Vec<String>>(&validation.value) {
                        ids.extend(list.into_iter().filter(|id| !id.is_empty()));
                    }
                }
                _ => {}
            }
        }
        ids
    }
}

/// A named validation rule; the value is opaque text (often JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub name: String,
    pub value: String,
}

impl Validation {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// True for validations that embed definition identifiers.
    pub fn is_reference_target(&self) -> bool {
        self.name == REFERENCE_TARGET_VALIDATION || self.name == REFERENCE_TARGETS_VALIDATION
    }
}
