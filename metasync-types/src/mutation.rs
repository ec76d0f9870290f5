//! Mutation inputs and the uniform validation-error shape.

use crate::{Definition, FieldDefinition, Validation};
use serde::{Deserialize, Serialize};

/// A user-facing validation error returned by a mutating store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    /// Path to the offending input, e.g. `["fields", "2", "value"]`.
    #[serde(default)]
    pub field: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl UserError {
    pub fn new(field: &[&str], message: impl Into<String>) -> Self {
        Self {
            field: field.iter().map(|s| s.to_string()).collect(),
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The numeric index in `field[1]`, when there is one.
    pub fn input_index(&self) -> Option<usize> {
        self.field.get(1).and_then(|s| s.parse().ok())
    }
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field.join("."), self.message)
        }
    }
}

/// A key/value pair sent on create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInput {
    pub key: String,
    pub value: String,
}

impl FieldInput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Payload for creating a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInput {
    #[serde(rename = "type")]
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub fields: Vec<FieldInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<serde_json::Value>,
}

/// Payload for one field definition on create, or one field operation on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinitionInput {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    pub validations: Vec<Validation>,
}

impl FieldDefinitionInput {
    /// Copies a field definition, replacing its validations.
    pub fn from_field(field: &FieldDefinition, validations: Vec<Validation>) -> Self {
        Self {
            key: field.key.clone(),
            name: field.name.clone(),
            description: field.description.clone(),
            field_type: field.field_type.clone(),
            required: field.required,
            validations,
        }
    }

    /// The field definition a store would hold after accepting this input.
    pub fn to_field_definition(&self) -> FieldDefinition {
        FieldDefinition {
            key: self.key.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            required: self.required,
            field_type: self.field_type.clone(),
            validations: self.validations.clone(),
        }
    }
}

/// Payload for creating a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionInput {
    #[serde(rename = "type")]
    pub definition_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub field_definitions: Vec<FieldDefinitionInput>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
    #[serde(default)]
    pub access: serde_json::Value,
}

impl DefinitionInput {
    /// Starts a create payload from a definition's scalar attributes.
    pub fn from_definition(definition: &Definition, fields: Vec<FieldDefinitionInput>) -> Self {
        Self {
            definition_type: definition.definition_type.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            field_definitions: fields,
            capabilities: definition.capabilities.clone(),
            access: definition.access.clone(),
        }
    }
}

/// An instruction for one field of an existing definition.
///
/// There is deliberately no delete: keys present on the target but absent
/// on the source are left alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDefinitionOperation {
    Create(FieldDefinitionInput),
    Update(FieldDefinitionInput),
}

impl FieldDefinitionOperation {
    pub fn key(&self) -> &str {
        match self {
            FieldDefinitionOperation::Create(input) | FieldDefinitionOperation::Update(input) => {
                &input.key
            }
        }
    }
}

/// Payload for updating an existing definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionUpdate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub field_definitions: Vec<FieldDefinitionOperation>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
}
