//! Record types: an [`Instance`] is one concrete record of a definition's type.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// One record in one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Store-local opaque identifier.
    pub id: String,
    /// Human-readable slug; the cross-store join key when present.
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(rename = "type")]
    pub instance_type: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
}

impl Instance {
    pub fn new(id: impl Into<String>, instance_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: None,
            instance_type: instance_type.into(),
            fields: Vec::new(),
            capabilities: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field::new(key, value));
        self
    }

    /// The handle, if present and non-empty.
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref().filter(|h| !h.is_empty())
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// The value of `key`, if the field exists and is not null.
    pub fn field_value(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(|f| f.value.as_deref())
    }
}

/// A single key/value pair on an [`Instance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    /// Raw value. List references hold a JSON-encoded array of identifiers.
    #[serde(default)]
    pub value: Option<String>,
    /// Declared type name, when the store reports it alongside the value.
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            field_type: None,
        }
    }

    /// A field that is present but explicitly null.
    pub fn null(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            field_type: None,
        }
    }

    /// True when the value is missing or the empty string.
    pub fn is_blank(&self) -> bool {
        self.value.as_deref().is_none_or(str::is_empty)
    }
}

/// Parses a list-reference value into its identifiers.
pub fn parse_reference_list(value: &str) -> Result<Vec<String>> {
    let parsed: serde_json::Value = serde_json::from_str(value)?;
    let serde_json::Value::Array(items) = parsed else {
        return Err(Error::NotAnIdList(value.to_string()));
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(id) => Ok(id),
            other => Err(Error::NotAnIdList(other.to_string())),
        })
        .collect()
}
