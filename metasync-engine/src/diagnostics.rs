//! Human-readable descriptions of store validation errors.

use metasync_types::{FieldDefinitionOperation, FieldInput, UserError};

/// Longest value preview written to logs, in characters.
pub const PREVIEW_LEN: usize = 50;

/// Truncates `value` to [`PREVIEW_LEN`] characters, marking the cut.
pub fn preview(value: &str) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(PREVIEW_LEN).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Describes an error against the record fields that were sent.
///
/// When `field[1]` is an index into `fields`, names the key and a preview of
/// its value; otherwise falls back to the error's own path.
pub fn describe_user_error(error: &UserError, fields: &[FieldInput]) -> String {
    match error.input_index().and_then(|i| fields.get(i)) {
        Some(field) => format!(
            "field '{}' (value '{}'): {}",
            field.key,
            preview(&field.value),
            error.message
        ),
        None => error.to_string(),
    }
}

/// Describes an error against the field definitions that were sent.
pub fn describe_definition_error(error: &UserError, keys: &[&str]) -> String {
    match error.input_index().and_then(|i| keys.get(i)) {
        Some(key) => format!("field definition '{}': {}", key, error.message),
        None => error.to_string(),
    }
}

/// Keys of an update's field operations, in payload order.
pub(crate) fn operation_keys(operations: &[FieldDefinitionOperation]) -> Vec<&str> {
    operations.iter().map(FieldDefinitionOperation::key).collect()
}
