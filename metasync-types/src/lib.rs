//! Core record types for metasync.
//!
//! This crate defines the store-agnostic data model every other crate uses:
//! - [`Definition`] / [`FieldDefinition`]: the schema of one record type
//! - [`Instance`] / [`Field`]: one concrete record and its values
//! - [`FieldKind`]: the closed classification of a field's declared type
//! - Mutation inputs ([`DefinitionInput`], [`InstanceInput`], ...) and the
//!   uniform [`UserError`] shape stores report validation failures with
//!
//! Identifiers (`id`) are store-local and never compared across stores. The
//! only portable identity is the `(type, handle)` pair.

mod definition;
mod field_kind;
mod instance;
mod mutation;

pub use definition::{Definition, FieldDefinition, Validation};
pub use field_kind::FieldKind;
pub use instance::{parse_reference_list, Field, Instance};
pub use mutation::{
    DefinitionInput, DefinitionUpdate, FieldDefinitionInput, FieldDefinitionOperation,
    FieldInput, InstanceInput, UserError,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("expected a JSON array of identifiers, got: {0}")]
    NotAnIdList(String),
}
