use serde::{Deserialize, Serialize};

/// The data type of a field, as far as synchronization cares.
///
/// Stores declare field types as free-form names; the engine classifies each
/// name once into this closed set and matches on it exhaustively afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Text and anything without special handling.
    Plain,
    Boolean,
    Numeric,
    Date,
    DateTime,
    /// Numeric rating; needs a scale range on create.
    Rating,
    /// Single reference to another record.
    Reference,
    /// JSON array of references to other records.
    ListReference,
    /// Reference to a resource outside the record model (products, files, ...).
    ExternalReference { list: bool },
    /// Any other list type (values may be constrained by a `choices` rule).
    List,
}

impl FieldKind {
    /// True for kinds whose value holds record identifiers this engine can translate.
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldKind::Reference | FieldKind::ListReference)
    }

    /// Short tag used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Plain => "plain",
            FieldKind::Boolean => "boolean",
            FieldKind::Numeric => "numeric",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Rating => "rating",
            FieldKind::Reference => "reference",
            FieldKind::ListReference => "list-reference",
            FieldKind::ExternalReference { list: false } => "external-reference",
            FieldKind::ExternalReference { list: true } => "list-external-reference",
            FieldKind::List => "list",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
