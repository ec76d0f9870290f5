//! Field type classification, required-field defaults and create-time
//! validations.

use crate::catalog::DefinitionCatalog;
use chrono::{DateTime, SecondsFormat, Utc};
use metasync_types::{Definition, Field, FieldDefinition, FieldKind, Validation};
use tracing::warn;

const RATING_SCALE_MIN: &str = "scale_min";
const RATING_SCALE_MAX: &str = "scale_max";
const DEFAULT_SCALE_MIN: &str = "1.0";
const DEFAULT_SCALE_MAX: &str = "5.0";

/// Maps a declared type name to its [`FieldKind`].
///
/// Unknown names are [`FieldKind::Plain`].
pub fn classify_type_name(type_name: &str) -> FieldKind {
    let (list, base) = match type_name.strip_prefix("list.") {
        Some(base) => (true, base),
        None => (false, type_name),
    };
    match base {
        "metaobject_reference" | "mixed_reference" => {
            if list {
                FieldKind::ListReference
            } else {
                FieldKind::Reference
            }
        }
        other if other.ends_with("_reference") => FieldKind::ExternalReference { list },
        _ if list => FieldKind::List,
        "boolean" => FieldKind::Boolean,
        "date" => FieldKind::Date,
        "date_time" => FieldKind::DateTime,
        "rating" => FieldKind::Rating,
        other if other.contains("number") => FieldKind::Numeric,
        _ => FieldKind::Plain,
    }
}

/// Field-type rules applied when copying definitions and records.
#[derive(Debug, Clone, Default)]
pub struct FieldTypePolicy {
    fixed_now: Option<DateTime<Utc>>,
}

impl FieldTypePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `now` instead of the wall clock for date defaults.
    #[must_use]
    pub fn with_fixed_time(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    pub fn classify(&self, field: &FieldDefinition) -> FieldKind {
        classify_type_name(&field.field_type)
    }

    /// The value synthesized for a required field the source left empty.
    pub fn default_value_for(&self, kind: FieldKind) -> String {
        match kind {
            FieldKind::Boolean => "false".to_string(),
            FieldKind::Numeric => "0".to_string(),
            FieldKind::Date => self.now().date_naive().format("%Y-%m-%d").to_string(),
            FieldKind::DateTime => self.now().to_rfc3339_opts(SecondsFormat::Secs, true),
            FieldKind::Plain
            | FieldKind::Rating
            | FieldKind::Reference
            | FieldKind::ListReference
            | FieldKind::ExternalReference { .. }
            | FieldKind::List => String::new(),
        }
    }

    /// Fills required fields of `definition` that are missing from `fields`
    /// or present with a null value. Present values, including empty or
    /// falsy ones, are kept.
    ///
    /// Returns the keys that were filled.
    pub fn fill_required_defaults(
        &self,
        definition: &Definition,
        fields: &mut Vec<Field>,
    ) -> Vec<String> {
        let mut filled = Vec::new();
        for required in definition.required_fields() {
            let default = self.default_value_for(self.classify(required));
            match fields.iter_mut().find(|f| f.key == required.key) {
                Some(field) if field.value.is_some() => continue,
                Some(field) => field.value = Some(default),
                None => fields.push(Field::new(required.key.clone(), default)),
            }
            filled.push(required.key.clone());
        }
        filled
    }

    /// Validations to send when creating `field` on the target.
    ///
    /// Reference targets are rewritten from source definition ids to the
    /// target's ids for the same types; targets the target store does not
    /// have are dropped. Rating fields get a scale if they lack one. Other
    /// rules, such as `choices` on list fields, are copied unchanged.
    pub fn build_create_validations(
        &self,
        field: &FieldDefinition,
        source: &DefinitionCatalog,
        target: &DefinitionCatalog,
    ) -> Vec<Validation> {
        let kind = self.classify(field);
        let mut validations = Vec::with_capacity(field.validations.len() + 2);

        for validation in &field.validations {
            if !(kind.is_reference() && validation.is_reference_target()) {
                validations.push(validation.clone());
                continue;
            }
            if let Some(translated) = translate_reference_target(validation, source, target) {
                validations.push(translated);
            } else {
                warn!(
                    "field '{}': no target definition for reference rule {}, dropped",
                    field.key, validation.value
                );
            }
        }

        if kind == FieldKind::Rating {
            if field.validation(RATING_SCALE_MIN).is_none() {
                validations.push(Validation::new(RATING_SCALE_MIN, DEFAULT_SCALE_MIN));
            }
            if field.validation(RATING_SCALE_MAX).is_none() {
                validations.push(Validation::new(RATING_SCALE_MAX, DEFAULT_SCALE_MAX));
            }
        }
        validations
    }
}

fn target_id_for(
    source_id: &str,
    source: &DefinitionCatalog,
    target: &DefinitionCatalog,
) -> Option<String> {
    let definition_type = source.type_for_id(source_id)?;
    target.id_for_type(definition_type).map(str::to_string)
}

fn translate_reference_target(
    validation: &Validation,
    source: &DefinitionCatalog,
    target: &DefinitionCatalog,
) -> Option<Validation> {
    match serde_json::from_str::<Vec<String>>(&validation.value) {
        Ok(ids) => {
            let translated: Vec<String> = ids
                .iter()
                .filter_map(|id| target_id_for(id, source, target))
                .collect();
            if translated.is_empty() {
                return None;
            }
            let value = serde_json::to_string(&translated).ok()?;
            Some(Validation::new(validation.name.clone(), value))
        }
        Err(_) => target_id_for(&validation.value, source, target)
            .map(|id| Validation::new(validation.name.clone(), id)),
    }
}
