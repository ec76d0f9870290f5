use chrono::{TimeZone, Utc};
use metasync_engine::{classify_type_name, DefinitionCatalog, FieldTypePolicy};
use metasync_types::{Definition, Field, FieldDefinition, FieldKind, Validation};
use pretty_assertions::assert_eq;

fn fixed_policy() -> FieldTypePolicy {
    FieldTypePolicy::new().with_fixed_time(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap())
}

fn catalogs() -> (DefinitionCatalog, DefinitionCatalog) {
    let source = DefinitionCatalog::from_definitions(
        "source",
        vec![
            Definition::new("gid://source/MetaobjectDefinition/1", "author", "Author"),
            Definition::new("gid://source/MetaobjectDefinition/2", "publisher", "Publisher"),
        ],
    );
    let target = DefinitionCatalog::from_definitions(
        "target",
        vec![Definition::new("gid://target/MetaobjectDefinition/77", "author", "Author")],
    );
    (source, target)
}

// ── Classification ───────────────────────────────────────────────

#[test]
fn classify_known_type_names() {
    assert_eq!(classify_type_name("boolean"), FieldKind::Boolean);
    assert_eq!(classify_type_name("number_integer"), FieldKind::Numeric);
    assert_eq!(classify_type_name("number_decimal"), FieldKind::Numeric);
    assert_eq!(classify_type_name("date"), FieldKind::Date);
    assert_eq!(classify_type_name("date_time"), FieldKind::DateTime);
    assert_eq!(classify_type_name("rating"), FieldKind::Rating);
    assert_eq!(classify_type_name("metaobject_reference"), FieldKind::Reference);
    assert_eq!(classify_type_name("mixed_reference"), FieldKind::Reference);
    assert_eq!(
        classify_type_name("list.metaobject_reference"),
        FieldKind::ListReference
    );
    assert_eq!(
        classify_type_name("product_reference"),
        FieldKind::ExternalReference { list: false }
    );
    assert_eq!(
        classify_type_name("list.file_reference"),
        FieldKind::ExternalReference { list: true }
    );
    assert_eq!(classify_type_name("list.single_line_text_field"), FieldKind::List);
}

#[test]
fn classify_unknown_names_as_plain() {
    assert_eq!(classify_type_name("single_line_text_field"), FieldKind::Plain);
    assert_eq!(classify_type_name("rich_text_field"), FieldKind::Plain);
    assert_eq!(classify_type_name("something_new"), FieldKind::Plain);
}

// ── Defaults ─────────────────────────────────────────────────────

#[test]
fn default_values_per_kind() {
    let policy = fixed_policy();
    assert_eq!(policy.default_value_for(FieldKind::Boolean), "false");
    assert_eq!(policy.default_value_for(FieldKind::Numeric), "0");
    assert_eq!(policy.default_value_for(FieldKind::Date), "2024-03-09");
    assert_eq!(
        policy.default_value_for(FieldKind::DateTime),
        "2024-03-09T14:30:05Z"
    );
    assert_eq!(policy.default_value_for(FieldKind::Plain), "");
    assert_eq!(policy.default_value_for(FieldKind::Reference), "");
}

#[test]
fn fill_required_defaults_fills_missing_and_null() {
    let definition = Definition::new("d", "author", "Author")
        .with_field(FieldDefinition::new("featured", "boolean").required())
        .with_field(FieldDefinition::new("age", "number_integer").required())
        .with_field(FieldDefinition::new("born", "date").required())
        .with_field(FieldDefinition::new("bio", "multi_line_text_field"));
    let mut fields = vec![Field::null("age")];

    let filled = fixed_policy().fill_required_defaults(&definition, &mut fields);

    assert_eq!(filled, vec!["featured", "age", "born"]);
    let value = |key: &str| {
        fields
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| f.value.clone())
    };
    assert_eq!(value("featured").as_deref(), Some("false"));
    assert_eq!(value("age").as_deref(), Some("0"));
    assert_eq!(value("born").as_deref(), Some("2024-03-09"));
    assert_eq!(value("bio"), None);
}

#[test]
fn fill_required_defaults_keeps_present_values() {
    let definition = Definition::new("d", "author", "Author")
        .with_field(FieldDefinition::new("featured", "boolean").required())
        .with_field(FieldDefinition::new("age", "number_integer").required())
        .with_field(FieldDefinition::new("name", "single_line_text_field").required());
    let mut fields = vec![
        Field::new("featured", "false"),
        Field::new("age", "0"),
        Field::new("name", ""),
    ];
    let before = fields.clone();

    let filled = fixed_policy().fill_required_defaults(&definition, &mut fields);

    assert!(filled.is_empty());
    assert_eq!(fields, before);
}

// ── Create validations ───────────────────────────────────────────

#[test]
fn reference_target_is_translated_to_target_id() {
    let (source, target) = catalogs();
    let field = FieldDefinition::new("author", "metaobject_reference")
        .with_validation("metaobject_definition_id", "gid://source/MetaobjectDefinition/1");

    let validations = fixed_policy().build_create_validations(&field, &source, &target);

    assert_eq!(
        validations,
        vec![Validation::new(
            "metaobject_definition_id",
            "gid://target/MetaobjectDefinition/77"
        )]
    );
}

#[test]
fn reference_target_list_keeps_only_known_types() {
    let (source, target) = catalogs();
    let field = FieldDefinition::new("credits", "list.mixed_reference").with_validation(
        "metaobject_definition_ids",
        r#"["gid://source/MetaobjectDefinition/1","gid://source/MetaobjectDefinition/2"]"#,
    );

    let validations = fixed_policy().build_create_validations(&field, &source, &target);

    assert_eq!(
        validations,
        vec![Validation::new(
            "metaobject_definition_ids",
            r#"["gid://target/MetaobjectDefinition/77"]"#
        )]
    );
}

#[test]
fn untranslatable_reference_target_is_dropped() {
    let (source, target) = catalogs();
    let field = FieldDefinition::new("publisher", "metaobject_reference")
        .with_validation("metaobject_definition_id", "gid://source/MetaobjectDefinition/2");

    let validations = fixed_policy().build_create_validations(&field, &source, &target);
    assert!(validations.is_empty());
}

#[test]
fn rating_gets_scale_when_missing() {
    let (source, target) = catalogs();
    let field = FieldDefinition::new("score", "rating").with_validation("scale_max", "10.0");

    let validations = fixed_policy().build_create_validations(&field, &source, &target);

    assert_eq!(
        validations,
        vec![
            Validation::new("scale_max", "10.0"),
            Validation::new("scale_min", "1.0"),
        ]
    );
}

#[test]
fn other_validations_are_copied() {
    let (source, target) = catalogs();
    let field = FieldDefinition::new("genre", "list.single_line_text_field")
        .with_validation("choices", r#"["fiction","poetry"]"#);

    let validations = fixed_policy().build_create_validations(&field, &source, &target);
    assert_eq!(validations, field.validations);
}
