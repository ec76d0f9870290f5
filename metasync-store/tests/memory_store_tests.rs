use metasync_store::{DataStore, MemoryStore, MutationRecord, StoreError};
use metasync_types::{
    Definition, DefinitionInput, DefinitionUpdate, FieldDefinition, FieldDefinitionInput,
    FieldDefinitionOperation, FieldInput, Instance, InstanceInput,
};
use pretty_assertions::assert_eq;

fn author_definition() -> Definition {
    Definition::new("gid://t/MetaobjectDefinition/1", "author", "Author")
        .with_field(FieldDefinition::new("name", "single_line_text_field").required())
        .with_field(FieldDefinition::new("featured", "boolean"))
}

fn instance_input(handle: &str, fields: Vec<FieldInput>) -> InstanceInput {
    InstanceInput {
        instance_type: "author".into(),
        handle: Some(handle.into()),
        fields,
        capabilities: None,
    }
}

// ── Listing ──────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_instances_paginates_in_insertion_order() {
    let store = MemoryStore::new("t").with_page_size(2);
    for n in 0..5 {
        store.insert_instance(
            Instance::new(format!("gid://t/Metaobject/{n}"), "author").with_handle(format!("a{n}")),
        );
    }
    store.insert_instance(Instance::new("gid://t/Metaobject/99", "book").with_handle("b"));

    let first = store.fetch_instances("author", None).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.next_cursor.as_deref(), Some("2"));

    let second = store
        .fetch_instances("author", first.next_cursor.as_deref())
        .await
        .unwrap();
    let third = store
        .fetch_instances("author", second.next_cursor.as_deref())
        .await
        .unwrap();
    assert_eq!(third.items.len(), 1);
    assert_eq!(third.items[0].handle(), Some("a4"));
    assert!(third.next_cursor.is_none());
    assert_eq!(store.instance_page_fetches(), 3);
}

#[tokio::test]
async fn unreachable_store_fails_every_call() {
    let store = MemoryStore::new("t");
    store.set_unreachable(true);

    assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
    assert!(store.fetch_definitions().await.is_err());
    assert!(store.fetch_instance_by_id("x").await.is_err());
}

#[tokio::test]
async fn throttled_lookups_are_injectable() {
    let store = MemoryStore::new("t");
    store.insert_instance(Instance::new("gid://t/Metaobject/1", "author").with_handle("jane"));
    store.throttle_lookups(true);

    let err = store.fetch_instance_by_id("gid://t/Metaobject/1").await.unwrap_err();
    assert!(err.is_throttled());
    // Listing is unaffected.
    assert_eq!(store.fetch_instances("author", None).await.unwrap().items.len(), 1);

    store.throttle_lookups(false);
    assert!(store
        .fetch_instance_by_id("gid://t/Metaobject/1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn definition_fetch_failure_is_injectable() {
    let store = MemoryStore::new("t");
    store.insert_definition(author_definition());
    store.fail_definition_fetch(true);
    assert!(matches!(
        store.fetch_definitions().await,
        Err(StoreError::Network(_))
    ));
    // Single lookups still work.
    assert!(store
        .fetch_definition_by_id("gid://t/MetaobjectDefinition/1")
        .await
        .unwrap()
        .is_some());
}

// ── Record mutations ─────────────────────────────────────────────

#[tokio::test]
async fn create_instance_allocates_store_local_id() {
    let store = MemoryStore::new("target");
    store.insert_definition(author_definition());

    let outcome = store
        .create_instance(&instance_input("jane", vec![FieldInput::new("name", "Jane")]))
        .await
        .unwrap();

    assert!(outcome.is_success());
    let created = outcome.record.unwrap();
    assert!(created.id.starts_with("gid://target/Metaobject/"));
    assert_eq!(created.handle(), Some("jane"));
    assert_eq!(
        store.mutations(),
        vec![MutationRecord::CreateInstance {
            instance_type: "author".into(),
            handle: Some("jane".into()),
        }]
    );
}

#[tokio::test]
async fn create_instance_rejects_missing_required_and_unknown_keys() {
    let store = MemoryStore::new("t");
    store.insert_definition(author_definition());

    let outcome = store
        .create_instance(&instance_input("jane", vec![FieldInput::new("nickname", "J")]))
        .await
        .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.errors[0].field, vec!["fields", "0", "key"]);
    assert_eq!(outcome.errors[1].code.as_deref(), Some("OBJECT_FIELD_REQUIRED"));
    assert!(store.instances_of("author").is_empty());
}

#[tokio::test]
async fn create_instance_rejects_duplicate_handle() {
    let store = MemoryStore::new("t");
    store.insert_definition(author_definition());
    let input = instance_input("jane", vec![FieldInput::new("name", "Jane")]);

    assert!(store.create_instance(&input).await.unwrap().is_success());
    let second = store.create_instance(&input).await.unwrap();
    assert_eq!(second.errors[0].code.as_deref(), Some("TAKEN"));
}

#[tokio::test]
async fn create_instance_rejects_foreign_reference_ids() {
    let store = MemoryStore::new("t");
    store.insert_definition(
        Definition::new("gid://t/MetaobjectDefinition/2", "book", "Book")
            .with_field(FieldDefinition::new("author", "metaobject_reference")),
    );

    let outcome = store
        .create_instance(&InstanceInput {
            instance_type: "book".into(),
            handle: Some("dune".into()),
            fields: vec![FieldInput::new("author", "gid://source/Metaobject/1")],
            capabilities: None,
        })
        .await
        .unwrap();
    assert_eq!(outcome.errors[0].field, vec!["fields", "0", "value"]);
}

#[tokio::test]
async fn update_instance_merges_fields() {
    let store = MemoryStore::new("t");
    store.insert_definition(author_definition());
    store.insert_instance(
        Instance::new("gid://t/Metaobject/7", "author")
            .with_handle("jane")
            .with_field("name", "Jane"),
    );

    let outcome = store
        .update_instance(
            "gid://t/Metaobject/7",
            &[FieldInput::new("name", "Jane Doe"), FieldInput::new("featured", "true")],
        )
        .await
        .unwrap();

    let updated = outcome.record.unwrap();
    assert_eq!(updated.field_value("name"), Some("Jane Doe"));
    assert_eq!(updated.field_value("featured"), Some("true"));
}

#[tokio::test]
async fn rejected_handle_produces_user_error() {
    let store = MemoryStore::new("t");
    store.insert_definition(author_definition());
    store.reject_handle("jane", "Value is invalid");

    let outcome = store
        .create_instance(&instance_input("jane", vec![FieldInput::new("name", "Jane")]))
        .await
        .unwrap();
    assert_eq!(outcome.errors[0].message, "Value is invalid");
}

// ── Definition mutations ─────────────────────────────────────────

#[tokio::test]
async fn create_definition_checks_reference_targets() {
    let store = MemoryStore::new("t");
    let field = FieldDefinition::new("author", "metaobject_reference")
        .with_validation("metaobject_definition_id", "gid://elsewhere/MetaobjectDefinition/1");
    let input = DefinitionInput {
        definition_type: "book".into(),
        name: "Book".into(),
        description: None,
        field_definitions: vec![FieldDefinitionInput::from_field(&field, field.validations.clone())],
        capabilities: serde_json::Value::Null,
        access: serde_json::Value::Null,
    };

    let outcome = store.create_definition(&input).await.unwrap();
    assert_eq!(outcome.errors[0].code.as_deref(), Some("INVALID_OPTION"));
    assert!(store.definition_by_type("book").is_none());
}

#[tokio::test]
async fn update_definition_applies_create_and_update_operations() {
    let store = MemoryStore::new("t");
    store.insert_definition(author_definition());

    let name = FieldDefinition::new("name", "single_line_text_field");
    let bio = FieldDefinition::new("bio", "multi_line_text_field");
    let update = DefinitionUpdate {
        name: "Writer".into(),
        description: Some("People who write".into()),
        field_definitions: vec![
            FieldDefinitionOperation::Update(FieldDefinitionInput::from_field(&name, vec![])),
            FieldDefinitionOperation::Create(FieldDefinitionInput::from_field(&bio, vec![])),
        ],
        capabilities: serde_json::Value::Null,
    };

    let outcome = store
        .update_definition("gid://t/MetaobjectDefinition/1", &update)
        .await
        .unwrap();
    let updated = outcome.record.unwrap();
    assert_eq!(updated.name, "Writer");
    assert!(!updated.field("name").unwrap().required);
    assert!(updated.field("bio").is_some());
    // Untouched keys survive.
    assert!(updated.field("featured").is_some());
}
