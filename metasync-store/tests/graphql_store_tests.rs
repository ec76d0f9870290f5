use metasync_store::{DataStore, GraphqlStore, StoreConfig, StoreError};
use metasync_types::{FieldInput, InstanceInput};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/admin/api/2025-01/graphql.json";

fn mock_config(server: &MockServer) -> StoreConfig {
    StoreConfig {
        name: "target".to_string(),
        shop_domain: "target.example.com".to_string(),
        access_token: "shpat_test".to_string(),
        api_base_url: Some(server.uri()),
        page_size: 2,
        ..Default::default()
    }
}

// ── Config ───────────────────────────────────────────────────────

#[test]
fn store_config_default() {
    let cfg = StoreConfig::default();
    assert_eq!(cfg.api_version, "2025-01");
    assert_eq!(cfg.page_size, 50);
    assert_eq!(cfg.timeout_secs, 60);
    assert!(cfg.api_base_url.is_none());
}

#[test]
fn store_config_endpoint() {
    let cfg = StoreConfig {
        shop_domain: "shop.example.com".into(),
        ..Default::default()
    };
    assert_eq!(
        cfg.endpoint(),
        "https://shop.example.com/admin/api/2025-01/graphql.json"
    );

    let cfg = StoreConfig {
        api_base_url: Some("http://127.0.0.1:9000/".into()),
        ..Default::default()
    };
    assert_eq!(
        cfg.endpoint(),
        "http://127.0.0.1:9000/admin/api/2025-01/graphql.json"
    );
}

#[test]
fn store_config_validate() {
    let cfg = StoreConfig::default();
    assert!(cfg.validate().unwrap_err().contains("shop_domain"));

    let cfg = StoreConfig {
        shop_domain: "s".into(),
        ..Default::default()
    };
    assert!(cfg.validate().unwrap_err().contains("access_token"));

    let cfg = StoreConfig {
        shop_domain: "s".into(),
        access_token: "t".into(),
        page_size: 0,
        ..Default::default()
    };
    assert!(cfg.validate().unwrap_err().contains("page_size"));
}

#[test]
fn store_config_serde_fills_defaults() {
    let cfg: StoreConfig =
        serde_json::from_str(r#"{"name":"source","shop_domain":"a.example.com","access_token":"x"}"#)
            .unwrap();
    assert_eq!(cfg.name, "source");
    assert_eq!(cfg.api_version, "2025-01");
}

// ── Queries ──────────────────────────────────────────────────────

#[tokio::test]
async fn ping_sends_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("X-Shopify-Access-Token", "shpat_test"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "shop": { "name": "T" } } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    store.ping().await.unwrap();
}

#[tokio::test]
async fn fetch_definitions_maps_nodes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("metaobjectDefinitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "metaobjectDefinitions": {
                    "nodes": [{
                        "id": "gid://shopify/MetaobjectDefinition/1",
                        "type": "author",
                        "name": "Author",
                        "description": null,
                        "fieldDefinitions": [{
                            "key": "name",
                            "name": "Name",
                            "description": null,
                            "required": true,
                            "type": { "name": "single_line_text_field" },
                            "validations": []
                        }],
                        "capabilities": { "publishable": { "enabled": true } },
                        "access": { "admin": "MERCHANT_READ_WRITE", "storefront": "NONE" }
                    }]
                }
            },
            "extensions": {
                "cost": {
                    "requestedQueryCost": 12,
                    "throttleStatus": {
                        "maximumAvailable": 2000.0,
                        "currentlyAvailable": 1988.0,
                        "restoreRate": 100.0
                    }
                }
            }
        })))
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    let definitions = store.fetch_definitions().await.unwrap();

    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].definition_type, "author");
    assert_eq!(definitions[0].field_definitions[0].field_type, "single_line_text_field");
    assert!(definitions[0].field_definitions[0].required);

    let quota = store.quota().unwrap();
    assert_eq!(quota.currently_available, 1988.0);
    assert!((quota.remaining_ratio() - 0.994).abs() < 1e-9);
}

#[tokio::test]
async fn fetch_instances_reads_page_info() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("metaobjects("))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "metaobjects": {
                    "nodes": [
                        {
                            "id": "gid://shopify/Metaobject/1",
                            "handle": "jane",
                            "type": "author",
                            "fields": [{ "key": "name", "value": "Jane", "type": "single_line_text_field" }],
                            "capabilities": {}
                        },
                        {
                            "id": "gid://shopify/Metaobject/2",
                            "handle": "john",
                            "type": "author",
                            "fields": [{ "key": "name", "value": null, "type": "single_line_text_field" }],
                            "capabilities": {}
                        }
                    ],
                    "pageInfo": { "hasNextPage": true, "endCursor": "cursor-2" }
                }
            }
        })))
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    let page = store.fetch_instances("author", None).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].field_value("name"), Some("Jane"));
    assert_eq!(page.items[1].field_value("name"), None);
    assert_eq!(page.next_cursor.as_deref(), Some("cursor-2"));
}

#[tokio::test]
async fn fetch_instance_by_id_missing_returns_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "metaobject": null } })),
        )
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    assert!(store
        .fetch_instance_by_id("gid://shopify/Metaobject/404")
        .await
        .unwrap()
        .is_none());
}

// ── Mutations ────────────────────────────────────────────────────

#[tokio::test]
async fn create_instance_returns_user_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("metaobjectCreate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "metaobjectCreate": {
                    "metaobject": null,
                    "userErrors": [
                        { "field": ["metaobject", "fields", "1", "value"], "message": "Value is invalid", "code": "INVALID_VALUE" },
                        { "field": null, "message": "Something else", "code": null }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    let outcome = store
        .create_instance(&InstanceInput {
            instance_type: "author".into(),
            handle: Some("jane".into()),
            fields: vec![FieldInput::new("name", "Jane"), FieldInput::new("age", "x")],
            capabilities: None,
        })
        .await
        .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.errors[0].code.as_deref(), Some("INVALID_VALUE"));
    assert!(outcome.errors[1].field.is_empty());
}

#[tokio::test]
async fn update_instance_sends_id_and_fields() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains("gid://shopify/Metaobject/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "metaobjectUpdate": {
                    "metaobject": {
                        "id": "gid://shopify/Metaobject/9",
                        "handle": "jane",
                        "type": "author",
                        "fields": [{ "key": "name", "value": "Jane Doe", "type": "single_line_text_field" }]
                    },
                    "userErrors": []
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    let outcome = store
        .update_instance("gid://shopify/Metaobject/9", &[FieldInput::new("name", "Jane Doe")])
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.record.unwrap().field_value("name"), Some("Jane Doe"));
}

// ── Failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn http_429_maps_to_throttled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    let err = store.fetch_definitions().await.unwrap_err();
    assert!(err.is_throttled());
    assert!(matches!(err, StoreError::Throttled { retry_after_ms: 2000 }));
}

#[tokio::test]
async fn throttled_graphql_error_maps_to_throttled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Throttled", "extensions": { "code": "THROTTLED" } }],
            "extensions": {
                "cost": {
                    "requestedQueryCost": 150,
                    "throttleStatus": {
                        "maximumAvailable": 2000.0,
                        "currentlyAvailable": 50.0,
                        "restoreRate": 100.0
                    }
                }
            }
        })))
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    let err = store.fetch_instances("author", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Throttled { retry_after_ms: 1000 }));
}

#[tokio::test]
async fn graphql_errors_are_collected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Field 'x' doesn't exist" }, { "message": "second" }]
        })))
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    match store.fetch_definitions().await {
        Err(StoreError::GraphQl(messages)) => assert_eq!(messages.len(), 2),
        other => panic!("expected GraphQl error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_error_keeps_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .mount(&server)
        .await;

    let store = GraphqlStore::new(mock_config(&server));
    match store.fetch_definitions().await {
        Err(StoreError::Http { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn ping_unreachable_maps_to_unavailable() {
    let config = StoreConfig {
        name: "source".into(),
        access_token: "t".into(),
        api_base_url: Some("http://127.0.0.1:1".into()),
        timeout_secs: 2,
        ..Default::default()
    };
    let store = GraphqlStore::new(config);
    assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn ping_rejects_incomplete_config() {
    let store = GraphqlStore::new(StoreConfig::default());
    assert!(matches!(store.ping().await, Err(StoreError::Config(_))));
}
