use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use backplane_core::auth::{AccessPolicy, Identity};
use backplane_core::dispatch::{register_resource, Invocation, ServiceContext, ServiceRegistry};
use backplane_core::queue::{LocalQueue, QueueClient};
use backplane_core::storage::{DocumentStorage, StorageEngine};
use backplane_core::BackplaneError;

struct Fixture {
    _dir: TempDir,
    registry: ServiceRegistry,
    queue: Arc<LocalQueue>,
    ctx: ServiceContext,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("tempdir should succeed");
    let storage: Arc<dyn StorageEngine> =
        Arc::new(DocumentStorage::open(dir.path()).expect("open should succeed"));
    let queue = Arc::new(LocalQueue::new());
    let ctx = ServiceContext::new()
        .with_storage(storage)
        .with_queue(Arc::clone(&queue) as Arc<dyn QueueClient>);

    let mut registry = ServiceRegistry::new();
    register_resource(&mut registry, "config");
    registry.register("config_service", "explode", |_, _| {
        Err(BackplaneError::Other("handler exploded".to_string()))
    });

    Fixture {
        _dir: dir,
        registry,
        queue,
        ctx,
    }
}

fn call(fx: &Fixture, function: &str, args: &[Value]) -> Value {
    fx.registry
        .safe_invoke("config_service", function, &fx.ctx, args)
        .expect("invoke should succeed")
        .expect("function should be registered")
}

#[test]
fn test_missing_target_returns_none() {
    let fx = fixture();
    let result = fx
        .registry
        .safe_invoke("nonexistent.module", "fn", &fx.ctx, &[])
        .expect("missing target should not fail");
    assert!(result.is_none());
    assert_eq!(
        fx.registry.invoke("config_service", "archive_config", &fx.ctx, &[]).unwrap(),
        Invocation::NotRegistered
    );
}

#[test]
fn test_handler_error_propagates_unchanged() {
    let fx = fixture();
    let err = fx
        .registry
        .safe_invoke("config_service", "explode", &fx.ctx, &[])
        .unwrap_err();
    assert!(matches!(err, BackplaneError::Other(ref msg) if msg == "handler exploded"));
}

#[test]
fn test_crud_lifecycle() {
    let fx = fixture();

    let created = call(&fx, "create_config", &[json!({"name": "alpha", "level": 1})]);
    let id = created["id"].as_str().expect("id should be assigned").to_string();
    assert_eq!(created["name"], json!("alpha"));

    assert_eq!(call(&fx, "get_config", &[json!(id)]), created);
    assert_eq!(call(&fx, "get_all_config", &[]), json!([created]));

    let updated = call(&fx, "update_config", &[json!(id), json!({"level": 2})]);
    assert_eq!(updated, json!({"id": id, "name": "alpha", "level": 2}));

    let deleted = call(&fx, "delete_config", &[json!(id)]);
    assert_eq!(deleted, updated);
    assert_eq!(call(&fx, "get_config", &[json!(id)]), Value::Null);
    assert_eq!(call(&fx, "delete_config", &[json!(id)]), Value::Null);
}

#[test]
fn test_create_keeps_caller_id_and_publishes() {
    let fx = fixture();
    let created = call(&fx, "create_config", &[json!({"id": "fixed", "v": true})]);
    assert_eq!(created["id"], json!("fixed"));

    let message = fx.queue.receive_message().unwrap().expect("creation should be published");
    assert_eq!(message.body, created);
}

#[test]
fn test_update_missing_returns_null() {
    let fx = fixture();
    assert_eq!(
        call(&fx, "update_config", &[json!("ghost"), json!({"a": 1})]),
        Value::Null
    );
}

#[test]
fn test_numeric_ids_are_treated_as_text() {
    let fx = fixture();
    fx.registry
        .safe_invoke("config_service", "create_config", &fx.ctx, &[json!({"id": "123", "name": "n"})])
        .unwrap();
    let found = fx
        .registry
        .safe_invoke("config_service", "get_config", &fx.ctx, &[json!(123)])
        .unwrap()
        .expect("function is registered");
    assert_eq!(found["id"], json!("123"));
}

#[test]
fn test_bad_arguments_are_invalid_input() {
    let fx = fixture();
    let err = fx
        .registry
        .safe_invoke("config_service", "get_config", &fx.ctx, &[json!({"id": "k"})])
        .unwrap_err();
    assert!(matches!(err, BackplaneError::InvalidInput(_)));

    let err = fx
        .registry
        .safe_invoke("config_service", "create_config", &fx.ctx, &[json!("not an object")])
        .unwrap_err();
    assert!(matches!(err, BackplaneError::InvalidInput(_)));
}

#[test]
fn test_enabled_policy_requires_identity() {
    let fx = fixture();
    let guarded = fx.ctx.clone().with_policy(AccessPolicy::new(true));
    let err = fx
        .registry
        .safe_invoke("config_service", "get_all_config", &guarded, &[])
        .unwrap_err();
    assert!(matches!(err, BackplaneError::PermissionDenied(_)));

    let signed_in = guarded.with_identity(Identity {
        id: "alice".to_string(),
        email: "alice".to_string(),
        roles: Vec::new(),
    });
    let all = fx
        .registry
        .safe_invoke("config_service", "get_all_config", &signed_in, &[])
        .unwrap();
    assert_eq!(all, Some(json!([])));
}

#[test]
fn test_without_storage_is_config_error() {
    let mut registry = ServiceRegistry::new();
    register_resource(&mut registry, "config");
    let err = registry
        .safe_invoke("config_service", "get_all_config", &ServiceContext::new(), &[])
        .unwrap_err();
    assert!(matches!(err, BackplaneError::Config(_)));
}
