//! Generic CRUD service for a storage-backed resource.
//!
//! `register_resource(registry, "config")` adds, under module
//! `config_service`:
//!
//! | function | args | returns |
//! |---|---|---|
//! | `create_config` | `[record]` | created record (id assigned if absent) |
//! | `get_all_config` | `[]` | array of records |
//! | `get_config` | `[id]` | record or `null` |
//! | `update_config` | `[id, partial]` | merged record or `null` |
//! | `delete_config` | `[id]` | deleted record or `null` |
//!
//! Records live in the table named after the resource. Every call passes
//! the context's access policy first.

use serde_json::Value;
use uuid::Uuid;

use super::context::{arg_record, arg_str, ServiceContext};
use super::registry::ServiceRegistry;
use crate::error::Result;
use crate::storage::record_id;

/// Fresh id for a record created without one.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Module name the CRUD functions for `resource` are registered under.
pub fn service_module(resource: &str) -> String {
    format!("{}_service", resource)
}

fn create(resource: &str, ctx: &ServiceContext, args: &[Value]) -> Result<Value> {
    ctx.authorize(&[])?;
    let record = arg_record(args, 0, "record")?;
    let id = record_id(&record)
        .map(str::to_string)
        .unwrap_or_else(new_record_id);
    let queue = ctx.queue()?;

    let created = ctx.storage()?.insert_item(resource, &id, record)?;
    tracing::info!(resource, id = %id, "resource created");

    if let Some(queue) = queue {
        queue.send_message(Value::Object(created.clone()))?;
        tracing::debug!(resource, queue = queue.name(), "creation published");
    }
    Ok(Value::Object(created))
}

fn get_all(resource: &str, ctx: &ServiceContext) -> Result<Value> {
    ctx.authorize(&[])?;
    let records = ctx.storage()?.get_all_items(resource)?;
    Ok(Value::Array(records.into_iter().map(Value::Object).collect()))
}

fn get(resource: &str, ctx: &ServiceContext, args: &[Value]) -> Result<Value> {
    ctx.authorize(&[])?;
    let id = arg_str(args, 0, "id")?;
    Ok(ctx
        .storage()?
        .get_item(resource, &id)?
        .map(Value::Object)
        .unwrap_or(Value::Null))
}

fn update(resource: &str, ctx: &ServiceContext, args: &[Value]) -> Result<Value> {
    ctx.authorize(&[])?;
    let id = arg_str(args, 0, "id")?;
    let partial = arg_record(args, 1, "partial")?;
    Ok(ctx
        .storage()?
        .update_item(resource, &id, partial)?
        .map(Value::Object)
        .unwrap_or(Value::Null))
}

fn delete(resource: &str, ctx: &ServiceContext, args: &[Value]) -> Result<Value> {
    ctx.authorize(&[])?;
    let id = arg_str(args, 0, "id")?;
    let storage = ctx.storage()?;
    let Some(existing) = storage.get_item(resource, &id)? else {
        return Ok(Value::Null);
    };
    storage.delete_item(resource, &id)?;
    tracing::info!(resource, id = %id, "resource deleted");
    Ok(Value::Object(existing))
}

/// Register the five CRUD functions for `resource`.
pub fn register_resource(registry: &mut ServiceRegistry, resource: &str) {
    let module = service_module(resource);

    let r = resource.to_string();
    registry.register(&module, &format!("create_{}", resource), move |ctx, args| {
        create(&r, ctx, args)
    });
    let r = resource.to_string();
    registry.register(&module, &format!("get_all_{}", resource), move |ctx, _| {
        get_all(&r, ctx)
    });
    let r = resource.to_string();
    registry.register(&module, &format!("get_{}", resource), move |ctx, args| {
        get(&r, ctx, args)
    });
    let r = resource.to_string();
    registry.register(&module, &format!("update_{}", resource), move |ctx, args| {
        update(&r, ctx, args)
    });
    let r = resource.to_string();
    registry.register(&module, &format!("delete_{}", resource), move |ctx, args| {
        delete(&r, ctx, args)
    });
}
