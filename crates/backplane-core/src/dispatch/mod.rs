//! Service dispatch.
//!
//! Routes a `(module, function)` pair to a handler registered at startup.
//! Unregistered names are a normal outcome ([`Invocation::NotRegistered`]),
//! so routing can reference services that are not implemented yet.

pub mod context;
pub mod crud;
pub mod registry;

// Re-export public types
pub use context::{arg_record, arg_str, QueueLoader, ServiceContext};
pub use crud::{new_record_id, register_resource, service_module};
pub use registry::{Invocation, ServiceFn, ServiceRegistry};
