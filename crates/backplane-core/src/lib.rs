//! # Backplane Core
//!
//! Pluggable service backplane: storage, queue and auth backends chosen by
//! configuration, plus a registration-table dispatcher for service functions.
//!
//! Every backend is a synchronous `Send + Sync` trait object, so callers hold
//! an `Arc<dyn StorageEngine>` (or `QueueClient`, `AuthProvider`) and never
//! name a concrete backend.
//!
//! ## Architecture
//!
//! - **config**: `Settings` with the backend discriminators and parameters
//! - **storage**: document, filesystem, S3 and DynamoDB record stores
//! - **queue**: local, no-op, SQS and Azure queues plus a named registry
//! - **auth**: local (Argon2id + JWT) and Cognito providers, role checks
//! - **dispatch**: `(module, function)` registry and generic CRUD services

pub mod auth;
pub mod aws;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fs;
pub mod queue;
pub mod storage;
pub(crate) mod xml;

pub use auth::{get_auth_provider, AccessPolicy, AuthProvider, Identity};
pub use config::{Settings, REDACTED};
pub use dispatch::{register_resource, Invocation, ServiceContext, ServiceRegistry};
pub use error::{BackplaneError, Result};
pub use queue::{build_queue_client, Message, QueueClient, QueueParams, QueueRegistry};
pub use storage::{get_database, Record, StorageEngine};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
