//! Storage abstraction for Backplane.
//!
//! This module defines the `StorageEngine` trait and the record helpers
//! shared by every backend.
//!
//! ## Backends
//!
//! - `tinydb`: embedded document store, one JSON file per table
//! - `filesystem`: one JSON file per record
//! - `s3`: one object per record
//! - `dynamodb`: one item per record
//!
//! Backends are selected at runtime through [`get_database`].

pub mod attribute;
pub mod document;
pub mod dynamodb;
pub mod factory;
pub mod filesystem;
pub mod s3;
pub mod traits;
pub mod types;

// Re-export public types
pub use document::DocumentStorage;
pub use dynamodb::DynamoDbStorage;
pub use factory::get_database;
pub use filesystem::FilesystemStorage;
pub use s3::S3Storage;
pub use traits::StorageEngine;
pub use types::{merge_into, record_from_value, record_id, with_id, KeyMatcher, Record, ID_FIELD};
