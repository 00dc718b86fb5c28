//! Storage engine trait definition.
//!
//! The `StorageEngine` trait defines the interface that all storage backends
//! must implement. Handlers and services only ever see `dyn StorageEngine`,
//! so the document store, the filesystem store, S3 and DynamoDB are
//! interchangeable through configuration.

use super::types::{KeyMatcher, Record};
use crate::error::Result;

/// Table/key oriented record store.
///
/// All implementations must ensure:
/// - Tables are created implicitly on first write
/// - `id` of every stored record equals the key it is stored under
/// - Reads of absent keys return `Ok(None)`, never an error
/// - Deletes are idempotent
///
/// Keys are opaque strings on every backend.
pub trait StorageEngine: Send + Sync {
    /// Short backend name used in logs (e.g. "filesystem").
    fn name(&self) -> &'static str;

    /// Write `record` under `key`, replacing any existing record.
    ///
    /// # Returns
    ///
    /// Returns the stored record, with `id` forced to `key`.
    fn insert_item(&self, table: &str, key: &str, record: Record) -> Result<Record>;

    /// Get a record by key.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(record))` if found, `Ok(None)` if not found.
    fn get_item(&self, table: &str, key: &str) -> Result<Option<Record>>;

    /// Get the raw stored bytes for a key (e.g. audio uploads).
    ///
    /// Returns `Ok(None)` if nothing is stored under the key.
    fn get_binary_item(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Full scan of a table. An absent table yields an empty list.
    fn get_all_items(&self, table: &str) -> Result<Vec<Record>>;

    /// Shallow-merge `partial` into the stored record and persist it.
    ///
    /// The `id` field is never changed.
    ///
    /// # Returns
    ///
    /// Returns the post-update record, or `Ok(None)` if the key does not exist.
    fn update_item(&self, table: &str, key: &str, partial: Record) -> Result<Option<Record>>;

    /// Remove a record. Absent keys are not an error.
    fn delete_item(&self, table: &str, key: &str) -> Result<()>;

    /// Linear scan filtering on `id`.
    ///
    /// With `regex = false` the `id` must start with `key_part`; with
    /// `regex = true` `key_part` is a regular expression searched anywhere
    /// in the `id`.
    ///
    /// # Errors
    ///
    /// Returns `BackplaneError::InvalidInput` if `key_part` is not a valid regex.
    fn search_by_key_part(&self, table: &str, key_part: &str, regex: bool) -> Result<Vec<Record>> {
        let matcher = KeyMatcher::new(key_part, regex)?;
        let matching = matcher.filter(self.get_all_items(table)?);
        tracing::debug!(
            backend = self.name(),
            table,
            key_part,
            regex,
            found = matching.len(),
            "search_by_key_part"
        );
        Ok(matching)
    }
}
