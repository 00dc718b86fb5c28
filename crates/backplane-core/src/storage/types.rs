//! Core data types for the storage layer.
//!
//! A record is an opaque JSON object. The only field the storage layer
//! interprets is `id`, which always mirrors the key the record is stored
//! under.

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{BackplaneError, Result};

/// A persisted entity: field name to JSON value, always carrying `id`.
pub type Record = Map<String, Value>;

/// Name of the identifier field.
pub const ID_FIELD: &str = "id";

/// Return `record` with its `id` field forced to `key`.
pub fn with_id(mut record: Record, key: &str) -> Record {
    record.insert(ID_FIELD.to_string(), Value::String(key.to_string()));
    record
}

/// The record's `id`, if it is a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Shallow-merge `partial` into `base`. The `id` field is never overwritten.
pub fn merge_into(base: &mut Record, partial: &Record) {
    for (field, value) in partial {
        if field == ID_FIELD {
            continue;
        }
        base.insert(field.clone(), value.clone());
    }
}

/// Convert an arbitrary JSON value into a record.
///
/// # Errors
///
/// Returns `BackplaneError::InvalidInput` if the value is not a JSON object.
pub fn record_from_value(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackplaneError::InvalidInput(format!(
            "Record must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// How `search_by_key_part` compares a record id against the search term.
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    /// `id` starts with the term.
    Prefix(String),
    /// The compiled term matches anywhere in `id`.
    Pattern(Regex),
}

impl KeyMatcher {
    /// Build a matcher; `regex = true` compiles `key_part` as a regular expression.
    pub fn new(key_part: &str, regex: bool) -> Result<Self> {
        if regex {
            Ok(KeyMatcher::Pattern(Regex::new(key_part)?))
        } else {
            Ok(KeyMatcher::Prefix(key_part.to_string()))
        }
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            KeyMatcher::Prefix(prefix) => id.starts_with(prefix.as_str()),
            KeyMatcher::Pattern(pattern) => pattern.is_match(id),
        }
    }

    /// Keep the records whose string `id` matches. Records without one are dropped.
    pub fn filter(&self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .filter(|record| record_id(record).is_some_and(|id| self.matches(id)))
            .collect()
    }
}
