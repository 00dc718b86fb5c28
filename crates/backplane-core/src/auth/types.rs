//! Auth data types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{record_id, Record};

/// Sanitized user: never carries password hashes or tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Build from a stored user record. `email` falls back to the id.
    pub fn from_record(record: &Record) -> Option<Self> {
        let id = record_id(record)?.to_string();
        let email = record
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_string();
        let roles = record
            .get("roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Identity { id, email, roles })
    }
}
