//! Queue message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// A received message plus the backend handle used to acknowledge it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Receipt handle, pop receipt or local sequence id.
    pub handle: String,
    /// JSON string or mapping, as sent.
    pub body: Value,
}

/// Text sent over the wire: every payload as JSON, so strings stay strings.
pub(crate) fn encode_body(body: &Value) -> Result<String> {
    Ok(serde_json::to_string(body)?)
}

/// Inverse of [`encode_body`]. Text that is not JSON (written by another
/// producer) is returned as a string.
pub(crate) fn decode_body(text: String) -> Value {
    serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))
}

/// Delivery style requested by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Async,
    Block,
    Stream,
}

/// Service-to-service message carried as a queue payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    /// Destination service name.
    pub name: String,
    pub src: String,
    pub method: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub data: Option<Value>,
    pub ts: DateTime<Utc>,
}

impl Envelope {
    pub fn new(
        name: impl Into<String>,
        src: impl Into<String>,
        method: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Envelope {
            id: Uuid::new_v4(),
            name: name.into(),
            src: src.into(),
            method: method.into(),
            encoding: None,
            kind,
            data: None,
            ts: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn into_payload(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_payload(payload: &Value) -> Result<Self> {
        Ok(Envelope::deserialize(payload)?)
    }
}
