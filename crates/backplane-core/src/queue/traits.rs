//! Queue client trait definition.

use serde_json::Value;

use super::types::Message;
use crate::error::Result;

/// Minimal send/receive/acknowledge contract shared by every queue backend.
pub trait QueueClient: Send + Sync {
    /// Short backend name used in logs (e.g. "sqs").
    fn name(&self) -> &'static str;

    fn send_message(&self, body: Value) -> Result<()>;

    /// Non-blocking: returns `Ok(None)` immediately when nothing is available.
    fn receive_message(&self) -> Result<Option<Message>>;

    /// Acknowledge a message by the handle it was received with.
    fn delete_message(&self, handle: &str) -> Result<()>;

    /// Approximate number of messages waiting.
    fn get_message_count(&self) -> Result<usize>;
}
