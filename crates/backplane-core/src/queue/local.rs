//! In-process FIFO queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use super::traits::QueueClient;
use super::types::Message;
use crate::error::{BackplaneError, Result};

/// Strict FIFO within one process. Receiving removes the message, so
/// there is no redelivery and `delete_message` has nothing to do.
#[derive(Debug, Default)]
pub struct LocalQueue {
    messages: Mutex<VecDeque<Message>>,
    next_id: AtomicU64,
}

impl LocalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn messages(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<Message>>> {
        self.messages
            .lock()
            .map_err(|_| BackplaneError::Queue("Local queue lock poisoned".to_string()))
    }
}

impl QueueClient for LocalQueue {
    fn name(&self) -> &'static str {
        "local"
    }

    fn send_message(&self, body: Value) -> Result<()> {
        let handle = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.messages()?.push_back(Message { handle, body });
        Ok(())
    }

    fn receive_message(&self) -> Result<Option<Message>> {
        Ok(self.messages()?.pop_front())
    }

    fn delete_message(&self, _handle: &str) -> Result<()> {
        Ok(())
    }

    fn get_message_count(&self) -> Result<usize> {
        Ok(self.messages()?.len())
    }
}
