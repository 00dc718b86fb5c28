//! Named queue handles, memoized for the lifetime of the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::factory::{build_queue_client, QueueParams};
use super::traits::QueueClient;
use crate::error::{BackplaneError, Result};

struct Entry {
    queue_type: String,
    client: Arc<dyn QueueClient>,
}

/// Maps a logical queue name to one live client.
///
/// Owned by the composition root and passed to consumers. Get-or-create
/// runs under a single lock, so concurrent first callers for a name always
/// end up sharing the same client.
#[derive(Default)]
pub struct QueueRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the client registered under `name`, creating it on first use.
    ///
    /// The first call for a name decides the backend. Later calls with a
    /// different `queue_type` get the cached client and a warning is logged.
    pub fn get_queue_client(
        &self,
        name: &str,
        queue_type: &str,
        params: &QueueParams,
    ) -> Result<Arc<dyn QueueClient>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| BackplaneError::Queue("Queue registry lock poisoned".to_string()))?;

        if let Some(entry) = entries.get(name) {
            if !entry.queue_type.eq_ignore_ascii_case(queue_type) {
                tracing::warn!(
                    name,
                    requested = queue_type,
                    cached = %entry.queue_type,
                    "queue already registered with a different type, returning cached client"
                );
            }
            return Ok(Arc::clone(&entry.client));
        }

        let client = build_queue_client(queue_type, params)?;
        tracing::info!(name, queue_type, "queue client registered");
        entries.insert(
            name.to_string(),
            Entry {
                queue_type: queue_type.to_string(),
                client: Arc::clone(&client),
            },
        );
        Ok(client)
    }

    /// Names of registered queues, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.entries.lock() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

impl std::fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRegistry")
            .field("names", &self.names())
            .finish()
    }
}
