//! Handles passed to every service function.

use std::borrow::Cow;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::auth::{AccessPolicy, Identity};
use crate::error::{BackplaneError, Result};
use crate::queue::QueueClient;
use crate::storage::{record_from_value, Record, StorageEngine};

/// Builds the queue handle the first time a service asks for it.
pub type QueueLoader = Arc<dyn Fn() -> Result<Arc<dyn QueueClient>> + Send + Sync>;

/// Storage, queue and caller identity for one invocation.
///
/// Any handle may be absent: `database_type = none` yields no storage, and
/// a caller may run without a queue or without authentication. A deferred
/// queue is only built by services that publish.
#[derive(Clone)]
pub struct ServiceContext {
    pub storage: Option<Arc<dyn StorageEngine>>,
    queue: Arc<OnceCell<Arc<dyn QueueClient>>>,
    queue_loader: Option<QueueLoader>,
    pub identity: Option<Identity>,
    pub policy: AccessPolicy,
}

impl Default for ServiceContext {
    fn default() -> Self {
        ServiceContext {
            storage: None,
            queue: Arc::new(OnceCell::new()),
            queue_loader: None,
            identity: None,
            policy: AccessPolicy::new(false),
        }
    }
}

impl ServiceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageEngine>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_queue(mut self, queue: Arc<dyn QueueClient>) -> Self {
        self.queue = Arc::new(OnceCell::with_value(queue));
        self.queue_loader = None;
        self
    }

    /// Defer queue construction until [`ServiceContext::queue`] is called.
    pub fn with_queue_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn QueueClient>> + Send + Sync + 'static,
    {
        self.queue = Arc::new(OnceCell::new());
        self.queue_loader = Some(Arc::new(loader));
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The storage handle, or a configuration error when storage is disabled.
    pub fn storage(&self) -> Result<&Arc<dyn StorageEngine>> {
        self.storage.as_ref().ok_or_else(|| {
            BackplaneError::Config("Storage is unavailable (database_type is 'none')".to_string())
        })
    }

    /// The queue handle, building a deferred one on first use.
    pub fn queue(&self) -> Result<Option<Arc<dyn QueueClient>>> {
        if let Some(queue) = self.queue.get() {
            return Ok(Some(Arc::clone(queue)));
        }
        match &self.queue_loader {
            Some(loader) => Ok(Some(Arc::clone(self.queue.get_or_try_init(|| loader())?))),
            None => Ok(None),
        }
    }

    /// Apply the access policy to the caller's identity.
    pub fn authorize(&self, required: &[&str]) -> Result<()> {
        self.policy.check(self.identity.as_ref(), required)
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("storage", &self.storage.as_ref().map(|s| s.name()))
            .field("queue", &self.queue.get().map(|q| q.name()))
            .field("queue_deferred", &self.queue_loader.is_some())
            .field("identity", &self.identity)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Positional string argument. Other scalars are accepted in their JSON
/// text form, so an id like `123` reaches the handler as `"123"`.
pub fn arg_str<'a>(args: &'a [Value], index: usize, name: &str) -> Result<Cow<'a, str>> {
    match args.get(index) {
        Some(Value::String(text)) => Ok(Cow::Borrowed(text)),
        Some(scalar @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => {
            Ok(Cow::Owned(scalar.to_string()))
        }
        Some(_) => Err(BackplaneError::InvalidInput(format!(
            "Argument {} ({}) must be a string",
            index, name
        ))),
        None => Err(BackplaneError::InvalidInput(format!(
            "Missing argument {} ({})",
            index, name
        ))),
    }
}

/// Positional record argument.
pub fn arg_record(args: &[Value], index: usize, name: &str) -> Result<Record> {
    let value = args.get(index).cloned().ok_or_else(|| {
        BackplaneError::InvalidInput(format!("Missing argument {} ({})", index, name))
    })?;
    record_from_value(value)
}
