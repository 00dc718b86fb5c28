//! Application context for the Backplane CLI.
//!
//! Bundles CLI arguments with the lazily-built backends so each command
//! constructs only what it touches: `records` never builds an auth
//! provider, `queue` never opens storage.

use std::sync::Arc;

use once_cell::unsync::OnceCell;

use backplane_core::auth::{get_auth_provider, AccessPolicy, AuthProvider, Identity};
use backplane_core::dispatch::{register_resource, ServiceContext, ServiceRegistry};
use backplane_core::queue::{QueueClient, QueueRegistry};
use backplane_core::storage::{get_database, StorageEngine};
use backplane_core::Settings;

use crate::cli::Cli;
use crate::config::BackplaneConfig;
use crate::errors::CliError;

use super::resolver::load_config;

/// Application context that bundles CLI args with configured backends.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<BackplaneConfig>,
    storage: OnceCell<Option<Arc<dyn StorageEngine>>>,
    auth: OnceCell<Arc<dyn AuthProvider>>,
    services: OnceCell<ServiceRegistry>,
    queues: Arc<QueueRegistry>,
}

impl<'a> AppContext<'a> {
    /// Create a new application context from CLI arguments.
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            storage: OnceCell::new(),
            auth: OnceCell::new(),
            services: OnceCell::new(),
            queues: Arc::new(QueueRegistry::new()),
        }
    }

    /// Get the CLI arguments.
    pub fn cli(&self) -> &Cli {
        self.cli
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Get the loaded config, reading it on first use.
    pub fn config(&self) -> anyhow::Result<&BackplaneConfig> {
        self.config.get_or_try_init(|| load_config(self.cli))
    }

    pub fn settings(&self) -> anyhow::Result<&Settings> {
        Ok(&self.config()?.backplane)
    }

    /// Storage backend, or `None` when `database_type = none`.
    pub fn storage(&self) -> anyhow::Result<Option<Arc<dyn StorageEngine>>> {
        let storage = self
            .storage
            .get_or_try_init(|| get_database(self.settings()?).map_err(anyhow::Error::from))?;
        Ok(storage.clone())
    }

    /// Storage backend, failing when storage is disabled.
    pub fn require_storage(&self) -> anyhow::Result<Arc<dyn StorageEngine>> {
        self.storage()?.ok_or_else(|| {
            anyhow::anyhow!("Storage is disabled (database_type = \"none\")")
        })
    }

    pub fn auth(&self) -> anyhow::Result<Arc<dyn AuthProvider>> {
        let auth = self.auth.get_or_try_init(|| {
            let storage = self.storage()?;
            get_auth_provider(self.settings()?, storage).map_err(anyhow::Error::from)
        })?;
        Ok(Arc::clone(auth))
    }

    /// Queue client for `name`, defaulting to `queue_name` from the config.
    pub fn queue(&self, name: Option<&str>) -> anyhow::Result<Arc<dyn QueueClient>> {
        let settings = self.settings()?;
        let name = name.unwrap_or(&settings.queue_name);
        Ok(self
            .queues
            .get_queue_client(name, &settings.queue_type, &settings.queue_params())?)
    }

    /// Service registry with CRUD services for every configured resource.
    pub fn services(&self) -> anyhow::Result<&ServiceRegistry> {
        self.services.get_or_try_init(|| {
            let mut registry = ServiceRegistry::new();
            for resource in &self.config()?.services.resources {
                register_resource(&mut registry, resource);
            }
            tracing::debug!(functions = registry.count(), "service registry built");
            Ok(registry)
        })
    }

    /// Identity for `token`, failing if the token is not accepted.
    pub fn identify(&self, token: &str) -> anyhow::Result<Identity> {
        self.auth()?.get_user(token)?.ok_or_else(|| {
            CliError::auth_failed_with_hint(
                "Invalid or expired token",
                "Hint: Run `backplane auth login <username>` for a new one.",
            )
            .into()
        })
    }

    /// Context for a service call made with an optional session token.
    ///
    /// The queue is built only if a service publishes to it.
    pub fn service_context(&self, token: Option<&str>) -> anyhow::Result<ServiceContext> {
        let settings = self.settings()?;
        let mut ctx = ServiceContext::new().with_policy(AccessPolicy::new(settings.auth_enabled));
        if let Some(storage) = self.storage()? {
            ctx = ctx.with_storage(storage);
        }
        let queues = Arc::clone(&self.queues);
        let name = settings.queue_name.clone();
        let queue_type = settings.queue_type.clone();
        let params = settings.queue_params();
        ctx = ctx.with_queue_loader(move || queues.get_queue_client(&name, &queue_type, &params));
        if let Some(token) = token {
            ctx = ctx.with_identity(self.identify(token)?);
        }
        Ok(ctx)
    }
}
