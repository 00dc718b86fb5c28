//! Config path resolution.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{
    apply_env_overrides, default_config_path, default_data_dir, read_config, BackplaneConfig,
};
use crate::errors::CliError;

/// Resolve the config file path: `--config` / `BACKPLANE_CONFIG`, then XDG.
pub fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.config.clone() {
        return Ok(path);
    }
    default_config_path()
}

/// Load the config with environment overrides applied.
///
/// A missing default config falls back to built-in defaults with storage
/// under the XDG data dir. A config path given explicitly must exist.
pub fn load_config(cli: &Cli) -> anyhow::Result<BackplaneConfig> {
    let path = resolve_config_path(cli)?;
    let mut config = if path.exists() {
        tracing::debug!(path = %path.display(), "loading config");
        read_config(&path)?
    } else if cli.config.is_some() {
        return Err(CliError::not_found(
            missing_config_message(&path),
            "Hint: Run `backplane init` to create one.",
        )
        .into());
    } else {
        tracing::debug!("no config file, using defaults");
        let mut config = BackplaneConfig::default();
        config.backplane.base_dir = default_data_dir()?;
        config
    };

    config.backplane = apply_env_overrides(config.backplane, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Error message when the config file is missing.
pub fn missing_config_message(config_path: &Path) -> String {
    format!("No config found at {}", config_path.display())
}
