use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use backplane_core::{Settings, REDACTED};

use crate::constants::{DEFAULT_RESOURCE, ENV_PREFIX};


/// Settings that may be overridden but are never printed.
const SECRET_KEYS: [&str; 5] = [
    "aws_secret_access_key",
    "aws_session_token",
    "connection_string",
    "jwt_secret",
    "cognito_client_secret",
];

/// On-disk config: backend settings plus the CLI's service table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BackplaneConfig {
    #[serde(default)]
    pub backplane: Settings,
    #[serde(default)]
    pub services: ServicesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicesSection {
    /// Resources that get generic CRUD services (`<resource>_service`).
    pub resources: Vec<String>,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            resources: vec![DEFAULT_RESOURCE.to_string()],
        }
    }
}

impl BackplaneConfig {
    /// Starter config with local backends and a fresh signing secret.
    pub fn new(database_type: String, base_dir: PathBuf, jwt_secret: String) -> Self {
        Self {
            backplane: Settings {
                database_type,
                base_dir,
                jwt_secret: Some(jwt_secret),
                ..Settings::default()
            },
            services: ServicesSection::default(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    xdg_data_dir()
}

pub fn read_config(path: &Path) -> anyhow::Result<BackplaneConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &BackplaneConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

/// Apply `BACKPLANE_<SETTING>` variables from `lookup` on top of `settings`.
///
/// Values are parsed according to the type of the setting they replace.
pub fn apply_env_overrides(
    settings: Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let Value::Object(mut fields) = serde_json::to_value(&settings)? else {
        return Ok(settings);
    };

    for (key, current) in fields.iter_mut() {
        let var = format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase());
        let Some(raw) = lookup(&var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        *current = match current {
            Value::Bool(_) => Value::Bool(parse_bool(&raw).ok_or_else(|| {
                anyhow::anyhow!("{} must be true or false, got '{}'", var, raw)
            })?),
            Value::Number(_) => Value::from(raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("{} must be a non-negative integer, got '{}'", var, raw)
            })?),
            _ => Value::String(raw),
        };
        tracing::debug!(setting = %key, "setting overridden from environment");
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Settings as a TOML document with secrets replaced.
pub fn redacted_toml(settings: &Settings) -> anyhow::Result<String> {
    let mut value = toml::Value::try_from(settings)?;
    if let Some(table) = value.as_table_mut() {
        for key in SECRET_KEYS {
            if let Some(secret) = table.get_mut(key) {
                *secret = toml::Value::String(REDACTED.to_string());
            }
        }
    }
    Ok(toml::to_string_pretty(&value)?)
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("backplane"));
        }
    }
    Ok(home_dir()?.join(".config").join("backplane"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("backplane"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("backplane"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_round_trip_through_toml() {
        let config = BackplaneConfig::new(
            "filesystem".to_string(),
            PathBuf::from("/tmp/bp"),
            "secret".to_string(),
        );
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: BackplaneConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: BackplaneConfig =
            toml::from_str("[backplane]\ndatabase_type = \"none\"\n").unwrap();
        assert_eq!(parsed.backplane.database_type, "none");
        assert_eq!(parsed.backplane.queue_type, "local");
        assert_eq!(parsed.services.resources, vec!["config"]);
    }

    #[test]
    fn test_env_overrides_by_type() {
        let settings = apply_env_overrides(
            Settings::default(),
            lookup(&[
                ("BACKPLANE_DATABASE_TYPE", "filesystem"),
                ("BACKPLANE_AUTH_ENABLED", "false"),
                ("BACKPLANE_TOKEN_TTL_SECONDS", "60"),
                ("BACKPLANE_JWT_SECRET", "s3cret"),
                ("BACKPLANE_QUEUE_TYPE", " "),
            ]),
        )
        .unwrap();
        assert_eq!(settings.database_type, "filesystem");
        assert!(!settings.auth_enabled);
        assert_eq!(settings.token_ttl_seconds, 60);
        assert_eq!(settings.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(settings.queue_type, "local");
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let result = apply_env_overrides(
            Settings::default(),
            lookup(&[("BACKPLANE_AUTH_ENABLED", "maybe")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_redacted_toml_hides_secrets() {
        let settings = Settings {
            jwt_secret: Some("top-secret".to_string()),
            ..Settings::default()
        };
        let text = redacted_toml(&settings).unwrap();
        assert!(!text.contains("top-secret"));
        assert!(text.contains(REDACTED));
        assert!(text.contains("database_type"));
    }
}
