//! Backend selection settings.
//!
//! `Settings` is the flat configuration mapping consumed by the storage,
//! queue and auth factories. The CLI fills it from a TOML file plus
//! environment overrides; library users can build it directly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aws::{AwsConfig, AwsCredentials, DEFAULT_REGION};
use crate::queue::QueueParams;

pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3600;

/// Stands in for secrets in `Debug` output and printed configuration.
pub const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// `tinydb | dynamodb | s3 | filesystem | none`
    pub database_type: String,
    /// `local | sqs | azure | noop`
    pub queue_type: String,
    /// `local | cognito`
    pub auth_type: String,
    /// When false, role checks always pass.
    pub auth_enabled: bool,

    #[serde(alias = "work_dir")]
    pub base_dir: PathBuf,
    pub bucket_name: Option<String>,
    pub table_prefix: String,

    pub region_name: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    pub endpoint_url: Option<String>,

    pub queue_name: String,
    pub queue_url: Option<String>,
    pub connection_string: Option<String>,

    pub jwt_secret: Option<String>,
    pub token_ttl_seconds: u64,
    pub cognito_user_pool_id: Option<String>,
    pub cognito_client_id: Option<String>,
    pub cognito_client_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_type: "tinydb".to_string(),
            queue_type: "local".to_string(),
            auth_type: "local".to_string(),
            auth_enabled: true,
            base_dir: PathBuf::from("data"),
            bucket_name: None,
            table_prefix: String::new(),
            region_name: DEFAULT_REGION.to_string(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_session_token: None,
            endpoint_url: None,
            queue_name: "default".to_string(),
            queue_url: None,
            connection_string: None,
            jwt_secret: None,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            cognito_user_pool_id: None,
            cognito_client_id: None,
            cognito_client_secret: None,
        }
    }
}

impl Settings {
    /// AWS connection details, falling back to the standard AWS_* env vars
    /// for credentials.
    pub fn aws_config(&self) -> AwsConfig {
        AwsConfig {
            region: self.region_name.clone(),
            credentials: AwsCredentials::resolve(
                self.aws_access_key_id.as_deref(),
                self.aws_secret_access_key.as_deref(),
                self.aws_session_token.as_deref(),
            ),
            endpoint_url: self.endpoint_url.clone(),
        }
    }

    /// Backend parameters for the queue factory.
    pub fn queue_params(&self) -> QueueParams {
        QueueParams {
            aws: self.aws_config(),
            queue_url: self.queue_url.clone(),
            connection_string: self.connection_string.clone(),
            queue_name: Some(self.queue_name.clone()),
        }
    }
}
