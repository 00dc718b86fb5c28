//! Auth provider selection.

use std::sync::Arc;

use super::cognito::CognitoAuthProvider;
use super::local::LocalAuthProvider;
use super::traits::AuthProvider;
use crate::config::Settings;
use crate::error::{BackplaneError, Result};
use crate::storage::StorageEngine;

/// Region embedded in a user pool id (`us-east-1_AbCdEf`), if any.
fn pool_region(user_pool_id: Option<&str>) -> Option<&str> {
    user_pool_id
        .and_then(|id| id.split_once('_'))
        .map(|(region, _)| region)
        .filter(|region| !region.is_empty())
}

/// Build the provider named by `settings.auth_type` (`local | cognito`).
///
/// The local provider persists users through `storage` and needs
/// `jwt_secret`.
///
/// # Errors
///
/// Returns `BackplaneError::Config` for an unknown type or a missing parameter.
pub fn get_auth_provider(
    settings: &Settings,
    storage: Option<Arc<dyn StorageEngine>>,
) -> Result<Arc<dyn AuthProvider>> {
    let auth_type = settings.auth_type.trim().to_ascii_lowercase();
    tracing::debug!(auth_type = %auth_type, "building auth provider");

    match auth_type.as_str() {
        "local" => {
            let storage = storage.ok_or_else(|| {
                BackplaneError::Config(
                    "auth_type 'local' needs a storage backend (database_type is 'none')"
                        .to_string(),
                )
            })?;
            let secret = settings
                .jwt_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    BackplaneError::Config("auth_type 'local' requires jwt_secret".to_string())
                })?;
            Ok(Arc::new(LocalAuthProvider::new(
                storage,
                secret.as_bytes(),
                settings.token_ttl_seconds,
            )?))
        }
        "cognito" => {
            let client_id = settings.cognito_client_id.clone().ok_or_else(|| {
                BackplaneError::Config("auth_type 'cognito' requires cognito_client_id".to_string())
            })?;
            let region = pool_region(settings.cognito_user_pool_id.as_deref())
                .unwrap_or(&settings.region_name);
            Ok(Arc::new(CognitoAuthProvider::new(
                region,
                client_id,
                settings.cognito_client_secret.clone(),
                settings.endpoint_url.as_deref(),
            )?))
        }
        other => Err(BackplaneError::Config(format!(
            "Unsupported auth type: {}",
            other
        ))),
    }
}
