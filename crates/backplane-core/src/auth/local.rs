//! Self-contained auth provider backed by the storage layer.
//!
//! Users live in the `user` table keyed by username. A token is valid only
//! while it matches the `token` field stored on the user record, which makes
//! sessions exclusive (a new login supersedes the previous token) and lets
//! `logout` revoke access.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{json, Value};

use super::password::{hash_password, validate_password, verify_password, HashCost};
use super::token::{Claims, TokenSigner};
use super::traits::AuthProvider;
use super::types::Identity;
use crate::error::{BackplaneError, Result};
use crate::storage::{record_from_value, Record, StorageEngine};

pub const USER_TABLE: &str = "user";

const SECRET_FIELDS: [&str; 2] = ["password_hash", "token"];

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Usernames are compared without surrounding whitespace.
fn normalize_username(username: &str) -> &str {
    username.trim()
}

/// Copy of a user record without password hash or token.
pub fn sanitize(mut record: Record) -> Record {
    for field in SECRET_FIELDS {
        record.remove(field);
    }
    record
}

pub struct LocalAuthProvider {
    storage: Arc<dyn StorageEngine>,
    signer: TokenSigner,
    cost: HashCost,
    /// Hash checked for unknown users so both failure paths cost the same.
    decoy_hash: OnceCell<String>,
}

impl LocalAuthProvider {
    pub fn new(storage: Arc<dyn StorageEngine>, secret: &[u8], ttl_seconds: u64) -> Result<Self> {
        Ok(LocalAuthProvider {
            storage,
            signer: TokenSigner::new(secret, ttl_seconds)?,
            cost: HashCost::default(),
            decoy_hash: OnceCell::new(),
        })
    }

    /// Override the Argon2 cost used for new hashes.
    pub fn with_hash_cost(mut self, cost: HashCost) -> Self {
        self.cost = cost;
        self
    }

    fn decoy_hash(&self) -> Result<&str> {
        self.decoy_hash
            .get_or_try_init(|| hash_password("decoy-password", self.cost))
            .map(String::as_str)
    }

    fn load_user(&self, username: &str) -> Result<Option<Record>> {
        self.storage.get_item(USER_TABLE, username)
    }

    fn patch_user(&self, username: &str, fields: Value) -> Result<Option<Record>> {
        self.storage
            .update_item(USER_TABLE, username, record_from_value(fields)?)
    }

    /// Verified claims plus the user record, if `token` is the user's current token.
    fn current_session(&self, token: &str) -> Result<Option<(Claims, Record)>> {
        let Some(claims) = self.signer.verify(token) else {
            return Ok(None);
        };
        let Some(user) = self.load_user(&claims.sub)? else {
            tracing::debug!(user = %claims.sub, "token subject no longer exists");
            return Ok(None);
        };
        if user.get("token").and_then(Value::as_str) != Some(token) {
            tracing::debug!(user = %claims.sub, "token superseded or revoked");
            return Ok(None);
        }
        Ok(Some((claims, user)))
    }

    fn identity_of(user: &Record) -> Result<Identity> {
        Identity::from_record(user)
            .ok_or_else(|| BackplaneError::Auth("Stored user record has no id".to_string()))
    }
}

impl AuthProvider for LocalAuthProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn register_user(&self, username: &str, password: &str) -> Result<Record> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(BackplaneError::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }
        validate_password(password)?;
        if self.load_user(username)?.is_some() {
            return Err(BackplaneError::InvalidInput(format!(
                "User already exists: {}",
                username
            )));
        }

        let user = record_from_value(json!({
            "email": username,
            "password_hash": hash_password(password, self.cost)?,
            "roles": [],
            "token": null,
            "login_count": 0,
            "last_login": null,
            "last_unsuccessful_login": null,
            "modified": now_millis(),
        }))?;
        let stored = self.storage.insert_item(USER_TABLE, username, user)?;
        tracing::info!(user = username, "user registered");
        Ok(sanitize(stored))
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<Option<String>> {
        let username = normalize_username(username);
        let Some(user) = self.load_user(username)? else {
            verify_password(password, self.decoy_hash()?);
            tracing::info!(user = username, "login for unknown user");
            return Ok(None);
        };

        let stored_hash = user
            .get("password_hash")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let now = now_millis();
        if !verify_password(password, stored_hash) {
            tracing::info!(user = username, "login failed");
            self.patch_user(
                username,
                json!({ "last_unsuccessful_login": now, "modified": now }),
            )?;
            return Ok(None);
        }

        let token = self.signer.issue(&Self::identity_of(&user)?)?;
        let login_count = user.get("login_count").and_then(Value::as_u64).unwrap_or(0) + 1;
        self.patch_user(
            username,
            json!({
                "token": token,
                "login_count": login_count,
                "last_login": now,
                "modified": now,
            }),
        )?;
        tracing::info!(user = username, login_count, "login succeeded");
        Ok(Some(token))
    }

    fn get_user(&self, token: &str) -> Result<Option<Identity>> {
        match self.current_session(token)? {
            Some((_, user)) => Ok(Some(Self::identity_of(&user)?)),
            None => Ok(None),
        }
    }

    fn refresh_token(&self, old_token: &str) -> Result<Option<String>> {
        let Some((claims, user)) = self.current_session(old_token)? else {
            return Ok(None);
        };
        let token = self.signer.issue(&Self::identity_of(&user)?)?;
        self.patch_user(
            &claims.sub,
            json!({ "token": token, "modified": now_millis() }),
        )?;
        Ok(Some(token))
    }

    fn logout(&self, token: &str) -> Result<bool> {
        let Some((claims, _)) = self.current_session(token)? else {
            return Ok(false);
        };
        self.patch_user(
            &claims.sub,
            json!({ "token": null, "modified": now_millis() }),
        )?;
        tracing::info!(user = %claims.sub, "logged out");
        Ok(true)
    }
}
