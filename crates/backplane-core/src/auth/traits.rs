//! Auth provider trait definition.

use super::types::Identity;
use crate::error::Result;
use crate::storage::Record;

/// Token-based authentication contract.
///
/// Credential and token failures are ordinary outcomes: `Ok(None)` or
/// `Ok(false)`. Errors are reserved for invalid input (duplicate user,
/// weak password) and backend failures.
pub trait AuthProvider: Send + Sync {
    /// Short provider name used in logs (e.g. "local").
    fn name(&self) -> &'static str;

    /// Create a user. Returns the sanitized user record.
    fn register_user(&self, username: &str, password: &str) -> Result<Record>;

    /// Check credentials and issue a token.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<String>>;

    /// Resolve a token to the identity it was issued for.
    fn get_user(&self, token: &str) -> Result<Option<Identity>>;

    /// Exchange a valid token for a new one.
    fn refresh_token(&self, old_token: &str) -> Result<Option<String>>;

    /// Invalidate a token. Returns false if it was not valid.
    fn logout(&self, token: &str) -> Result<bool>;
}
