//! Role-based authorization checks.

use super::types::Identity;
use crate::error::{BackplaneError, Result};

/// Role that passes every check.
pub const ADMIN_ROLE: &str = "admin";

/// Require `identity` to hold one of `required`.
///
/// An empty `required` set admits any identity; `admin` bypasses the check.
///
/// # Errors
///
/// Returns `BackplaneError::PermissionDenied` when no role matches.
pub fn require_roles(identity: &Identity, required: &[&str]) -> Result<()> {
    if required.is_empty() || identity.has_role(ADMIN_ROLE) {
        return Ok(());
    }
    if required.iter().any(|role| identity.has_role(role)) {
        return Ok(());
    }
    tracing::info!(user = %identity.id, ?required, "access denied");
    Err(BackplaneError::PermissionDenied(format!(
        "{} lacks required role ({})",
        identity.id,
        required.join(", ")
    )))
}

/// Role check with an on/off switch (`auth_enabled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    enabled: bool,
}

impl AccessPolicy {
    pub fn new(enabled: bool) -> Self {
        AccessPolicy { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// With checks disabled everything passes; otherwise an identity is
    /// required and must satisfy [`require_roles`].
    pub fn check(&self, identity: Option<&Identity>, required: &[&str]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match identity {
            Some(identity) => require_roles(identity, required),
            None => Err(BackplaneError::PermissionDenied(
                "Authentication required".to_string(),
            )),
        }
    }
}
