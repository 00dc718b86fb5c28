//! Typed CLI failures and their exit codes.
//!
//! Handlers return `anyhow::Error`; `exit_code_for` recovers a specific code
//! from either a `CliError` or a core `BackplaneError` underneath it.

use std::fmt;

use backplane_core::BackplaneError;

use crate::constants::exit_codes;

#[derive(Debug)]
pub enum CliError {
    /// Missing record, empty queue, or unregistered service function.
    NotFound { message: String, hint: Option<String> },
    /// Rejected credentials or token.
    AuthFailed { message: String, hint: Option<String> },
    InvalidInput(String),
}

impl CliError {
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: None,
        }
    }

    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
        }
    }

    fn parts(&self) -> (&str, Option<&str>) {
        match self {
            CliError::NotFound { message, hint } | CliError::AuthFailed { message, hint } => {
                (message, hint.as_deref())
            }
            CliError::InvalidInput(message) => (message, None),
        }
    }
}

/// Renders as the message, then the hint on its own line.
impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts() {
            (message, Some(hint)) => write!(f, "{}\n{}", message, hint),
            (message, None) => f.write_str(message),
        }
    }
}

impl std::error::Error for CliError {}

/// Exit code for any error surfaced from a command handler.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }
    match err.downcast_ref::<BackplaneError>() {
        Some(BackplaneError::InvalidInput(_)) => exit_codes::INVALID_INPUT,
        Some(BackplaneError::PermissionDenied(_)) => exit_codes::PERMISSION_DENIED,
        _ => exit_codes::GENERAL,
    }
}
