//! Error types for Backplane core operations.
//!
//! This module defines the error hierarchy shared by the storage, queue,
//! auth and dispatch layers. Absence is never an error here: a missing record
//! is `Ok(None)`, a failed login is `Ok(None)`, a missing service function is
//! `Invocation::NotRegistered`. Errors are reserved for misconfiguration and
//! backend failures; the CLI layer maps them to exit codes.

use thiserror::Error;

/// Result type alias for Backplane operations.
pub type Result<T> = std::result::Result<T, BackplaneError>;

/// Core error type for Backplane operations.
#[derive(Debug, Error)]
pub enum BackplaneError {
    /// Unrecognised backend discriminator or missing backend parameter
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Queue backend error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Auth provider error (not credential mismatches, which are `Ok(None)`)
    #[error("Auth error: {0}")]
    Auth(String),

    /// Invalid caller input (bad regex, duplicate user, weak password)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Role check failed
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A cloud service answered with an error payload
    #[error("{service} error {code}: {message}")]
    Service {
        service: &'static str,
        code: String,
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Generic error (fallback)
    #[error("{0}")]
    Other(String),
}

impl BackplaneError {
    pub(crate) fn service(
        service: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        BackplaneError::Service {
            service,
            code: code.into(),
            message: message.into(),
        }
    }

    /// The service error code, if this is a cloud service error.
    pub fn service_code(&self) -> Option<&str> {
        match self {
            BackplaneError::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

impl From<regex::Error> for BackplaneError {
    fn from(err: regex::Error) -> Self {
        BackplaneError::InvalidInput(format!("Invalid pattern: {}", err))
    }
}
