//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells, and clap usage errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// General failure (backend, configuration, I/O).
    pub const GENERAL: i32 = 1;

    /// Resource not found (record, queue message, service function).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (bad credentials, expired or revoked token).
    pub const AUTH_FAILED: i32 = 5;

    /// Authenticated, but the role check failed.
    pub const PERMISSION_DENIED: i32 = 6;
}

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BACKPLANE_CONFIG";

/// Environment variable holding a password for non-interactive auth commands.
pub const PASSWORD_ENV: &str = "BACKPLANE_PASSWORD";

/// Prefix for per-setting environment overrides (`BACKPLANE_DATABASE_TYPE`, ...).
pub const ENV_PREFIX: &str = "BACKPLANE_";

/// Resource registered when the config names none.
pub const DEFAULT_RESOURCE: &str = "config";
