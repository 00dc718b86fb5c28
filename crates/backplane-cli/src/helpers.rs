//! Input and parsing helper functions for the CLI.

use std::io::{self, IsTerminal, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dialoguer::Password;
use serde_json::Value;
use zeroize::Zeroizing;

use backplane_core::storage::{record_from_value, Record};

use crate::constants::PASSWORD_ENV;
use crate::errors::CliError;

const SECRET_BYTES: usize = 32;

/// Parse a positional argument: JSON when it parses, otherwise a string.
pub fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Parse a JSON object argument into a record.
pub fn parse_record(raw: &str) -> anyhow::Result<Record> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CliError::invalid_input(format!("Invalid JSON: {}", e)))?;
    record_from_value(value).map_err(|e| CliError::invalid_input(e.to_string()).into())
}

/// Read a password from stdin, BACKPLANE_PASSWORD, or an interactive prompt.
pub fn read_password(from_stdin: bool, no_input: bool, confirm: bool) -> anyhow::Result<Zeroizing<String>> {
    if from_stdin {
        let mut buffer = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buffer)?;
        let trimmed = Zeroizing::new(buffer.trim_end_matches(['\r', '\n']).to_string());
        if trimmed.is_empty() {
            return Err(CliError::invalid_input("No password on stdin").into());
        }
        return Ok(trimmed);
    }

    if let Ok(value) = std::env::var(PASSWORD_ENV) {
        if !value.is_empty() {
            return Ok(Zeroizing::new(value));
        }
    }

    if no_input || !io::stdin().is_terminal() {
        return Err(CliError::invalid_input(format!(
            "No password provided and no TTY available. Use --password-stdin or set {}.",
            PASSWORD_ENV
        ))
        .into());
    }

    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read password: {}", e))
}

/// Random signing secret for a new config.
pub fn generate_secret() -> anyhow::Result<String> {
    let mut bytes = Zeroizing::new([0u8; SECRET_BYTES]);
    getrandom::getrandom(&mut bytes[..])
        .map_err(|e| anyhow::anyhow!("Failed to generate secret: {}", e))?;
    Ok(STANDARD.encode(&bytes[..]))
}
