//! Password hashing with Argon2id.
//!
//! Hashes are stored as PHC strings, so the salt and cost parameters travel
//! with each hash and verification works across parameter changes.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::{BackplaneError, Result};

/// Argon2id memory cost: 64 MB (64 * 1024 KB).
pub const ARGON2_MEMORY_KB: u32 = 64 * 1024;
pub const ARGON2_ITERATIONS: u32 = 3;
pub const ARGON2_PARALLELISM: u32 = 1;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const SALT_LENGTH: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kb: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        HashCost {
            memory_kb: ARGON2_MEMORY_KB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

impl HashCost {
    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kb, self.iterations, self.parallelism, None)
            .map_err(|e| BackplaneError::Config(format!("Invalid Argon2 params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Reject empty or short passwords.
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(BackplaneError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(BackplaneError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str, cost: HashCost) -> Result<String> {
    let mut salt_bytes = [0u8; SALT_LENGTH];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| BackplaneError::Auth(format!("Failed to generate salt: {}", e)))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| BackplaneError::Auth(format!("Failed to encode salt: {}", e)))?;

    let hash = cost
        .hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| BackplaneError::Auth(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
