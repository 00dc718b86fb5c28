//! HS256 session tokens for the local provider.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::Identity;
use crate::config::REDACTED;
use crate::error::{BackplaneError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    pub exp: u64,
    pub iat: u64,
    /// Unique per token, so two tokens issued in the same second differ.
    pub jti: String,
    /// Non-secret snapshot of the user at issuance.
    pub user: Identity,
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &REDACTED)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

fn now_seconds() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(BackplaneError::Config(
                "jwt_secret cannot be empty".to_string(),
            ));
        }
        Ok(TokenSigner {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_seconds,
        })
    }

    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let iat = now_seconds();
        let claims = Claims {
            sub: identity.id.clone(),
            exp: iat.saturating_add(self.ttl_seconds),
            iat,
            jti: Uuid::new_v4().to_string(),
            user: identity.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| BackplaneError::Auth(format!("Failed to sign token: {}", e)))
    }

    /// Signature and expiry check. Invalid tokens yield `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                tracing::debug!(error = %err, "token rejected");
                None
            }
        }
    }
}
