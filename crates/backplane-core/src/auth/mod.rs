//! Authentication abstraction for Backplane.
//!
//! `AuthProvider` is a token-based contract with two implementations:
//! a local provider (Argon2id password hashes, HS256 tokens, users stored
//! through the storage layer) and Amazon Cognito. Role checks live in
//! [`roles`].

pub mod cognito;
pub mod factory;
pub mod local;
pub mod password;
pub mod roles;
pub mod token;
pub mod traits;
pub mod types;

// Re-export public types
pub use cognito::CognitoAuthProvider;
pub use factory::get_auth_provider;
pub use local::{LocalAuthProvider, USER_TABLE};
pub use password::HashCost;
pub use roles::{require_roles, AccessPolicy, ADMIN_ROLE};
pub use token::{Claims, TokenSigner};
pub use traits::AuthProvider;
pub use types::Identity;
