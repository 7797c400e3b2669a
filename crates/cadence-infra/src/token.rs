//! Opaque bearer tokens for API users.
//!
//! Tokens are `cadence_` followed by 32 random hex characters. Only the
//! lowercase hex SHA-256 digest of a token is ever persisted.

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const TOKEN_PREFIX: &str = "cadence_";

/// Issue a fresh token. The plaintext is shown to the user once.
pub fn generate_token() -> String {
    format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple())
}

pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
