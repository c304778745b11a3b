//! Password hashing
//!
//! Passwords are stored as Argon2id PHC strings. The encoder is a trait so
//! that the authentication provider can be handed a different strategy.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::debug;

use crate::error::AuthError;

/// A valid Argon2 hash that no password will ever match. Verified against
/// when an account does not exist so that both paths cost the same.
pub(crate) const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nX2F0dGFja19wcmV2ZW50aW9u$K8rI5T7VdQ8xkO0GqK5K2w";

/// One-way password hashing strategy
pub trait PasswordEncoder: Send + Sync {
    /// Hash a raw password
    fn encode(&self, raw: &str) -> Result<String, AuthError>;

    /// Check a raw password against a stored hash
    fn matches(&self, raw: &str, encoded: &str) -> Result<bool, AuthError>;
}

/// Argon2id encoder with the crate's default parameters
#[derive(Default, Clone)]
pub struct Argon2PasswordEncoder {
    argon2: Argon2<'static>,
}

impl Argon2PasswordEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(raw.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswordHash(e.to_string()))
    }

    fn matches(&self, raw: &str, encoded: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(encoded).map_err(|e| {
            debug!("Failed to parse password hash: {}", e);
            AuthError::PasswordHash(e.to_string())
        })?;
        Ok(self.argon2.verify_password(raw.as_bytes(), &parsed).is_ok())
    }
}

/// Hash a password with the default encoder
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Argon2PasswordEncoder::new().encode(password)
}

/// Verify a password against a hash with the default encoder
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    Argon2PasswordEncoder::new().matches(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_salted_hashes_differ() {
        let encoder = Argon2PasswordEncoder::new();
        let first = encoder.encode("password").unwrap();
        let second = encoder.encode("password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_dummy_hash_never_matches() {
        assert!(!verify_password("", DUMMY_HASH).unwrap());
        assert!(!verify_password("password", DUMMY_HASH).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(matches!(
            verify_password("password", "not-a-hash"),
            Err(AuthError::PasswordHash(_))
        ));
    }
}
