//! Password hashing and verification with Argon2id
//!
//! [`CredentialHasher::hash`] generates a random salt via [`OsRng`] and returns
//! a PHC-format string (e.g. `$argon2id$v=19$m=19456,t=2,p=1$...`) stored in the
//! `password_hash` column. [`CredentialHasher::verify`] parses that string and
//! checks a candidate password against it using the parameters it records, so
//! raising the configured cost does not invalidate existing hashes.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use thiserror::Error;

use crate::config::PasswordConfig;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    Params(String),
    #[error("Failed to hash password: {0}")]
    Hash(String),
    #[error("Invalid password hash: {0}")]
    Malformed(String),
}

/// Argon2id hasher with configured cost.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password. Returns a PHC-format string.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a PHC-format hash string.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Malformed(e.to_string()))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialHasher {
        CredentialHasher::new(&PasswordConfig {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_is_salted_phc_string() {
        let hasher = cheap();
        let a = hasher.hash("password1").unwrap();
        let b = hasher.hash("password1").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(!a.contains("password1"));
    }

    #[test]
    fn test_verify() {
        let hasher = cheap();
        let hash = hasher.hash("password1").unwrap();
        assert!(hasher.verify("password1", &hash).unwrap());
        assert!(!hasher.verify("password2", &hash).unwrap());
    }

    #[test]
    fn test_verify_uses_params_from_hash() {
        let stronger = CredentialHasher::new(&PasswordConfig {
            memory_kib: 128,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = stronger.hash("password1").unwrap();
        assert!(cheap().verify("password1", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(cheap().verify("x", "not-a-hash").is_err());
    }

    #[test]
    fn test_rejects_invalid_params() {
        let result = CredentialHasher::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        });
        assert!(matches!(result, Err(PasswordError::Params(_))));
    }
}
