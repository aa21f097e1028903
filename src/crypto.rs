//! Password hashing and verification.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config;
use crate::error::Result;

/// Argon2id password hasher built from configuration.
#[derive(Clone, Default)]
pub struct Crypto {
    hasher: Argon2<'static>,
}

impl Crypto {
    /// Create a new [`Crypto`] instance.
    pub fn new(config: Option<config::Argon2>) -> Result<Self> {
        let config = config.unwrap_or_default();
        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )?;

        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password into a PHC string.
    pub fn hash_password(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .hasher
            .hash_password(plaintext.as_bytes(), &salt)?
            .to_string())
    }

    /// Check a plaintext password against a stored PHC string.
    /// The comparison is performed by argon2 and is timing-safe.
    pub fn verify_password(&self, plaintext: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)?;
        match self.hasher.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let crypto = Crypto::new(Some(config::Argon2 {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        }))
        .unwrap();

        let hash = crypto.hash_password("Password1234!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(crypto.verify_password("Password1234!", &hash).unwrap());
        assert!(!crypto.verify_password("WrongPassword", &hash).unwrap());
    }
}
