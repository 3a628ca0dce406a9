//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::PasswordConfig;
use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Argon2id RFC recommendations
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a password with Argon2id, using secure defaults if no parameters are given.
pub fn hash_string_with_params(input: &str, params: Option<Argon2Params>) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.unwrap_or_default().to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash string: {e}"),
    })?;

    Ok(hash.to_string())
}

pub fn hash_string(input: &str) -> Result<String, Error> {
    hash_string_with_params(input, None)
}

/// Verify a password against a hash.
///
/// Verification uses the parameters embedded in the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Hash on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_password(password: String, params: Argon2Params) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_string_with_params(&password, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}

/// Check a candidate password against the configured length bounds.
pub fn validate_length(password: &str, config: &PasswordConfig) -> Result<(), Error> {
    let length = password.chars().count();
    if length < config.min_length {
        return Err(Error::bad_request(format!(
            "Password must be at least {} characters",
            config.min_length
        )));
    }
    if length > config.max_length {
        return Err(Error::bad_request(format!(
            "Password must be no more than {} characters",
            config.max_length
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 128,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_string_hashing() {
        let hash = hash_string_with_params("test_password_123", Some(fast_params())).unwrap();
        assert!(!hash.is_empty());
        assert!(verify_string("test_password_123", &hash).unwrap());
        assert!(!verify_string("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hash1 = hash_string_with_params("same_password", Some(fast_params())).unwrap();
        let hash2 = hash_string_with_params("same_password", Some(fast_params())).unwrap();

        // salted
        assert_ne!(hash1, hash2);
        assert!(verify_string("same_password", &hash1).unwrap());
        assert!(verify_string("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(verify_string("password", "not-a-phc-string").is_err());
    }

    #[tokio::test]
    async fn test_blocking_pool_helpers() {
        let hash = hash_password("hunter22".to_string(), fast_params()).await.unwrap();
        assert!(verify_password("hunter22".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter23".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_length_bounds() {
        let config = PasswordConfig::default();
        assert!(validate_length("short", &config).is_err());
        assert!(validate_length("long enough", &config).is_ok());
        assert!(validate_length(&"x".repeat(config.max_length + 1), &config).is_err());
    }
}
