//! Password hashing module
//!
//! Argon2id hashing keyed with the application secret as a pepper. Hashes
//! are PHC strings carrying the algorithm, parameters and salt; the pepper
//! is not stored, so a leaked table cannot be verified without it.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

fn argon2_with_pepper(pepper: &[u8]) -> Result<Argon2<'_>> {
    if pepper.is_empty() {
        return Ok(Argon2::default());
    }
    Argon2::new_with_secret(pepper, Algorithm::Argon2id, Version::V0x13, Params::default())
        .map_err(|e| anyhow!("Invalid password pepper: {}", e))
}

/// Hash a password using Argon2id keyed with `pepper`.
///
/// # Example
///
/// ```ignore
/// use omnitags::services::password::hash_password;
///
/// let hash = hash_password("my_secure_password", b"jwt-secret")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str, pepper: &[u8]) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = argon2_with_pepper(pepper)?;

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` on mismatch and an error only for malformed hashes.
pub fn verify_password(password: &str, hash: &str, pepper: &[u8]) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    let argon2 = argon2_with_pepper(pepper)?;

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Hasher bound to the configured pepper
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: Vec<u8>,
}

impl PasswordHasher {
    pub fn new(pepper: impl Into<Vec<u8>>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        hash_password(password, &self.pepper)
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        verify_password(password, hash, &self.pepper)
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}
