//! Password hashing.
//!
//! Hashes are Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`)
//! stored as bytes. The salt lives inside the string, so hashing the same
//! password twice gives two different values that both verify.

use argon2::{
    password_hash::{self, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
    #[error("hashing task failed: {0}")]
    Task(String),
}

/// Slow, salted one-way hash used for password storage.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password.
    ///
    /// # Errors
    /// Returns `Hashing` when no salt can be drawn or the hash cannot be computed.
    fn hash(&self, plaintext: &[u8]) -> Result<Vec<u8>, HashError>;

    /// Check a plaintext password against a stored hash.
    ///
    /// A wrong password is `Ok(false)`, never an error.
    ///
    /// # Errors
    /// Returns `MalformedHash` when the stored value is not a valid hash encoding.
    fn verify(&self, hash: &[u8], plaintext: &[u8]) -> Result<bool, HashError>;
}

#[derive(Clone, Debug)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    #[must_use]
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Build a hasher from explicit costs.
    ///
    /// # Errors
    /// Returns `Hashing` when the parameters are out of range for Argon2.
    pub fn with_costs(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::Hashing(e.to_string()))?;
        Ok(Self::new(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &[u8]) -> Result<Vec<u8>, HashError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| HashError::Hashing(format!("entropy source unavailable: {e}")))?;
        let salt = SaltString::encode_b64(&salt).map_err(|e| HashError::Hashing(e.to_string()))?;

        let hash = self
            .argon2()
            .hash_password(plaintext, &salt)
            .map_err(|e| HashError::Hashing(e.to_string()))?;

        Ok(hash.to_string().into_bytes())
    }

    fn verify(&self, hash: &[u8], plaintext: &[u8]) -> Result<bool, HashError> {
        let encoded = std::str::from_utf8(hash).map_err(|_| HashError::MalformedHash)?;
        let parsed = PasswordHash::new(encoded).map_err(|_| HashError::MalformedHash)?;

        // Costs come from the stored hash, not from `self.params`.
        match self.argon2().verify_password(plaintext, &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(HashError::MalformedHash),
        }
    }
}
