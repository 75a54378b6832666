//! Password hashing logics.
//!
//! Every stored password is an Argon2id PHC string. Comparison is always a
//! one-way verification of a candidate plaintext against that string.

use std::sync::LazyLock;

use argon2::password_hash::{
    PasswordHash as PhcString, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::rngs::OsRng;
use regex_lite::Regex;
use validator::ValidationError;
use zeroize::Zeroizing;

use crate::config::Argon2 as ArgonConfig;

static PHC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\$argon2(id|i|d)\$v=\d+\$m=\d+,t=\d+,p=\d+\$[A-Za-z0-9+/]+\$[A-Za-z0-9+/]+$",
    )
    .unwrap()
});

/// Characters a plaintext password must contain at least one of.
pub const SPECIAL_CHARACTERS: &[char] = &['!', '@', '#', '$', '%', '*'];

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Plaintext password, wiped from memory on drop.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Maximum password length.
    pub const MAX_LENGTH: usize = 255;
    /// Minimum password length.
    pub const MIN_LENGTH: usize = 6;

    /// Create a new [`Password`] enforcing the password policy.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the password is too short, too long or has no
    /// special character.
    pub fn new(
        value: impl Into<String>,
    ) -> std::result::Result<Self, ValidationError> {
        let value = Zeroizing::new(value.into());

        if value.len() < Self::MIN_LENGTH || value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::new("length").with_message(
                format!(
                    "password must be between {} and {} characters",
                    Self::MIN_LENGTH,
                    Self::MAX_LENGTH
                )
                .into(),
            ));
        }

        if !value.contains(SPECIAL_CHARACTERS) {
            return Err(ValidationError::new("special_character")
                .with_message(
                    "password must contain one of `!@#$%*`".into(),
                ));
        }

        Ok(Self(value))
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// A hashed password in PHC string format.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Whether `value` already is a recognized Argon2 PHC string.
    pub fn is_hash(value: &str) -> bool {
        PHC_RE.is_match(value) && PhcString::new(value).is_ok()
    }

    /// Converts a [`String`] into a [`PasswordHash`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string is not in PHC format.
    pub fn parse(phc_string: impl Into<String>) -> Result<Self> {
        let phc_string = phc_string.into();
        if !Self::is_hash(&phc_string) {
            return Err(CryptoError::Argon2(
                "stored password is not a PHC string".into(),
            ));
        }

        Ok(Self(phc_string))
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHash")
            .field("phc_string", &"[REDACTED]")
            .finish()
    }
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
#[derive(Debug, Clone)]
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id with a random salt.
    pub fn hash_password(&self, password: &Password) -> Result<PasswordHash> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(PasswordHash(hash.to_string()))
    }

    /// Verify a plaintext candidate against a PHC string.
    ///
    /// Parameters embedded in the PHC string take precedence over the
    /// configured ones.
    pub fn verify_password(
        &self,
        candidate: impl AsRef<[u8]>,
        hash: &PasswordHash,
    ) -> bool {
        PhcString::new(hash.as_str())
            .map(|parsed| {
                self.argon2()
                    .verify_password(candidate.as_ref(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) fn test_manager() -> PasswordManager {
    let config = ArgonConfig {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    };
    PasswordManager::new(Some(config)).unwrap()
}
