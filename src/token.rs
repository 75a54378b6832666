//! Manage signed tokens issued after a successful login.

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::config::{MIN_SECRET_LENGTH, Token};
use crate::error::{IdentityError, Result};
use crate::user::User;

/// Pieces of information asserted on a token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Email of the user at issuance time.
    pub email: String,
    /// Identifies the time at which the token was issued.
    pub iat: i64,
    /// Identifies the expiration time on or after which the token must not
    /// be accepted for processing.
    pub exp: i64,
}

/// Process-wide symmetric key used to sign tokens.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<Vec<u8>>);

impl SigningKey {
    /// Create a new [`SigningKey`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the secret is shorter than [`MIN_SECRET_LENGTH`].
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(IdentityError::Config(format!(
                "signing key must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        Ok(Self(Zeroizing::new(secret.to_vec())))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SigningKey").field(&"[REDACTED]").finish()
    }
}

/// Issue HS256 signed tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    key: EncodingKey,
    lifetime: chrono::Duration,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(key: &SigningKey, lifetime: chrono::Duration) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            key: EncodingKey::from_secret(&key.0),
            lifetime,
        }
    }

    /// Create a [`TokenManager`] from configuration.
    pub fn from_config(config: &Token) -> Result<Self> {
        let key = SigningKey::new(&config.secret)?;
        Ok(Self::new(&key, config.lifetime()))
    }

    /// Sign a new token for `user`.
    pub fn create(&self, user: &User, clock: &dyn Clock) -> Result<String> {
        let now = clock.now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.key)?)
    }
}
