//! Configuration manager for the identity service.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TOKEN_LIFETIME: u32 = 24; // 24 hours.
/// Minimum length, in bytes, of the token signing secret.
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(skip)]
    path: PathBuf,
    /// Related to signed token configuration.
    #[serde(skip_serializing)]
    pub token: Option<Token>,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing, in KiB.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Signed token configuration.
#[derive(PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Symmetric signing secret.
    pub secret: String,
    /// Token lifetime in hours.
    /// Default is 24.
    pub lifetime: Option<u32>,
}

impl Token {
    /// Token lifetime, falling back on the default.
    pub fn lifetime(&self) -> chrono::Duration {
        let hours = self.lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME);
        chrono::Duration::hours(i64::from(hours))
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("secret", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// A missing or malformed file falls back on the default configuration.
    pub fn read(self) -> Self {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let file_path = if self.path.is_file() {
            self.path.as_path()
        } else {
            default_path
        };

        match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|err| IdentityError::Config(err.to_string()))
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self::default()
    }

    /// Default `tracing` filter.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Token configuration, checked for a usable signing secret.
    pub fn token(&self) -> Result<&Token> {
        let Some(token) = &self.token else {
            return Err(IdentityError::Config(
                "missing `token` entry on `config.yaml` file".into(),
            ));
        };

        if token.secret.len() < MIN_SECRET_LENGTH {
            return Err(IdentityError::Config(format!(
                "`token.secret` must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        Ok(token)
    }
}
