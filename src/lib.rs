//! Identity and credential management core.
//!
//! Stores user records with one-way hashed passwords, keeps email and phone
//! unique among active users, soft deletes records and issues signed tokens
//! on login. Transport is left to the embedding application.

#![forbid(unsafe_code)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod telemetry;
pub mod token;
pub mod user;

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::clock::{Clock, SystemClock};
use crate::config::Configuration;
use crate::crypto::PasswordManager;
use crate::database::{Database, MemoryUserRepository, PgUserRepository};
use crate::error::{IdentityError, Result};
use crate::token::TokenManager;
use crate::user::{UserRepository, UserService};

/// Wired identity service and authenticator.
#[derive(Clone)]
pub struct Identity {
    pub users: UserService,
    pub auth: Authenticator,
}

impl Identity {
    /// Wire services on top of a repository.
    pub fn new(
        repo: Arc<dyn UserRepository>,
        pwd: PasswordManager,
        token: TokenManager,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pwd = Arc::new(pwd);

        Self {
            users: UserService::new(Arc::clone(&repo), Arc::clone(&pwd)),
            auth: Authenticator::new(repo, pwd, token, clock),
        }
    }

    /// Initialize services from configuration.
    ///
    /// Uses PostgreSQL when configured, running migrations first, and an
    /// in-memory repository otherwise.
    pub async fn initialize(config: &Configuration) -> Result<Self> {
        let token = TokenManager::from_config(config.token()?)?;
        let pwd = PasswordManager::new(config.argon2.clone())?;

        let repo: Arc<dyn UserRepository> = match &config.postgres {
            Some(postgres) => {
                let db = Database::from_config(postgres)
                    .await
                    .map_err(|err| IdentityError::Config(err.to_string()))?;
                db.migrate()
                    .await
                    .map_err(|err| IdentityError::Config(err.to_string()))?;

                Arc::new(PgUserRepository::new(
                    db.postgres,
                    Arc::new(pwd.clone()),
                ))
            },
            None => {
                tracing::warn!("no `postgres` entry, users are kept in memory");
                Arc::new(MemoryUserRepository::new())
            },
        };

        Ok(Self::new(repo, pwd, token, Arc::new(SystemClock)))
    }
}
