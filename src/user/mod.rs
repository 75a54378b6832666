mod builder;
mod fields;
mod repository;
mod service;

pub use builder::*;
pub use repository::*;
pub use service::*;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::crypto::PasswordHash;

/// Identity record.
///
/// Only built through [`UserBuilder`], so every field went through
/// validation and `password` always holds a one-way hash.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) phone: String,
    #[serde(skip)]
    pub(crate) password: PasswordHash,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) status: Status,
}

/// Lifecycle of a [`User`]. `Deleted` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Status {
    Active,
    Deleted { at: DateTime<Utc> },
}

impl User {
    /// Create a new [`UserBuilder`].
    pub fn builder() -> UserBuilder {
        UserBuilder::new()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn password(&self) -> &PasswordHash {
        &self.password
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Soft-deletion date, if any.
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            Status::Active => None,
            Status::Deleted { at } => Some(at),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }
}

/// Fields supplied by a caller to create a [`User`].
#[derive(Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Plaintext password.
    pub password: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
