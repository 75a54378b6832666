use async_trait::async_trait;
use uuid::Uuid;

use super::{User, UserPatch};
use crate::crypto::PasswordHash;

/// Field carrying a uniqueness rule among active users.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Email,
    Phone,
}

impl Field {
    /// Map a storage constraint name to its field.
    pub fn from_constraint(constraint: &str) -> Option<Self> {
        match constraint {
            "users_active_email_key" => Some(Self::Email),
            "users_active_phone_key" => Some(Self::Phone),
            _ => None,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Phone => f.write_str("phone"),
        }
    }
}

/// Failures reported by a [`UserRepository`].
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// No active user matched.
    #[error("user not found")]
    NotFound,

    /// Another active user already holds this value.
    #[error("{0} already registered")]
    UniqueViolation(Field),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl RepositoryError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Storage port for [`User`] records.
///
/// Soft-deleted users are invisible to every operation. Implementations
/// must reject an email or phone already held by another active user with
/// [`RepositoryError::UniqueViolation`].
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user and return its ID.
    async fn create(&self, user: &User) -> RepositoryResult<Uuid>;

    /// Find an active user by phone.
    async fn find_by_phone(
        &self,
        phone: &str,
    ) -> RepositoryResult<Option<User>>;

    /// Find an active user by email.
    async fn find_by_email(
        &self,
        email: &str,
    ) -> RepositoryResult<Option<User>>;

    /// Get an active user by ID.
    async fn get(&self, id: &Uuid) -> RepositoryResult<Option<User>>;

    /// List every active user.
    async fn list_all(&self) -> RepositoryResult<Vec<User>>;

    /// Apply non-empty fields of `patch` and stamp `updated_at`.
    async fn update(
        &self,
        id: &Uuid,
        patch: &UserPatch,
    ) -> RepositoryResult<Uuid>;

    /// Soft delete a user by stamping `deleted_at`.
    async fn delete(&self, id: &Uuid) -> RepositoryResult<Uuid>;

    /// Replace the stored password hash and stamp `updated_at`.
    async fn update_password(
        &self,
        id: &Uuid,
        password: &PasswordHash,
    ) -> RepositoryResult<Uuid>;
}
