//! PostgreSQL implementation of the user repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::crypto::{PasswordHash, PasswordManager};
use crate::user::{
    Field, RepositoryError, RepositoryResult, User, UserPatch, UserRepository,
};

const UNIQUE_VIOLATION: &str = "23505";

/// User record as stored in the database.
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    password: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

/// PostgreSQL user repository.
pub struct PgUserRepository {
    pool: PgPool,
    pwd: Arc<PasswordManager>,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: PgPool, pwd: Arc<PasswordManager>) -> Self {
        Self { pool, pwd }
    }

    /// Rebuild a [`User`] from its row. The stored hash is kept as-is.
    fn rebuild(&self, record: UserRecord) -> RepositoryResult<User> {
        let password = PasswordHash::parse(record.password)
            .map_err(RepositoryError::backend)?;

        User::builder()
            .id(record.id)
            .name(record.name)
            .email(record.email)
            .phone(record.phone)
            .password(password.as_str())
            .created_at(record.created_at)
            .updated_at(record.updated_at)
            .deleted_at(record.deleted_at)
            .build(&self.pwd)
            .map_err(RepositoryError::backend)
    }
}

/// Map SQLx errors to [`RepositoryError`].
fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        let field = db_err
            .code()
            .filter(|code| code.as_ref() == UNIQUE_VIOLATION)
            .and(db_err.constraint())
            .and_then(Field::from_constraint);

        if let Some(field) = field {
            return RepositoryError::UniqueViolation(field);
        }
    }

    tracing::error!(error = %err, "postgres query failed");
    RepositoryError::backend(err)
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> RepositoryResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (
                id, name, email, phone, password, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(user.id())
        .bind(user.name())
        .bind(user.email())
        .bind(user.phone())
        .bind(user.password().as_str())
        .bind(user.created_at())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_by_phone(
        &self,
        phone: &str,
    ) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT
                id, name, email, phone, password,
                created_at, updated_at, deleted_at
            FROM users
            WHERE phone = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        record.map(|record| self.rebuild(record)).transpose()
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT
                id, name, email, phone, password,
                created_at, updated_at, deleted_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        record.map(|record| self.rebuild(record)).transpose()
    }

    async fn get(&self, id: &Uuid) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT
                id, name, email, phone, password,
                created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        record.map(|record| self.rebuild(record)).transpose()
    }

    async fn list_all(&self) -> RepositoryResult<Vec<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT
                id, name, email, phone, password,
                created_at, updated_at, deleted_at
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|record| self.rebuild(record))
        .collect()
    }

    async fn update(
        &self,
        id: &Uuid,
        patch: &UserPatch,
    ) -> RepositoryResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(patch.name())
        .bind(patch.email())
        .bind(patch.phone())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: &Uuid) -> RepositoryResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET deleted_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepositoryError::NotFound)
    }

    async fn update_password(
        &self,
        id: &Uuid,
        password: &PasswordHash,
    ) -> RepositoryResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET password = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(password.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepositoryError::NotFound)
    }
}
