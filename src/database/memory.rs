//! In-memory implementation of the user repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crypto::PasswordHash;
use crate::user::{
    Field, RepositoryError, RepositoryResult, Status, User, UserPatch,
    UserRepository,
};

/// In-memory user store.
///
/// Intended for tests and setups without PostgreSQL. Soft-deleted users
/// are kept but hidden.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Reject `candidate` if another active user holds its email or phone.
fn check_unique(
    users: &HashMap<Uuid, User>,
    candidate: &User,
) -> RepositoryResult<()> {
    let others = users
        .values()
        .filter(|user| user.is_active() && user.id != candidate.id);

    for user in others {
        if user.phone == candidate.phone {
            return Err(RepositoryError::UniqueViolation(Field::Phone));
        }
        if user.email == candidate.email {
            return Err(RepositoryError::UniqueViolation(Field::Email));
        }
    }

    Ok(())
}

/// Active user with `id`, mutably.
fn active_mut<'a>(
    users: &'a mut HashMap<Uuid, User>,
    id: &Uuid,
) -> RepositoryResult<&'a mut User> {
    users
        .get_mut(id)
        .filter(|user| user.is_active())
        .ok_or(RepositoryError::NotFound)
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> RepositoryResult<Uuid> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.id) {
            return Err(RepositoryError::backend(std::io::Error::other(
                format!("user {} already exists", user.id),
            )));
        }
        check_unique(&users, user)?;

        users.insert(user.id, user.clone());
        Ok(user.id)
    }

    async fn find_by_phone(
        &self,
        phone: &str,
    ) -> RepositoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| user.is_active() && user.phone == phone)
            .cloned())
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> RepositoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| user.is_active() && user.email == email)
            .cloned())
    }

    async fn get(&self, id: &Uuid) -> RepositoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(id).filter(|user| user.is_active()).cloned())
    }

    async fn list_all(&self) -> RepositoryResult<Vec<User>> {
        let users = self.users.read().await;
        let mut active: Vec<User> = users
            .values()
            .filter(|user| user.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|user| user.created_at);

        Ok(active)
    }

    async fn update(
        &self,
        id: &Uuid,
        patch: &UserPatch,
    ) -> RepositoryResult<Uuid> {
        let mut users = self.users.write().await;

        let mut updated = active_mut(&mut users, id)?.clone();
        patch.apply(&mut updated);
        updated.updated_at = Some(Utc::now());
        check_unique(&users, &updated)?;

        users.insert(*id, updated);
        Ok(*id)
    }

    async fn delete(&self, id: &Uuid) -> RepositoryResult<Uuid> {
        let mut users = self.users.write().await;

        let user = active_mut(&mut users, id)?;
        user.status = Status::Deleted { at: Utc::now() };

        Ok(*id)
    }

    async fn update_password(
        &self,
        id: &Uuid,
        password: &PasswordHash,
    ) -> RepositoryResult<Uuid> {
        let mut users = self.users.write().await;

        let user = active_mut(&mut users, id)?;
        user.password = password.clone();
        user.updated_at = Some(Utc::now());

        Ok(*id)
    }
}
