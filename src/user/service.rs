use std::sync::Arc;

use uuid::Uuid;

use super::builder::hashing_error;
use super::{Field, NewUser, User, UserPatch, UserRepository};
use crate::crypto::{Password, PasswordManager};
use crate::error::{IdentityError, Result};

/// User manager.
///
/// Email and phone uniqueness is checked here and enforced again by the
/// repository; both report [`IdentityError::Conflict`].
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    pwd: Arc<PasswordManager>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        repo: Arc<dyn UserRepository>,
        pwd: Arc<PasswordManager>,
    ) -> Self {
        Self { repo, pwd }
    }

    /// Validate, hash and store a new user.
    pub async fn create(&self, new: NewUser) -> Result<Uuid> {
        let user = User::builder()
            .name(new.name)
            .email(new.email)
            .phone(new.phone)
            .plaintext_password(new.password)
            .build(&self.pwd)?;

        self.ensure_available(Field::Phone, &user.phone, None).await?;
        self.ensure_available(Field::Email, &user.email, None).await?;

        let id = self.repo.create(&user).await.map_err(|err| {
            tracing::warn!(error = %err, "user creation rejected by storage");
            IdentityError::from(err)
        })?;

        metrics::counter!("identity_users_created_total").increment(1);
        tracing::info!(user_id = %id, "user created");

        Ok(id)
    }

    /// Get an active user.
    pub async fn get(&self, id: &Uuid) -> Result<User> {
        self.repo.get(id).await?.ok_or(IdentityError::NotFound)
    }

    /// List every active user.
    pub async fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.repo.list_all().await?)
    }

    /// Update non-empty fields of an active user.
    pub async fn update(&self, id: &Uuid, patch: UserPatch) -> Result<Uuid> {
        self.get(id).await?;

        if let Some(phone) = patch.phone() {
            self.ensure_available(Field::Phone, phone, Some(id)).await?;
        }
        if let Some(email) = patch.email() {
            self.ensure_available(Field::Email, email, Some(id)).await?;
        }

        let id = self.repo.update(id, &patch).await?;
        tracing::info!(user_id = %id, "user updated");

        Ok(id)
    }

    /// Soft delete an active user.
    pub async fn delete(&self, id: &Uuid) -> Result<Uuid> {
        let user = self.get(id).await?;

        let id = self.repo.delete(&user.id).await?;
        tracing::info!(user_id = %id, "user deleted");

        Ok(id)
    }

    /// Replace the password of an active user.
    ///
    /// The new plaintext must not verify against the current hash.
    pub async fn update_password(
        &self,
        id: &Uuid,
        password: &str,
    ) -> Result<Uuid> {
        let user = self.get(id).await?;

        if self.pwd.verify_password(password, &user.password) {
            return Err(IdentityError::invalid(
                "password",
                "same_password",
                "new password must differ from current",
            ));
        }

        let password = Password::new(password)
            .map_err(|err| IdentityError::field("password", err))?;
        let hash = self.pwd.hash_password(&password).map_err(|err| {
            IdentityError::field("password", hashing_error(err))
        })?;

        let id = self.repo.update_password(&user.id, &hash).await?;
        tracing::info!(user_id = %id, "password updated");

        Ok(id)
    }

    /// Fail with [`IdentityError::Conflict`] if `value` is held by an
    /// active user other than `owner`.
    async fn ensure_available(
        &self,
        field: Field,
        value: &str,
        owner: Option<&Uuid>,
    ) -> Result<()> {
        let holder = match field {
            Field::Email => self.repo.find_by_email(value).await?,
            Field::Phone => self.repo.find_by_phone(value).await?,
        };

        match holder {
            Some(holder) if Some(&holder.id) != owner => {
                tracing::warn!(%field, "value already registered");
                Err(IdentityError::Conflict(format!(
                    "{field} already registered"
                )))
            },
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::crypto::{PasswordHash, test_manager};
    use crate::database::MemoryUserRepository;
    use crate::user::{RepositoryError, RepositoryResult};

    fn service() -> UserService {
        UserService::new(
            Arc::new(MemoryUserRepository::default()),
            Arc::new(test_manager()),
        )
    }

    fn jane() -> NewUser {
        NewUser {
            name: "Jane Doe".into(),
            email: "jane@ex.com".into(),
            phone: "11999990000".into(),
            password: "Secret!1".into(),
        }
    }

    fn john() -> NewUser {
        NewUser {
            name: "John Doe".into(),
            email: "john@ex.com".into(),
            phone: "11988887777".into(),
            password: "Hunter#2".into(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = service();
        let id = service.create(jane()).await.unwrap();

        let user = service.get(&id).await.unwrap();
        assert_eq!(user.id(), id);
        assert_eq!(user.email(), "jane@ex.com");
        assert_ne!(user.password().as_str(), "Secret!1");
        assert!(user.updated_at().is_none());
    }

    #[tokio::test]
    async fn test_create_conflicts() {
        let service = service();
        service.create(jane()).await.unwrap();

        let err = service
            .create(NewUser {
                phone: "11911112222".into(),
                ..jane()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "email already registered");

        // Phone is checked first.
        let err = service.create(jane()).await.unwrap_err();
        assert_eq!(err.to_string(), "phone already registered");
    }

    #[tokio::test]
    async fn test_create_invalid() {
        let err = service()
            .create(NewUser {
                password: "nospecial".into(),
                ..jane()
            })
            .await
            .unwrap_err();
        assert!(err.is_invalid_field("password"));
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let err = service().get(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn test_list_all_skips_deleted() {
        let service = service();
        let jane = service.create(jane()).await.unwrap();
        let john = service.create(john()).await.unwrap();
        service.delete(&jane).await.unwrap();

        let users = service.list_all().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id(), john);
    }

    #[tokio::test]
    async fn test_update() {
        let service = service();
        let id = service.create(jane()).await.unwrap();
        let before = service.get(&id).await.unwrap();

        let patch = UserPatch::new("Jane Smith", "", "").unwrap();
        assert_eq!(service.update(&id, patch).await.unwrap(), id);

        let after = service.get(&id).await.unwrap();
        assert_eq!(after.name(), "Jane Smith");
        assert_eq!(after.email(), before.email());
        assert_eq!(after.phone(), before.phone());
        assert_eq!(after.password(), before.password());
        assert!(after.updated_at().is_some());
    }

    #[tokio::test]
    async fn test_update_to_own_values() {
        let service = service();
        let id = service.create(jane()).await.unwrap();

        let patch = UserPatch::new("", "jane@ex.com", "11999990000").unwrap();
        assert_eq!(service.update(&id, patch).await.unwrap(), id);
    }

    #[tokio::test]
    async fn test_update_conflicts_with_other_user() {
        let service = service();
        service.create(jane()).await.unwrap();
        let id = service.create(john()).await.unwrap();

        let patch = UserPatch::new("", "", "11999990000").unwrap();
        let err = service.update(&id, patch).await.unwrap_err();
        assert_eq!(err.to_string(), "phone already registered");

        let patch = UserPatch::new("", "jane@ex.com", "").unwrap();
        let err = service.update(&id, patch).await.unwrap_err();
        assert_eq!(err.to_string(), "email already registered");
    }

    #[tokio::test]
    async fn test_update_unknown() {
        let patch = UserPatch::new("Jane Smith", "", "").unwrap();
        let err = service()
            .update(&Uuid::new_v4(), patch)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn test_update_unknown_with_taken_phone() {
        let service = service();
        service.create(jane()).await.unwrap();

        let patch = UserPatch::new("", "", "11999990000").unwrap();
        let err = service.update(&Uuid::new_v4(), patch).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn test_create_rehashes_hash_shaped_password() {
        let pwd = test_manager();
        let phc = pwd
            .hash_password(&Password::new("abcde!").unwrap())
            .unwrap()
            .as_str()
            .to_owned();

        let service = service();
        let id = service
            .create(NewUser {
                password: phc.clone(),
                ..jane()
            })
            .await
            .unwrap();

        let stored = service.get(&id).await.unwrap();
        assert_ne!(stored.password().as_str(), phc);
        assert!(PasswordHash::is_hash(stored.password().as_str()));
        assert!(pwd.verify_password(&phc, stored.password()));
        assert!(!pwd.verify_password("abcde!", stored.password()));
    }

    #[tokio::test]
    async fn test_delete() {
        let service = service();
        let id = service.create(jane()).await.unwrap();

        assert_eq!(service.delete(&id).await.unwrap(), id);
        assert!(matches!(
            service.get(&id).await.unwrap_err(),
            IdentityError::NotFound
        ));
        assert!(matches!(
            service.delete(&id).await.unwrap_err(),
            IdentityError::NotFound
        ));

        // Email and phone are released.
        let other = service.create(jane()).await.unwrap();
        assert_ne!(other, id);
    }

    #[tokio::test]
    async fn test_update_password() {
        let service = service();
        let pwd = test_manager();
        let id = service.create(jane()).await.unwrap();

        let err =
            service.update_password(&id, "Secret!1").await.unwrap_err();
        assert!(err.is_invalid_field("password"));
        assert!(
            err.to_string()
                .contains("new password must differ from current")
        );

        let updated = service.update_password(&id, "Better!2").await.unwrap();
        assert_eq!(updated, id);
        let user = service.get(&id).await.unwrap();
        assert!(pwd.verify_password("Better!2", user.password()));
        assert!(!pwd.verify_password("Secret!1", user.password()));
        assert!(user.updated_at().is_some());
    }

    #[tokio::test]
    async fn test_update_password_policy_and_unknown() {
        let service = service();
        let id = service.create(jane()).await.unwrap();

        let err = service.update_password(&id, "weak").await.unwrap_err();
        assert!(err.is_invalid_field("password"));

        let err = service
            .update_password(&Uuid::new_v4(), "Better!2")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    /// Repository whose lookups always miss, as when two callers race
    /// past the pre-check.
    struct Racing(MemoryUserRepository);

    #[async_trait]
    impl UserRepository for Racing {
        async fn create(&self, user: &User) -> RepositoryResult<Uuid> {
            self.0.create(user).await
        }

        async fn find_by_phone(
            &self,
            _: &str,
        ) -> RepositoryResult<Option<User>> {
            Ok(None)
        }

        async fn find_by_email(
            &self,
            _: &str,
        ) -> RepositoryResult<Option<User>> {
            Ok(None)
        }

        async fn get(&self, id: &Uuid) -> RepositoryResult<Option<User>> {
            self.0.get(id).await
        }

        async fn list_all(&self) -> RepositoryResult<Vec<User>> {
            self.0.list_all().await
        }

        async fn update(
            &self,
            id: &Uuid,
            patch: &UserPatch,
        ) -> RepositoryResult<Uuid> {
            self.0.update(id, patch).await
        }

        async fn delete(&self, id: &Uuid) -> RepositoryResult<Uuid> {
            self.0.delete(id).await
        }

        async fn update_password(
            &self,
            id: &Uuid,
            password: &PasswordHash,
        ) -> RepositoryResult<Uuid> {
            self.0.update_password(id, password).await
        }
    }

    #[tokio::test]
    async fn test_storage_uniqueness_is_a_conflict() {
        let service = UserService::new(
            Arc::new(Racing(MemoryUserRepository::default())),
            Arc::new(test_manager()),
        );
        service.create(jane()).await.unwrap();

        let err = service
            .create(NewUser {
                phone: "11911112222".into(),
                ..jane()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Conflict(_)));
        assert_eq!(err.to_string(), "email already registered");

        let id = service.create(john()).await.unwrap();
        let patch = UserPatch::new("", "", "11999990000").unwrap();
        let err = service.update(&id, patch).await.unwrap_err();
        assert_eq!(err.to_string(), "phone already registered");
    }

    /// Repository failing every call.
    struct Broken;

    fn broken() -> RepositoryError {
        RepositoryError::backend(std::io::Error::other("connection reset"))
    }

    #[async_trait]
    impl UserRepository for Broken {
        async fn create(&self, _: &User) -> RepositoryResult<Uuid> {
            Err(broken())
        }

        async fn find_by_phone(
            &self,
            _: &str,
        ) -> RepositoryResult<Option<User>> {
            Err(broken())
        }

        async fn find_by_email(
            &self,
            _: &str,
        ) -> RepositoryResult<Option<User>> {
            Err(broken())
        }

        async fn get(&self, _: &Uuid) -> RepositoryResult<Option<User>> {
            Err(broken())
        }

        async fn list_all(&self) -> RepositoryResult<Vec<User>> {
            Err(broken())
        }

        async fn update(
            &self,
            _: &Uuid,
            _: &UserPatch,
        ) -> RepositoryResult<Uuid> {
            Err(broken())
        }

        async fn delete(&self, _: &Uuid) -> RepositoryResult<Uuid> {
            Err(broken())
        }

        async fn update_password(
            &self,
            _: &Uuid,
            _: &PasswordHash,
        ) -> RepositoryResult<Uuid> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn test_backend_failures_pass_through() {
        let service =
            UserService::new(Arc::new(Broken), Arc::new(test_manager()));

        for err in [
            service.create(jane()).await.unwrap_err(),
            service.get(&Uuid::new_v4()).await.unwrap_err(),
            service.list_all().await.unwrap_err(),
            service.delete(&Uuid::new_v4()).await.unwrap_err(),
        ] {
            assert!(matches!(err, IdentityError::Persistence(_)));
            assert!(err.to_string().contains("connection reset"));
        }
    }
}
