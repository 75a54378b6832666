//! Credential authentication.

use std::sync::Arc;

use crate::clock::Clock;
use crate::crypto::PasswordManager;
use crate::error::{IdentityError, Result};
use crate::token::TokenManager;
use crate::user::UserRepository;

/// Exchange an email and a plaintext password for a signed token.
#[derive(Clone)]
pub struct Authenticator {
    repo: Arc<dyn UserRepository>,
    pwd: Arc<PasswordManager>,
    token: TokenManager,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    /// Create a new [`Authenticator`].
    pub fn new(
        repo: Arc<dyn UserRepository>,
        pwd: Arc<PasswordManager>,
        token: TokenManager,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            pwd,
            token,
            clock,
        }
    }

    /// Verify credentials and issue a token.
    ///
    /// An unknown email and a wrong password fail the same way, with
    /// [`IdentityError::InvalidCredentials`].
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.repo.find_by_email(&email).await? else {
            return Err(failure("unknown_email"));
        };

        if !user.is_active() {
            return Err(failure("inactive"));
        }

        if !self.pwd.verify_password(password, &user.password) {
            return Err(failure("invalid_password"));
        }

        let token = self.token.create(&user, self.clock.as_ref())?;

        metrics::counter!("identity_logins_total", "outcome" => "success")
            .increment(1);
        tracing::info!(user_id = %user.id, "authentication successful");

        Ok(token)
    }
}

fn failure(reason: &'static str) -> IdentityError {
    metrics::counter!("identity_logins_total", "outcome" => "failure")
        .increment(1);
    tracing::info!(reason, "authentication failed");

    IdentityError::InvalidCredentials
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

    use super::*;
    use crate::clock::FixedClock;
    use crate::crypto::test_manager;
    use crate::database::MemoryUserRepository;
    use crate::token::{Claims, SigningKey};
    use crate::user::{NewUser, UserService};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    async fn setup() -> (UserService, Authenticator, uuid::Uuid) {
        let repo: Arc<dyn UserRepository> =
            Arc::new(MemoryUserRepository::default());
        let pwd = Arc::new(test_manager());
        let clock =
            FixedClock(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        let token = TokenManager::new(
            &SigningKey::new(SECRET).unwrap(),
            chrono::Duration::hours(24),
        );

        let users = UserService::new(Arc::clone(&repo), Arc::clone(&pwd));
        let auth = Authenticator::new(repo, pwd, token, Arc::new(clock));

        let id = users
            .create(NewUser {
                name: "Jane Doe".into(),
                email: "jane@ex.com".into(),
                phone: "11999990000".into(),
                password: "Secret!1".into(),
            })
            .await
            .unwrap();

        (users, auth, id)
    }

    #[tokio::test]
    async fn test_login() {
        let (_, auth, id) = setup().await;

        let token = auth.login("Jane@Ex.com ", "Secret!1").await.unwrap();
        assert!(!token.is_empty());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(SECRET),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.email, "jane@ex.com");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (_, auth, _) = setup().await;

        let wrong_password =
            auth.login("jane@ex.com", "wrong").await.unwrap_err();
        let unknown_email =
            auth.login("john@ex.com", "Secret!1").await.unwrap_err();

        assert!(matches!(wrong_password, IdentityError::InvalidCredentials));
        assert!(matches!(unknown_email, IdentityError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_login_deleted_user() {
        let (users, auth, id) = setup().await;
        users.delete(&id).await.unwrap();

        let err = auth.login("jane@ex.com", "Secret!1").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials));
    }
}
