//! Authentication service
//!
//! Signup, login, logout and session validation. A session is the pair of
//! a signed token handed to the client and a `sessions` row recording where
//! it was issued; both must be valid for a request to be authenticated.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::Utc;
use serde::Deserialize;

use super::error::{ServiceError, ServiceResult};
use super::password::PasswordHasher;
use super::token::TokenSigner;
use crate::db::repositories::{RoleRepository, SessionRepository, UserRepository};
use crate::models::{Session, SessionWithRole, User, DEFAULT_ROLE_ID};

pub const MSG_INVALID_PAYLOAD: &str = "Invalid request payload";
pub const MSG_USER_NOT_FOUND: &str = "User not found, please sign up first";
pub const MSG_EMAIL_EXISTS: &str = "Email already exists";
pub const MSG_TOKEN_NOT_PROVIDED: &str = "Session token not provided";
pub const MSG_SESSION_NOT_FOUND: &str = "Session not found";
pub const MSG_INVALID_TOKEN: &str = "Invalid session token";

/// Where a request came from, recorded with each new session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

/// Signup payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    sessions: Arc<dyn SessionRepository>,
    hasher: PasswordHasher,
    signer: TokenSigner,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        sessions: Arc<dyn SessionRepository>,
        hasher: PasswordHasher,
        signer: TokenSigner,
    ) -> Self {
        Self {
            users,
            roles,
            sessions,
            hasher,
            signer,
        }
    }

    /// Register an account with the default role and open a session for it.
    ///
    /// Returns the session token.
    pub async fn signup(&self, input: SignupInput, client: &ClientInfo) -> ServiceResult<String> {
        let name = input.name.trim();
        let email = input.email.trim();
        if name.is_empty() || email.is_empty() || !email.contains('@') || input.password.is_empty()
        {
            return Err(ServiceError::validation(MSG_INVALID_PAYLOAD));
        }

        if self.users.exists_by_email(email).await? {
            return Err(ServiceError::conflict(MSG_EMAIL_EXISTS));
        }

        if self.roles.get_by_id(DEFAULT_ROLE_ID).await?.is_none() {
            return Err(ServiceError::Internal(anyhow!(
                "default role {} is missing",
                DEFAULT_ROLE_ID
            )));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .users
            .create(&User::new(
                name.to_string(),
                email.to_string(),
                password_hash,
                DEFAULT_ROLE_ID,
            ))
            .await
            .context("Failed to create new user")?
            .ok_or_else(|| ServiceError::conflict(MSG_EMAIL_EXISTS))?;

        tracing::info!(user_id = user.id, "User signed up");
        self.open_session(&user, client).await
    }

    /// Check credentials and open a session. Returns the session token.
    ///
    /// Unknown emails and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput, client: &ClientInfo) -> ServiceResult<String> {
        if input.password.is_empty() {
            return Err(ServiceError::validation(MSG_INVALID_PAYLOAD));
        }

        let user = self
            .users
            .get_by_email(input.email.trim())
            .await?
            .ok_or_else(|| ServiceError::unauthorized(MSG_USER_NOT_FOUND))?;

        let password_valid = self
            .hasher
            .verify(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(ServiceError::unauthorized(MSG_USER_NOT_FOUND));
        }

        self.open_session(&user, client).await
    }

    /// Soft-delete the session behind `token`.
    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        if token.is_empty() {
            return Err(ServiceError::unauthorized(MSG_TOKEN_NOT_PROVIDED));
        }

        if self.sessions.find_any(token).await?.is_none() {
            return Err(ServiceError::not_found(MSG_SESSION_NOT_FOUND));
        }

        if !self.sessions.soft_delete(token).await? {
            return Err(ServiceError::not_found(MSG_SESSION_NOT_FOUND));
        }
        Ok(())
    }

    /// Active session for `token`, joined with the owner's role name.
    pub async fn validate_token(&self, token: &str) -> ServiceResult<SessionWithRole> {
        if token.is_empty() {
            return Err(ServiceError::unauthorized(MSG_INVALID_TOKEN));
        }

        self.sessions
            .find_active_with_role(token, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::unauthorized(MSG_SESSION_NOT_FOUND))
    }

    /// Gate for protected routes: the session must be active and the token
    /// signature must still verify.
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Session> {
        if token.is_empty() {
            return Err(ServiceError::unauthorized(MSG_TOKEN_NOT_PROVIDED));
        }

        let now = Utc::now();
        let session = self
            .sessions
            .find_active(token, now)
            .await?
            .ok_or_else(|| ServiceError::unauthorized(MSG_SESSION_NOT_FOUND))?;

        if let Err(e) = self.signer.verify(token, now) {
            tracing::debug!(session_id = session.id, error = %e, "Session token rejected");
            return Err(ServiceError::unauthorized(MSG_INVALID_TOKEN));
        }

        Ok(session)
    }

    /// Purge expired sessions. Returns the number removed.
    pub async fn cleanup_expired_sessions(&self) -> ServiceResult<u64> {
        let count = self
            .sessions
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    async fn open_session(&self, user: &User, client: &ClientInfo) -> ServiceResult<String> {
        let issued = self
            .signer
            .issue(&user.email, user.role_id, Utc::now())
            .map_err(|e| ServiceError::Internal(anyhow!(e).context("Could not generate token")))?;

        let session = Session::new(
            issued.token,
            user.id,
            issued.expires_at,
            client.ip.clone(),
            client.user_agent.clone(),
        );
        let session = self
            .sessions
            .create(&session)
            .await
            .context("Failed to record session")?;

        tracing::debug!(user_id = user.id, session_id = session.id, "Session opened");
        Ok(session.session_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxRoleRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use chrono::Duration;

    async fn setup_with_ttl(ttl: Duration) -> (DynDatabasePool, AuthService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxRoleRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            PasswordHasher::new("test-secret"),
            TokenSigner::new("test-secret", ttl),
        );
        (pool, service)
    }

    async fn setup_test_service() -> (DynDatabasePool, AuthService) {
        setup_with_ttl(Duration::hours(1)).await
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: "192.168.1.10".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
        }
    }

    fn signup_input(email: &str) -> SignupInput {
        SignupInput {
            name: "Ann".to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    fn login_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_returns_usable_token() {
        let (_pool, service) = setup_test_service().await;

        let token = service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .expect("Signup failed");

        let session = service.authenticate(&token).await.expect("Token should authenticate");
        assert_eq!(session.client_ip, "192.168.1.10");

        let joined = service.validate_token(&token).await.unwrap();
        assert_eq!(joined.role, "user");
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let (_pool, service) = setup_test_service().await;
        service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .unwrap();

        let result = service.signup(signup_input("ann@clinic.test"), &client()).await;
        assert!(matches!(result, Err(ServiceError::Conflict(msg)) if msg == MSG_EMAIL_EXISTS));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_signups_with_same_email() {
        let (_pool, service) = setup_test_service().await;
        let service = Arc::new(service);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .signup(signup_input("ann@clinic.test"), &client())
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ServiceError::Conflict(msg)) => assert_eq!(msg, MSG_EMAIL_EXISTS),
                Err(e) => panic!("unexpected signup error: {e:?}"),
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_signup_rejects_incomplete_payload() {
        let (_pool, service) = setup_test_service().await;

        for input in [
            SignupInput {
                name: String::new(),
                ..signup_input("ann@clinic.test")
            },
            SignupInput {
                password: String::new(),
                ..signup_input("ann@clinic.test")
            },
            signup_input("not-an-email"),
        ] {
            let result = service.signup(input, &client()).await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let (_pool, service) = setup_test_service().await;
        service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .unwrap();

        let token = service
            .login(login_input("ann@clinic.test", "password123"), &client())
            .await
            .expect("Login failed");
        assert!(service.authenticate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password_reports_user_not_found() {
        let (_pool, service) = setup_test_service().await;
        service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .unwrap();

        let result = service
            .login(login_input("ann@clinic.test", "wrong"), &client())
            .await;
        assert!(matches!(result, Err(ServiceError::Unauthorized(msg)) if msg == MSG_USER_NOT_FOUND));

        let result = service
            .login(login_input("nobody@clinic.test", "password123"), &client())
            .await;
        assert!(matches!(result, Err(ServiceError::Unauthorized(msg)) if msg == MSG_USER_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_login_empty_password() {
        let (_pool, service) = setup_test_service().await;
        let result = service.login(login_input("ann@clinic.test", ""), &client()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (_pool, service) = setup_test_service().await;
        let token = service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .unwrap();

        service.logout(&token).await.expect("Logout failed");

        assert!(matches!(
            service.authenticate(&token).await,
            Err(ServiceError::Unauthorized(msg)) if msg == MSG_SESSION_NOT_FOUND
        ));
        assert!(matches!(
            service.logout(&token).await,
            Err(ServiceError::NotFound(msg)) if msg == MSG_SESSION_NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_validate_empty_token() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(
            service.validate_token("").await,
            Err(ServiceError::Unauthorized(msg)) if msg == MSG_INVALID_TOKEN
        ));
    }

    #[tokio::test]
    async fn test_validate_expired_session() {
        let (_pool, service) = setup_with_ttl(Duration::seconds(-1)).await;
        let token = service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .unwrap();

        assert!(matches!(
            service.validate_token(&token).await,
            Err(ServiceError::Unauthorized(msg)) if msg == MSG_SESSION_NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_authenticate_missing_token() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(
            service.authenticate("").await,
            Err(ServiceError::Unauthorized(msg)) if msg == MSG_TOKEN_NOT_PROVIDED
        ));
        assert!(matches!(
            service.authenticate("unknown").await,
            Err(ServiceError::Unauthorized(msg)) if msg == MSG_SESSION_NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_unsigned_session_row() {
        let (pool, service) = setup_test_service().await;
        let token = service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .unwrap();
        let user_id = service.authenticate(&token).await.unwrap().user_id;

        // A session row whose token was not issued by this server
        SqlxSessionRepository::new(pool)
            .create(&Session::new(
                "forged-token".to_string(),
                user_id,
                Utc::now() + Duration::hours(1),
                String::new(),
                String::new(),
            ))
            .await
            .unwrap();

        assert!(matches!(
            service.authenticate("forged-token").await,
            Err(ServiceError::Unauthorized(msg)) if msg == MSG_INVALID_TOKEN
        ));
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (_pool, service) = setup_with_ttl(Duration::seconds(-1)).await;
        let token = service
            .signup(signup_input("ann@clinic.test"), &client())
            .await
            .unwrap();
        assert!(service.authenticate(&token).await.is_err());

        let removed = service.cleanup_expired_sessions().await.unwrap();
        assert_eq!(removed, 1);
    }
}
