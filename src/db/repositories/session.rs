//! Session repository
//!
//! Database operations for login sessions.
//!
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL
//!
//! Logging out soft-deletes a session; the periodic purge hard-deletes
//! sessions that have expired.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{Session, SessionWithRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Record a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Session that is neither logged out nor expired at `now`
    async fn find_active(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>>;

    /// Session that has not been logged out, regardless of expiry
    async fn find_any(&self, token: &str) -> Result<Option<Session>>;

    /// Active session joined with its owner's role name
    async fn find_active_with_role(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionWithRole>>;

    /// Mark a session as logged out. Returns false if nothing matched.
    async fn soft_delete(&self, token: &str) -> Result<bool>;

    /// Remove sessions that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(sqlite(&self.pool)?, session).await,
            DatabaseDriver::Mysql => create_session_mysql(mysql(&self.pool)?, session).await,
        }
    }

    async fn find_active(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_active_session_sqlite(sqlite(&self.pool)?, token, now).await
            }
            DatabaseDriver::Mysql => find_active_session_mysql(mysql(&self.pool)?, token, now).await,
        }
    }

    async fn find_any(&self, token: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => find_session_sqlite(sqlite(&self.pool)?, token).await,
            DatabaseDriver::Mysql => find_session_mysql(mysql(&self.pool)?, token).await,
        }
    }

    async fn find_active_with_role(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionWithRole>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_active_with_role_sqlite(sqlite(&self.pool)?, token, now).await
            }
            DatabaseDriver::Mysql => {
                find_active_with_role_mysql(mysql(&self.pool)?, token, now).await
            }
        }
    }

    async fn soft_delete(&self, token: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => soft_delete_session_sqlite(sqlite(&self.pool)?, token).await,
            DatabaseDriver::Mysql => soft_delete_session_mysql(mysql(&self.pool)?, token).await,
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_expired_sessions_sqlite(sqlite(&self.pool)?, now).await
            }
            DatabaseDriver::Mysql => delete_expired_sessions_mysql(mysql(&self.pool)?, now).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (session_token, user_id, expires_at, client_ip, browser, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.session_token)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(&session.client_ip)
    .bind(&session.browser)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    let mut created = session.clone();
    created.id = result.last_insert_rowid();
    Ok(created)
}

async fn find_active_session_sqlite(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, session_token, user_id, expires_at, client_ip, browser, created_at, updated_at, deleted_at
        FROM sessions
        WHERE session_token = ? AND expires_at > ? AND deleted_at IS NULL
        "#,
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
    .context("Failed to get active session")?;

    Ok(row.map(|r| row_to_session_sqlite(&r)))
}

async fn find_session_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, session_token, user_id, expires_at, client_ip, browser, created_at, updated_at, deleted_at
        FROM sessions
        WHERE session_token = ? AND deleted_at IS NULL
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get session")?;

    Ok(row.map(|r| row_to_session_sqlite(&r)))
}

async fn find_active_with_role_sqlite(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<SessionWithRole>> {
    let row = sqlx::query(
        r#"
        SELECT s.id, s.session_token, s.user_id, s.expires_at, s.client_ip, s.browser,
               s.created_at, s.updated_at, s.deleted_at, r.name AS role
        FROM sessions s
        JOIN users u ON s.user_id = u.id
        JOIN roles r ON u.role_id = r.id
        WHERE s.session_token = ? AND s.expires_at > ? AND s.deleted_at IS NULL
        "#,
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
    .context("Failed to get session with role")?;

    Ok(row.map(|r| SessionWithRole {
        session: row_to_session_sqlite(&r),
        role: r.get("role"),
    }))
}

async fn soft_delete_session_sqlite(pool: &SqlitePool, token: &str) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE sessions SET deleted_at = ?, updated_at = ? WHERE session_token = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(token)
    .execute(pool)
    .await
    .context("Failed to delete session")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_expired_sessions_sqlite(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Session {
    Session {
        id: row.get("id"),
        session_token: row.get("session_token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        client_ip: row.get("client_ip"),
        browser: row.get("browser"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (session_token, user_id, expires_at, client_ip, browser, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.session_token)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(&session.client_ip)
    .bind(&session.browser)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    let mut created = session.clone();
    created.id = result.last_insert_id() as i64;
    Ok(created)
}

async fn find_active_session_mysql(
    pool: &MySqlPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, session_token, user_id, expires_at, client_ip, browser, created_at, updated_at, deleted_at
        FROM sessions
        WHERE session_token = ? AND expires_at > ? AND deleted_at IS NULL
        "#,
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
    .context("Failed to get active session")?;

    Ok(row.map(|r| row_to_session_mysql(&r)))
}

async fn find_session_mysql(pool: &MySqlPool, token: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, session_token, user_id, expires_at, client_ip, browser, created_at, updated_at, deleted_at
        FROM sessions
        WHERE session_token = ? AND deleted_at IS NULL
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get session")?;

    Ok(row.map(|r| row_to_session_mysql(&r)))
}

async fn find_active_with_role_mysql(
    pool: &MySqlPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<SessionWithRole>> {
    let row = sqlx::query(
        r#"
        SELECT s.id, s.session_token, s.user_id, s.expires_at, s.client_ip, s.browser,
               s.created_at, s.updated_at, s.deleted_at, r.name AS role
        FROM sessions s
        JOIN users u ON s.user_id = u.id
        JOIN roles r ON u.role_id = r.id
        WHERE s.session_token = ? AND s.expires_at > ? AND s.deleted_at IS NULL
        "#,
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
    .context("Failed to get session with role")?;

    Ok(row.map(|r| SessionWithRole {
        session: row_to_session_mysql(&r),
        role: r.get("role"),
    }))
}

async fn soft_delete_session_mysql(pool: &MySqlPool, token: &str) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE sessions SET deleted_at = ?, updated_at = ? WHERE session_token = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(token)
    .execute(pool)
    .await
    .context("Failed to delete session")?;

    Ok(result.rows_affected() > 0)
}

async fn delete_expired_sessions_mysql(pool: &MySqlPool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Session {
    Session {
        id: row.get("id"),
        session_token: row.get("session_token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        client_ip: row.get("client_ip"),
        browser: row.get("browser"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;
    use chrono::Duration;
    use uuid::Uuid;

    async fn setup_test_repo() -> (SqlxSessionRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        // Sessions reference users
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "Admin".to_string(),
                "admin@clinic.test".to_string(),
                "hash".to_string(),
                2,
            ))
            .await
            .expect("Failed to create test user")
            .expect("Email should be free");

        (SqlxSessionRepository::new(pool), user.id)
    }

    fn test_session(user_id: i64, expires_in: Duration) -> Session {
        Session::new(
            Uuid::new_v4().to_string(),
            user_id,
            Utc::now() + expires_in,
            "10.0.0.1".to_string(),
            "Mozilla/5.0".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_find_active() {
        let (repo, user_id) = setup_test_repo().await;
        let session = test_session(user_id, Duration::hours(1));

        let created = repo.create(&session).await.expect("Failed to create session");
        assert!(created.id > 0);

        let found = repo
            .find_active(&session.session_token, Utc::now())
            .await
            .unwrap()
            .expect("Session not found");
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.client_ip, "10.0.0.1");
        assert_eq!(found.browser, "Mozilla/5.0");
        assert!(found.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_not_active() {
        let (repo, user_id) = setup_test_repo().await;
        let session = test_session(user_id, Duration::hours(-1));
        repo.create(&session).await.unwrap();

        assert!(repo
            .find_active(&session.session_token, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert!(repo.find_any(&session.session_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_active_with_role() {
        let (repo, user_id) = setup_test_repo().await;
        let session = test_session(user_id, Duration::hours(1));
        repo.create(&session).await.unwrap();

        let joined = repo
            .find_active_with_role(&session.session_token, Utc::now())
            .await
            .unwrap()
            .expect("Session not found");
        assert_eq!(joined.role, "admin");
        assert_eq!(joined.session.session_token, session.session_token);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_session() {
        let (repo, user_id) = setup_test_repo().await;
        let session = test_session(user_id, Duration::hours(1));
        repo.create(&session).await.unwrap();

        assert!(repo.soft_delete(&session.session_token).await.unwrap());
        assert!(!repo.soft_delete(&session.session_token).await.unwrap());

        assert!(repo.find_any(&session.session_token).await.unwrap().is_none());
        assert!(repo
            .find_active_with_role(&session.session_token, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_token_rejected() {
        let (repo, user_id) = setup_test_repo().await;
        let session = test_session(user_id, Duration::hours(1));
        repo.create(&session).await.unwrap();

        assert!(repo.create(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (repo, user_id) = setup_test_repo().await;
        let expired = test_session(user_id, Duration::days(-1));
        let valid = test_session(user_id, Duration::days(1));
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        let deleted = repo
            .delete_expired(Utc::now())
            .await
            .expect("Failed to delete expired sessions");
        assert_eq!(deleted, 1);

        assert!(repo.find_any(&expired.session_token).await.unwrap().is_none());
        assert!(repo.find_any(&valid.session_token).await.unwrap().is_some());
    }
}
