//! User repository
//!
//! Accounts used for login and signup. Soft-deleted users are invisible to
//! every lookup.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user, returning it with its assigned id.
    ///
    /// Returns `None` when the email is already registered.
    async fn create(&self, user: &User) -> Result<Option<User>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Look up a user by email (exact match)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn exists_by_email(&self, email: &str) -> Result<bool>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite(&self.pool)?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql(&self.pool)?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_email_sqlite(sqlite(&self.pool)?, email).await,
            DatabaseDriver::Mysql => get_user_by_email_mysql(mysql(&self.pool)?, email).await,
        }
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        Ok(self.get_by_email(email).await?.is_some())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<Option<User>> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, role_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role_id)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => return Ok(None),
        Err(e) => return Err(e).context("Failed to create user"),
    };

    let mut created = user.clone();
    created.id = result.last_insert_rowid();
    Ok(Some(created))
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, email, password_hash, role_id, created_at, updated_at
        FROM users
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by ID")?;

    Ok(row.map(|r| row_to_user_sqlite(&r)))
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, email, password_hash, role_id, created_at, updated_at
        FROM users
        WHERE email = ? AND deleted_at IS NULL
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    Ok(row.map(|r| row_to_user_sqlite(&r)))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role_id: row.get("role_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<Option<User>> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, role_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role_id)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => return Ok(None),
        Err(e) => return Err(e).context("Failed to create user"),
    };

    let mut created = user.clone();
    created.id = result.last_insert_id() as i64;
    Ok(Some(created))
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, email, password_hash, role_id, created_at, updated_at
        FROM users
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by ID")?;

    Ok(row.map(|r| row_to_user_mysql(&r)))
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, email, password_hash, role_id, created_at, updated_at
        FROM users
        WHERE email = ? AND deleted_at IS NULL
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    Ok(row.map(|r| row_to_user_mysql(&r)))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role_id: row.get("role_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::DEFAULT_ROLE_ID;

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(email: &str) -> User {
        User::new(
            "Test User".to_string(),
            email.to_string(),
            "hash".to_string(),
            DEFAULT_ROLE_ID,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&test_user("ann@clinic.test"))
            .await
            .expect("Failed to create user")
            .expect("Email should be free");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(by_id.email, "ann@clinic.test");
        assert_eq!(by_id.password_hash, "hash");
        assert_eq!(by_id.role_id, DEFAULT_ROLE_ID);

        let by_email = repo
            .get_by_email("ann@clinic.test")
            .await
            .unwrap()
            .expect("User not found");
        assert_eq!(by_email.id, created.id);
    }

    #[tokio::test]
    async fn test_exists_by_email() {
        let repo = setup_test_repo().await;
        assert!(!repo.exists_by_email("ann@clinic.test").await.unwrap());

        repo.create(&test_user("ann@clinic.test")).await.unwrap();
        assert!(repo.exists_by_email("ann@clinic.test").await.unwrap());
        assert!(!repo.exists_by_email("bob@clinic.test").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_reports_none() {
        let repo = setup_test_repo().await;
        assert!(repo.create(&test_user("ann@clinic.test")).await.unwrap().is_some());

        let result = repo.create(&test_user("ann@clinic.test")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let repo = setup_test_repo().await;
        let mut user = test_user("ann@clinic.test");
        user.role_id = 42;

        assert!(repo.create(&user).await.is_err());
    }
}
