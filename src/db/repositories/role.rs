//! Role repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::Role;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Role>>;
    async fn list(&self) -> Result<Vec<Role>>;
}

pub struct SqlxRoleRepository {
    pool: DynDatabasePool,
}

impl SqlxRoleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RoleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RoleRepository for SqlxRoleRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Role>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Role>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite(&self.pool)?).await,
            DatabaseDriver::Mysql => list_mysql(mysql(&self.pool)?).await,
        }
    }
}

// SQLite implementations
async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT id, name FROM roles WHERE id = ? AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get role")?;
    Ok(row.map(|r| Role {
        id: r.get("id"),
        name: r.get("name"),
    }))
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Role>> {
    let rows = sqlx::query("SELECT id, name FROM roles WHERE deleted_at IS NULL ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list roles")?;
    Ok(rows
        .iter()
        .map(|r| Role {
            id: r.get("id"),
            name: r.get("name"),
        })
        .collect())
}

// MySQL implementations
async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT id, name FROM roles WHERE id = ? AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get role")?;
    Ok(row.map(|r| Role {
        id: r.get("id"),
        name: r.get("name"),
    }))
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Role>> {
    let rows = sqlx::query("SELECT id, name FROM roles WHERE deleted_at IS NULL ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list roles")?;
    Ok(rows
        .iter()
        .map(|r| Role {
            id: r.get("id"),
            name: r.get("name"),
        })
        .collect())
}
