//! Disease repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::Disease;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait DiseaseRepository: Send + Sync {
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Disease>>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Disease>>;
    async fn create(&self, disease: &Disease) -> Result<Disease>;
    async fn update(&self, disease: &Disease) -> Result<Option<Disease>>;
    async fn soft_delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxDiseaseRepository {
    pool: DynDatabasePool,
}

impl SqlxDiseaseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DiseaseRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DiseaseRepository for SqlxDiseaseRepository {
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Disease>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite(&self.pool)?, limit, offset).await,
            DatabaseDriver::Mysql => list_mysql(mysql(&self.pool)?, limit, offset).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Disease>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn create(&self, disease: &Disease) -> Result<Disease> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite(&self.pool)?, disease).await,
            DatabaseDriver::Mysql => create_mysql(mysql(&self.pool)?, disease).await,
        }
    }

    async fn update(&self, disease: &Disease) -> Result<Option<Disease>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(sqlite(&self.pool)?, disease).await,
            DatabaseDriver::Mysql => update_mysql(mysql(&self.pool)?, disease).await,
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => soft_delete_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => soft_delete_mysql(mysql(&self.pool)?, id).await,
        }
    }
}

// SQLite implementations
async fn list_sqlite(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Disease>> {
    let rows = sqlx::query(
        "SELECT id, name, description, created_at, updated_at FROM diseases \
         WHERE deleted_at IS NULL ORDER BY id ASC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list diseases")?;
    Ok(rows.iter().map(row_to_disease_sqlite).collect())
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Disease>> {
    let row = sqlx::query(
        "SELECT id, name, description, created_at, updated_at FROM diseases \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get disease")?;
    Ok(row.as_ref().map(row_to_disease_sqlite))
}

async fn create_sqlite(pool: &SqlitePool, disease: &Disease) -> Result<Disease> {
    let result = sqlx::query(
        "INSERT INTO diseases (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&disease.name)
    .bind(&disease.description)
    .bind(disease.created_at)
    .bind(disease.updated_at)
    .execute(pool)
    .await
    .context("Failed to create disease")?;

    let mut created = disease.clone();
    created.id = result.last_insert_rowid();
    Ok(created)
}

async fn update_sqlite(pool: &SqlitePool, disease: &Disease) -> Result<Option<Disease>> {
    let result = sqlx::query(
        "UPDATE diseases SET name = ?, description = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&disease.name)
    .bind(&disease.description)
    .bind(disease.updated_at)
    .bind(disease.id)
    .execute(pool)
    .await
    .context("Failed to update disease")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(disease.clone()))
}

async fn soft_delete_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE diseases SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to delete disease")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_disease_sqlite(row: &sqlx::sqlite::SqliteRow) -> Disease {
    Disease {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// MySQL implementations
async fn list_mysql(pool: &MySqlPool, limit: i64, offset: i64) -> Result<Vec<Disease>> {
    let rows = sqlx::query(
        "SELECT id, name, description, created_at, updated_at FROM diseases \
         WHERE deleted_at IS NULL ORDER BY id ASC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list diseases")?;
    Ok(rows.iter().map(row_to_disease_mysql).collect())
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Disease>> {
    let row = sqlx::query(
        "SELECT id, name, description, created_at, updated_at FROM diseases \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get disease")?;
    Ok(row.as_ref().map(row_to_disease_mysql))
}

async fn create_mysql(pool: &MySqlPool, disease: &Disease) -> Result<Disease> {
    let result = sqlx::query(
        "INSERT INTO diseases (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&disease.name)
    .bind(&disease.description)
    .bind(disease.created_at)
    .bind(disease.updated_at)
    .execute(pool)
    .await
    .context("Failed to create disease")?;

    let mut created = disease.clone();
    created.id = result.last_insert_id() as i64;
    Ok(created)
}

async fn update_mysql(pool: &MySqlPool, disease: &Disease) -> Result<Option<Disease>> {
    let result = sqlx::query(
        "UPDATE diseases SET name = ?, description = ?, updated_at = ? \
         WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&disease.name)
    .bind(&disease.description)
    .bind(disease.updated_at)
    .bind(disease.id)
    .execute(pool)
    .await
    .context("Failed to update disease")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(disease.clone()))
}

async fn soft_delete_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE diseases SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to delete disease")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_disease_mysql(row: &sqlx::mysql::MySqlRow) -> Disease {
    Disease {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
