//! Therapist repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{ListFilter, Therapist};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const THERAPIST_COLUMNS: &str = "id, full_name, email, password_hash, phone_number, address, \
     date_of_birth, nik, weight, height, role, is_approved, created_at, updated_at";

/// Binds: keyword, pattern, pattern, created_since, created_since
const LIST_CONDITIONS: &str = "deleted_at IS NULL \
     AND (? = '' OR full_name LIKE ? OR nik LIKE ?) \
     AND (? IS NULL OR created_at >= ?)";

#[async_trait]
pub trait TherapistRepository: Send + Sync {
    /// Page of therapists in registration order
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Therapist>>;
    async fn count(&self, filter: &ListFilter) -> Result<i64>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Therapist>>;
    /// Insert unless a therapist with the same email and NIK exists.
    /// Returns `None` for a duplicate.
    async fn create_unique(&self, therapist: &Therapist) -> Result<Option<Therapist>>;
    /// Returns `None` when no live therapist has this id.
    async fn update(&self, therapist: &Therapist) -> Result<Option<Therapist>>;
    async fn soft_delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxTherapistRepository {
    pool: DynDatabasePool,
}

impl SqlxTherapistRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TherapistRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TherapistRepository for SqlxTherapistRepository {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Therapist>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite(&self.pool)?, filter).await,
            DatabaseDriver::Mysql => list_mysql(mysql(&self.pool)?, filter).await,
        }
    }

    async fn count(&self, filter: &ListFilter) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_sqlite(sqlite(&self.pool)?, filter).await,
            DatabaseDriver::Mysql => count_mysql(mysql(&self.pool)?, filter).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Therapist>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn create_unique(&self, therapist: &Therapist) -> Result<Option<Therapist>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_unique_sqlite(sqlite(&self.pool)?, therapist).await,
            DatabaseDriver::Mysql => create_unique_mysql(mysql(&self.pool)?, therapist).await,
        }
    }

    async fn update(&self, therapist: &Therapist) -> Result<Option<Therapist>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(sqlite(&self.pool)?, therapist).await,
            DatabaseDriver::Mysql => update_mysql(mysql(&self.pool)?, therapist).await,
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
async fn list_sqlite(pool: &SqlitePool, filter: &ListFilter) -> Result<Vec<Therapist>> {
    let sql = format!(
        "SELECT {} FROM therapists WHERE {} ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
        THERAPIST_COLUMNS, LIST_CONDITIONS
    );
    let pattern = filter.like_pattern();
    let rows = sqlx::query(&sql)
        .bind(filter.keyword())
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.created_since)
        .bind(filter.created_since)
        .bind(filter.sql_limit())
        .bind(filter.sql_offset())
        .fetch_all(pool)
        .await
        .context("Failed to list therapists")?;
    Ok(rows.iter().map(row_to_therapist_sqlite).collect())
}

async fn count_sqlite(pool: &SqlitePool, filter: &ListFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM therapists WHERE {}", LIST_CONDITIONS);
    let pattern = filter.like_pattern();
    let row = sqlx::query(&sql)
        .bind(filter.keyword())
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.created_since)
        .bind(filter.created_since)
        .fetch_one(pool)
        .await
        .context("Failed to count therapists")?;
    Ok(row.get(0))
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Therapist>> {
    let sql = format!(
        "SELECT {} FROM therapists WHERE id = ? AND deleted_at IS NULL",
        THERAPIST_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get therapist")?;
    Ok(row.as_ref().map(row_to_therapist_sqlite))
}

async fn create_unique_sqlite(
    pool: &SqlitePool,
    therapist: &Therapist,
) -> Result<Option<Therapist>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let existing = sqlx::query(
        "SELECT id FROM therapists WHERE email = ? AND nik = ? AND deleted_at IS NULL LIMIT 1",
    )
    .bind(&therapist.email)
    .bind(&therapist.nik)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to check for existing therapist")?;

    if existing.is_some() {
        tx.rollback().await.context("Failed to roll back transaction")?;
        return Ok(None);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO therapists (full_name, email, password_hash, phone_number, address, date_of_birth,
                                nik, weight, height, role, is_approved, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&therapist.full_name)
    .bind(&therapist.email)
    .bind(&therapist.password_hash)
    .bind(&therapist.phone_number)
    .bind(&therapist.address)
    .bind(&therapist.date_of_birth)
    .bind(&therapist.nik)
    .bind(therapist.weight)
    .bind(therapist.height)
    .bind(&therapist.role)
    .bind(therapist.is_approved)
    .bind(therapist.created_at)
    .bind(therapist.updated_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create therapist")?;

    tx.commit().await.context("Failed to commit transaction")?;

    let mut created = therapist.clone();
    created.id = result.last_insert_rowid();
    Ok(Some(created))
}

async fn update_sqlite(pool: &SqlitePool, therapist: &Therapist) -> Result<Option<Therapist>> {
    let result = sqlx::query(
        r#"
        UPDATE therapists
        SET full_name = ?, email = ?, password_hash = ?, phone_number = ?, address = ?,
            date_of_birth = ?, nik = ?, weight = ?, height = ?, role = ?, is_approved = ?,
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&therapist.full_name)
    .bind(&therapist.email)
    .bind(&therapist.password_hash)
    .bind(&therapist.phone_number)
    .bind(&therapist.address)
    .bind(&therapist.date_of_birth)
    .bind(&therapist.nik)
    .bind(therapist.weight)
    .bind(therapist.height)
    .bind(&therapist.role)
    .bind(therapist.is_approved)
    .bind(therapist.updated_at)
    .bind(therapist.id)
    .execute(pool)
    .await
    .context("Failed to update therapist")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(therapist.clone()))
}

async fn soft_delete_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE therapists SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to delete therapist")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_therapist_sqlite(row: &sqlx::sqlite::SqliteRow) -> Therapist {
    Therapist {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        phone_number: row.get("phone_number"),
        address: row.get("address"),
        date_of_birth: row.get("date_of_birth"),
        nik: row.get("nik"),
        weight: row.get("weight"),
        height: row.get("height"),
        role: row.get("role"),
        is_approved: row.get("is_approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// MySQL implementations
async fn list_mysql(pool: &MySqlPool, filter: &ListFilter) -> Result<Vec<Therapist>> {
    let sql = format!(
        "SELECT {} FROM therapists WHERE {} ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
        THERAPIST_COLUMNS, LIST_CONDITIONS
    );
    let pattern = filter.like_pattern();
    let rows = sqlx::query(&sql)
        .bind(filter.keyword())
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.created_since)
        .bind(filter.created_since)
        .bind(filter.sql_limit())
        .bind(filter.sql_offset())
        .fetch_all(pool)
        .await
        .context("Failed to list therapists")?;
    Ok(rows.iter().map(row_to_therapist_mysql).collect())
}

async fn count_mysql(pool: &MySqlPool, filter: &ListFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM therapists WHERE {}", LIST_CONDITIONS);
    let pattern = filter.like_pattern();
    let row = sqlx::query(&sql)
        .bind(filter.keyword())
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.created_since)
        .bind(filter.created_since)
        .fetch_one(pool)
        .await
        .context("Failed to count therapists")?;
    Ok(row.get(0))
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Therapist>> {
    let sql = format!(
        "SELECT {} FROM therapists WHERE id = ? AND deleted_at IS NULL",
        THERAPIST_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get therapist")?;
    Ok(row.as_ref().map(row_to_therapist_mysql))
}

async fn create_unique_mysql(pool: &MySqlPool, therapist: &Therapist) -> Result<Option<Therapist>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let existing = sqlx::query(
        "SELECT id FROM therapists WHERE email = ? AND nik = ? AND deleted_at IS NULL LIMIT 1 FOR UPDATE",
    )
    .bind(&therapist.email)
    .bind(&therapist.nik)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to check for existing therapist")?;

    if existing.is_some() {
        tx.rollback().await.context("Failed to roll back transaction")?;
        return Ok(None);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO therapists (full_name, email, password_hash, phone_number, address, date_of_birth,
                                nik, weight, height, role, is_approved, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&therapist.full_name)
    .bind(&therapist.email)
    .bind(&therapist.password_hash)
    .bind(&therapist.phone_number)
    .bind(&therapist.address)
    .bind(&therapist.date_of_birth)
    .bind(&therapist.nik)
    .bind(therapist.weight)
    .bind(therapist.height)
    .bind(&therapist.role)
    .bind(therapist.is_approved)
    .bind(therapist.created_at)
    .bind(therapist.updated_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create therapist")?;

    tx.commit().await.context("Failed to commit transaction")?;

    let mut created = therapist.clone();
    created.id = result.last_insert_id() as i64;
    Ok(Some(created))
}

async fn update_mysql(pool: &MySqlPool, therapist: &Therapist) -> Result<Option<Therapist>> {
    let result = sqlx::query(
        r#"
        UPDATE therapists
        SET full_name = ?, email = ?, password_hash = ?, phone_number = ?, address = ?,
            date_of_birth = ?, nik = ?, weight = ?, height = ?, role = ?, is_approved = ?,
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&therapist.full_name)
    .bind(&therapist.email)
    .bind(&therapist.password_hash)
    .bind(&therapist.phone_number)
    .bind(&therapist.address)
    .bind(&therapist.date_of_birth)
    .bind(&therapist.nik)
    .bind(therapist.weight)
    .bind(therapist.height)
    .bind(&therapist.role)
    .bind(therapist.is_approved)
    .bind(therapist.updated_at)
    .bind(therapist.id)
    .execute(pool)
    .await
    .context("Failed to update therapist")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(therapist.clone()))
}

async fn soft_delete_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE therapists SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to delete therapist")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_therapist_mysql(row: &sqlx::mysql::MySqlRow) -> Therapist {
    Therapist {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        phone_number: row.get("phone_number"),
        address: row.get("address"),
        date_of_birth: row.get("date_of_birth"),
        nik: row.get("nik"),
        weight: row.get("weight"),
        height: row.get("height"),
        role: row.get("role"),
        is_approved: row.get("is_approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
