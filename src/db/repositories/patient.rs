//! Patient repository
//!
//! Listing supports a keyword match on name or patient code and a lower
//! bound on `created_at`. Registration runs the duplicate check and the
//! insert in one transaction.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{ListFilter, Patient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const PATIENT_COLUMNS: &str = "id, full_name, password_hash, gender, age, job, address, \
     phone_number, health_history, surgery_history, patient_code, created_at, updated_at";

/// Binds: keyword, pattern, pattern, created_since, created_since
const LIST_CONDITIONS: &str = "deleted_at IS NULL \
     AND (? = '' OR full_name LIKE ? OR patient_code LIKE ?) \
     AND (? IS NULL OR created_at >= ?)";

#[async_trait]
pub trait PatientRepository: Send + Sync {
    /// Page of patients ordered by patient code
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Patient>>;

    /// Number of patients matching the filter, ignoring limit and offset
    async fn count(&self, filter: &ListFilter) -> Result<i64>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Patient>>;

    /// Insert unless a patient with the same full name already uses one of
    /// the phone numbers. Returns `None` for a duplicate.
    async fn create_unique(&self, patient: &Patient) -> Result<Option<Patient>>;

    /// Write every column of an existing patient. Returns `None` when no
    /// live patient has its id.
    async fn update(&self, patient: &Patient) -> Result<Option<Patient>>;

    /// Returns false if no live patient had this id
    async fn soft_delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxPatientRepository {
    pool: DynDatabasePool,
}

impl SqlxPatientRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PatientRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PatientRepository for SqlxPatientRepository {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Patient>> {
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

    async fn get_by_id(&self, id: i64) -> Result<Option<Patient>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn create_unique(&self, patient: &Patient) -> Result<Option<Patient>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_unique_sqlite(sqlite(&self.pool)?, patient).await,
            DatabaseDriver::Mysql => create_unique_mysql(mysql(&self.pool)?, patient).await,
        }
    }

    async fn update(&self, patient: &Patient) -> Result<Option<Patient>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(sqlite(&self.pool)?, patient).await,
            DatabaseDriver::Mysql => update_mysql(mysql(&self.pool)?, patient).await,
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => soft_delete_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => soft_delete_mysql(mysql(&self.pool)?, id).await,
        }
    }
}

/// A stored patient is a duplicate when its phone column equals the new
/// comma-joined list or equals any single new number.
fn is_duplicate_phone(existing: &[String], phone_number: &str) -> bool {
    existing.iter().any(|stored| {
        stored == phone_number || phone_number.split(',').any(|phone| phone == stored)
    })
}

// SQLite implementations
async fn list_sqlite(pool: &SqlitePool, filter: &ListFilter) -> Result<Vec<Patient>> {
    let sql = format!(
        "SELECT {} FROM patients WHERE {} ORDER BY patient_code ASC, id ASC LIMIT ? OFFSET ?",
        PATIENT_COLUMNS, LIST_CONDITIONS
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
        .context("Failed to list patients")?;
    Ok(rows.iter().map(row_to_patient_sqlite).collect())
}

async fn count_sqlite(pool: &SqlitePool, filter: &ListFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM patients WHERE {}", LIST_CONDITIONS);
    let pattern = filter.like_pattern();
    let row = sqlx::query(&sql)
        .bind(filter.keyword())
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.created_since)
        .bind(filter.created_since)
        .fetch_one(pool)
        .await
        .context("Failed to count patients")?;
    Ok(row.get(0))
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Patient>> {
    let sql = format!(
        "SELECT {} FROM patients WHERE id = ? AND deleted_at IS NULL",
        PATIENT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get patient")?;
    Ok(row.as_ref().map(row_to_patient_sqlite))
}

async fn create_unique_sqlite(pool: &SqlitePool, patient: &Patient) -> Result<Option<Patient>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let existing: Vec<String> = sqlx::query(
        "SELECT phone_number FROM patients WHERE full_name = ? AND deleted_at IS NULL",
    )
    .bind(&patient.full_name)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to check for existing patient")?
    .iter()
    .map(|r| r.get("phone_number"))
    .collect();

    if is_duplicate_phone(&existing, &patient.phone_number) {
        tx.rollback().await.context("Failed to roll back transaction")?;
        return Ok(None);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO patients (full_name, password_hash, gender, age, job, address, phone_number,
                              health_history, surgery_history, patient_code, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&patient.full_name)
    .bind(&patient.password_hash)
    .bind(&patient.gender)
    .bind(patient.age)
    .bind(&patient.job)
    .bind(&patient.address)
    .bind(&patient.phone_number)
    .bind(&patient.health_history)
    .bind(&patient.surgery_history)
    .bind(&patient.patient_code)
    .bind(patient.created_at)
    .bind(patient.updated_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create patient")?;

    tx.commit().await.context("Failed to commit transaction")?;

    let mut created = patient.clone();
    created.id = result.last_insert_rowid();
    Ok(Some(created))
}

async fn update_sqlite(pool: &SqlitePool, patient: &Patient) -> Result<Option<Patient>> {
    let result = sqlx::query(
        r#"
        UPDATE patients
        SET full_name = ?, password_hash = ?, gender = ?, age = ?, job = ?, address = ?,
            phone_number = ?, health_history = ?, surgery_history = ?, patient_code = ?,
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&patient.full_name)
    .bind(&patient.password_hash)
    .bind(&patient.gender)
    .bind(patient.age)
    .bind(&patient.job)
    .bind(&patient.address)
    .bind(&patient.phone_number)
    .bind(&patient.health_history)
    .bind(&patient.surgery_history)
    .bind(&patient.patient_code)
    .bind(patient.updated_at)
    .bind(patient.id)
    .execute(pool)
    .await
    .context("Failed to update patient")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(patient.clone()))
}

async fn soft_delete_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE patients SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to delete patient")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_patient_sqlite(row: &sqlx::sqlite::SqliteRow) -> Patient {
    Patient {
        id: row.get("id"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        gender: row.get("gender"),
        age: row.get("age"),
        job: row.get("job"),
        address: row.get("address"),
        phone_number: row.get("phone_number"),
        health_history: row.get("health_history"),
        surgery_history: row.get("surgery_history"),
        patient_code: row.get("patient_code"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// MySQL implementations
async fn list_mysql(pool: &MySqlPool, filter: &ListFilter) -> Result<Vec<Patient>> {
    let sql = format!(
        "SELECT {} FROM patients WHERE {} ORDER BY patient_code ASC, id ASC LIMIT ? OFFSET ?",
        PATIENT_COLUMNS, LIST_CONDITIONS
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
        .context("Failed to list patients")?;
    Ok(rows.iter().map(row_to_patient_mysql).collect())
}

async fn count_mysql(pool: &MySqlPool, filter: &ListFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM patients WHERE {}", LIST_CONDITIONS);
    let pattern = filter.like_pattern();
    let row = sqlx::query(&sql)
        .bind(filter.keyword())
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.created_since)
        .bind(filter.created_since)
        .fetch_one(pool)
        .await
        .context("Failed to count patients")?;
    Ok(row.get(0))
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Patient>> {
    let sql = format!(
        "SELECT {} FROM patients WHERE id = ? AND deleted_at IS NULL",
        PATIENT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get patient")?;
    Ok(row.as_ref().map(row_to_patient_mysql))
}

async fn create_unique_mysql(pool: &MySqlPool, patient: &Patient) -> Result<Option<Patient>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let existing: Vec<String> = sqlx::query(
        "SELECT phone_number FROM patients WHERE full_name = ? AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(&patient.full_name)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to check for existing patient")?
    .iter()
    .map(|r| r.get("phone_number"))
    .collect();

    if is_duplicate_phone(&existing, &patient.phone_number) {
        tx.rollback().await.context("Failed to roll back transaction")?;
        return Ok(None);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO patients (full_name, password_hash, gender, age, job, address, phone_number,
                              health_history, surgery_history, patient_code, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&patient.full_name)
    .bind(&patient.password_hash)
    .bind(&patient.gender)
    .bind(patient.age)
    .bind(&patient.job)
    .bind(&patient.address)
    .bind(&patient.phone_number)
    .bind(&patient.health_history)
    .bind(&patient.surgery_history)
    .bind(&patient.patient_code)
    .bind(patient.created_at)
    .bind(patient.updated_at)
    .execute(&mut *tx)
    .await
    .context("Failed to create patient")?;

    tx.commit().await.context("Failed to commit transaction")?;

    let mut created = patient.clone();
    created.id = result.last_insert_id() as i64;
    Ok(Some(created))
}

async fn update_mysql(pool: &MySqlPool, patient: &Patient) -> Result<Option<Patient>> {
    let result = sqlx::query(
        r#"
        UPDATE patients
        SET full_name = ?, password_hash = ?, gender = ?, age = ?, job = ?, address = ?,
            phone_number = ?, health_history = ?, surgery_history = ?, patient_code = ?,
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&patient.full_name)
    .bind(&patient.password_hash)
    .bind(&patient.gender)
    .bind(patient.age)
    .bind(&patient.job)
    .bind(&patient.address)
    .bind(&patient.phone_number)
    .bind(&patient.health_history)
    .bind(&patient.surgery_history)
    .bind(&patient.patient_code)
    .bind(patient.updated_at)
    .bind(patient.id)
    .execute(pool)
    .await
    .context("Failed to update patient")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(patient.clone()))
}

async fn soft_delete_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE patients SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to delete patient")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_patient_mysql(row: &sqlx::mysql::MySqlRow) -> Patient {
    Patient {
        id: row.get("id"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        gender: row.get("gender"),
        age: row.get("age"),
        job: row.get("job"),
        address: row.get("address"),
        phone_number: row.get("phone_number"),
        health_history: row.get("health_history"),
        surgery_history: row.get("surgery_history"),
        patient_code: row.get("patient_code"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreatePatientInput, StringList};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPatientRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxPatientRepository::new(pool.clone());
        (pool, repo)
    }

    fn test_patient(name: &str, code: &str, phones: &[&str]) -> Patient {
        CreatePatientInput {
            full_name: name.to_string(),
            phone_number: StringList(phones.iter().map(|p| p.to_string()).collect()),
            patient_code: code.to_string(),
            ..Default::default()
        }
        .into_patient(None)
    }

    #[test]
    fn test_is_duplicate_phone() {
        let existing = vec!["0811,0812".to_string(), "0899".to_string()];
        assert!(is_duplicate_phone(&existing, "0811,0812"));
        assert!(is_duplicate_phone(&existing, "0899,0800"));
        assert!(!is_duplicate_phone(&existing, "0811"));
        assert!(!is_duplicate_phone(&[], "0811"));
    }

    #[tokio::test]
    async fn test_create_and_get_patient() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create_unique(&test_patient("Budi", "P-001", &["0811", "0812"]))
            .await
            .unwrap()
            .expect("Patient should be created");
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("Patient not found");
        assert_eq!(found.full_name, "Budi");
        assert_eq!(found.phone_number, "0811,0812");
    }

    #[tokio::test]
    async fn test_create_duplicate_returns_none() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create_unique(&test_patient("Budi", "P-001", &["0811"]))
            .await
            .unwrap();

        let duplicate = repo
            .create_unique(&test_patient("Budi", "P-002", &["0811"]))
            .await
            .unwrap();
        assert!(duplicate.is_none());

        // Same name with a different phone is a different patient
        let other = repo
            .create_unique(&test_patient("Budi", "P-003", &["0822"]))
            .await
            .unwrap();
        assert!(other.is_some());
    }

    #[tokio::test]
    async fn test_list_orders_by_code_and_filters() {
        let (_pool, repo) = setup_test_repo().await;
        for (name, code, phone) in [
            ("Citra", "P-003", "0833"),
            ("Andi", "P-001", "0811"),
            ("Budi", "P-002", "0822"),
        ] {
            repo.create_unique(&test_patient(name, code, &[phone]))
                .await
                .unwrap();
        }

        let all = repo.list(&ListFilter::default()).await.unwrap();
        let codes: Vec<&str> = all.iter().map(|p| p.patient_code.as_str()).collect();
        assert_eq!(codes, vec!["P-001", "P-002", "P-003"]);

        let page = ListFilter {
            limit: Some(1),
            offset: 1,
            ..Default::default()
        };
        let paged = repo.list(&page).await.unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].patient_code, "P-002");
        assert_eq!(repo.count(&page).await.unwrap(), 3);

        let by_keyword = ListFilter {
            keyword: Some("itr".to_string()),
            ..Default::default()
        };
        let found = repo.list(&by_keyword).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name, "Citra");
        assert_eq!(repo.count(&by_keyword).await.unwrap(), 1);

        let by_code = ListFilter {
            keyword: Some("P-00".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count(&by_code).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_created_since() {
        let (_pool, repo) = setup_test_repo().await;
        let mut old = test_patient("Lama", "P-001", &["0811"]);
        old.created_at = Utc::now() - Duration::days(10);
        repo.create_unique(&old).await.unwrap();
        repo.create_unique(&test_patient("Baru", "P-002", &["0822"]))
            .await
            .unwrap();

        let recent = ListFilter {
            created_since: Some(Utc::now() - Duration::days(2)),
            ..Default::default()
        };
        let found = repo.list(&recent).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name, "Baru");
    }

    #[tokio::test]
    async fn test_update_patient() {
        let (_pool, repo) = setup_test_repo().await;
        let mut patient = repo
            .create_unique(&test_patient("Budi", "P-001", &["0811"]))
            .await
            .unwrap()
            .unwrap();

        patient.job = "Farmer".to_string();
        patient.password_hash = Some("hash".to_string());
        assert!(repo.update(&patient).await.unwrap().is_some());

        let found = repo.get_by_id(patient.id).await.unwrap().unwrap();
        assert_eq!(found.job, "Farmer");
        assert_eq!(found.password_hash.as_deref(), Some("hash"));
    }

    #[tokio::test]
    async fn test_update_deleted_patient_reports_none() {
        let (_pool, repo) = setup_test_repo().await;
        let mut patient = repo
            .create_unique(&test_patient("Budi", "P-001", &["0811"]))
            .await
            .unwrap()
            .unwrap();
        assert!(repo.soft_delete(patient.id).await.unwrap());

        patient.job = "Farmer".to_string();
        assert!(repo.update(&patient).await.unwrap().is_none());

        patient.id = 404;
        assert!(repo.update(&patient).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_patient() {
        let (pool, repo) = setup_test_repo().await;
        let patient = repo
            .create_unique(&test_patient("Budi", "P-001", &["0811"]))
            .await
            .unwrap()
            .unwrap();

        assert!(repo.soft_delete(patient.id).await.unwrap());
        assert!(!repo.soft_delete(patient.id).await.unwrap());
        assert!(repo.get_by_id(patient.id).await.unwrap().is_none());
        assert_eq!(repo.count(&ListFilter::default()).await.unwrap(), 0);

        // Row is kept with a deletion timestamp
        let row = sqlx::query("SELECT deleted_at FROM patients WHERE id = ?")
            .bind(patient.id)
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        let deleted_at: Option<chrono::DateTime<Utc>> = row.get("deleted_at");
        assert!(deleted_at.is_some());

        // A deleted patient no longer blocks re-registration
        let again = repo
            .create_unique(&test_patient("Budi", "P-001", &["0811"]))
            .await
            .unwrap();
        assert!(again.is_some());
    }
}
