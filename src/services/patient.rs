//! Patient service

use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use super::password::PasswordHasher;
use super::ListResult;
use crate::db::repositories::PatientRepository;
use crate::models::{CreatePatientInput, ListFilter, Patient, UpdatePatientInput};

pub const MSG_MISSING_FIELDS: &str = "Patient payload is empty or missing required fields";
pub const MSG_ALREADY_REGISTERED: &str = "Patient already registered";
pub const MSG_NOT_FOUND: &str = "Patient not found";

pub struct PatientService {
    repo: Arc<dyn PatientRepository>,
    hasher: PasswordHasher,
}

impl PatientService {
    pub fn new(repo: Arc<dyn PatientRepository>, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    /// Page of patients plus the number of patients matching the filter
    pub async fn list(&self, filter: &ListFilter) -> ServiceResult<ListResult<Patient>> {
        let items = self.repo.list(filter).await?;
        let total = self.repo.count(filter).await?;
        Ok(ListResult { total, items })
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Patient> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(MSG_NOT_FOUND))
    }

    pub async fn create(&self, input: CreatePatientInput) -> ServiceResult<Patient> {
        if !input.has_required_fields() {
            return Err(ServiceError::validation(MSG_MISSING_FIELDS));
        }

        let password_hash = self.hash_optional(input.password.as_deref())?;
        let patient = input.into_patient(password_hash);

        let created = self
            .repo
            .create_unique(&patient)
            .await?
            .ok_or_else(|| ServiceError::conflict(MSG_ALREADY_REGISTERED))?;

        tracing::info!(patient_id = created.id, "Patient registered");
        Ok(created)
    }

    /// Merge the supplied fields into an existing patient
    pub async fn update(&self, id: i64, input: UpdatePatientInput) -> ServiceResult<Patient> {
        let mut patient = self.get(id).await?;

        if let Some(hash) = self.hash_optional(input.password.as_deref())? {
            patient.password_hash = Some(hash);
        }
        input.apply_to(&mut patient);

        self.repo
            .update(&patient)
            .await?
            .ok_or_else(|| ServiceError::not_found(MSG_NOT_FOUND))
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.soft_delete(id).await? {
            return Err(ServiceError::not_found(MSG_NOT_FOUND));
        }
        tracing::info!(patient_id = id, "Patient deleted");
        Ok(())
    }

    fn hash_optional(&self, password: Option<&str>) -> ServiceResult<Option<String>> {
        match password {
            Some(password) if !password.is_empty() => Ok(Some(self.hasher.hash(password)?)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxPatientRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::StringList;

    async fn setup_test_service() -> PatientService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        PatientService::new(
            SqlxPatientRepository::boxed(pool),
            PasswordHasher::new("test-secret"),
        )
    }

    fn input(name: &str, phones: &[&str]) -> CreatePatientInput {
        CreatePatientInput {
            full_name: name.to_string(),
            phone_number: StringList(phones.iter().map(|p| p.to_string()).collect()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_with_empty_phone_list_is_rejected() {
        let service = setup_test_service().await;
        let result = service.create(input("Budi", &[])).await;
        assert!(matches!(result, Err(ServiceError::Validation(msg)) if msg == MSG_MISSING_FIELDS));
    }

    #[tokio::test]
    async fn test_create_duplicate_is_conflict() {
        let service = setup_test_service().await;
        service.create(input("Budi", &["0811"])).await.unwrap();

        let result = service.create(input("Budi", &["0811"])).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_hashes_password() {
        let service = setup_test_service().await;
        let mut payload = input("Budi", &["0811"]);
        payload.password = Some("secret".to_string());

        let created = service.create(payload).await.unwrap();
        let hash = created.password_hash.expect("Password should be stored");
        assert!(hash.starts_with("$argon2id$"));
        assert!(service.hasher.verify("secret", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_list_reports_filtered_total() {
        let service = setup_test_service().await;
        service.create(input("Andi", &["0811"])).await.unwrap();
        service.create(input("Budi", &["0822"])).await.unwrap();

        let filter = ListFilter {
            keyword: Some("Budi".to_string()),
            ..Default::default()
        };
        let page = service.list(&filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].full_name, "Budi");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = setup_test_service().await;
        let created = service.create(input("Budi", &["0811"])).await.unwrap();

        let update = UpdatePatientInput {
            address: Some("Jl. Sudirman 5".to_string()),
            ..Default::default()
        };
        let updated = service.update(created.id, update).await.unwrap();
        assert_eq!(updated.address, "Jl. Sudirman 5");
        assert_eq!(service.get(created.id).await.unwrap().address, "Jl. Sudirman 5");

        service.delete(created.id).await.unwrap();
        assert!(matches!(service.get(created.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(created.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_missing_patient() {
        let service = setup_test_service().await;
        let result = service.update(404, UpdatePatientInput::default()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(msg)) if msg == MSG_NOT_FOUND));
    }
}
