//! Disease service

use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use crate::db::repositories::DiseaseRepository;
use crate::models::{Disease, DiseaseInput};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MSG_NOT_FOUND: &str = "Disease not found";
pub const MSG_NAME_REQUIRED: &str = "Disease name is required";

pub struct DiseaseService {
    repo: Arc<dyn DiseaseRepository>,
}

impl DiseaseService {
    pub fn new(repo: Arc<dyn DiseaseRepository>) -> Self {
        Self { repo }
    }

    /// Page of diseases; limit defaults to 10 and offset to 0.
    pub async fn list(&self, limit: Option<i64>, offset: Option<i64>) -> ServiceResult<Vec<Disease>> {
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        Ok(self.repo.list(limit, offset).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Disease> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(MSG_NOT_FOUND))
    }

    pub async fn create(&self, input: DiseaseInput) -> ServiceResult<Disease> {
        let name = input.name.as_deref().map(str::trim).unwrap_or("");
        if name.is_empty() {
            return Err(ServiceError::validation(MSG_NAME_REQUIRED));
        }

        let disease = Disease::new(name.to_string(), input.description.unwrap_or_default());
        Ok(self.repo.create(&disease).await?)
    }

    pub async fn update(&self, id: i64, input: DiseaseInput) -> ServiceResult<Disease> {
        let mut disease = self.get(id).await?;
        input.apply_to(&mut disease);
        self.repo
            .update(&disease)
            .await?
            .ok_or_else(|| ServiceError::not_found(MSG_NOT_FOUND))
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.soft_delete(id).await? {
            return Err(ServiceError::not_found(MSG_NOT_FOUND));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxDiseaseRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> DiseaseService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        DiseaseService::new(SqlxDiseaseRepository::boxed(pool))
    }

    fn named(name: &str) -> DiseaseInput {
        DiseaseInput {
            name: Some(name.to_string()),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_list_defaults_to_ten() {
        let service = setup_test_service().await;
        for i in 0..12 {
            service.create(named(&format!("Disease {i}"))).await.unwrap();
        }

        assert_eq!(service.list(None, None).await.unwrap().len(), 10);
        assert_eq!(service.list(Some(0), None).await.unwrap().len(), 10);
        assert_eq!(service.list(Some(20), Some(10)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let service = setup_test_service().await;
        let result = service.create(DiseaseInput::default()).await;
        assert!(matches!(result, Err(ServiceError::Validation(msg)) if msg == MSG_NAME_REQUIRED));
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let service = setup_test_service().await;
        let created = service
            .create(DiseaseInput {
                name: Some("Asthma".to_string()),
                description: Some("Airway".to_string()),
            })
            .await
            .unwrap();

        let updated = service
            .update(
                created.id,
                DiseaseInput {
                    name: None,
                    description: Some("Chronic airway inflammation".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Asthma");
        assert_eq!(updated.description, "Chronic airway inflammation");
    }

    #[tokio::test]
    async fn test_get_and_delete_missing() {
        let service = setup_test_service().await;
        assert!(matches!(service.get(1).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.delete(1).await, Err(ServiceError::NotFound(_))));
    }
}
