//! Therapist service
//!
//! Profile edits and approval are separate operations: a regular update may
//! never flip `is_approved`, and approval changes nothing else.

use std::sync::Arc;

use super::error::{ServiceError, ServiceResult};
use super::password::PasswordHasher;
use super::ListResult;
use crate::db::repositories::TherapistRepository;
use crate::models::{CreateTherapistInput, ListFilter, Therapist, UpdateTherapistInput};

pub const MSG_ALREADY_REGISTERED: &str = "Therapist already registered";
pub const MSG_NOT_FOUND: &str = "Therapist not found";
pub const MSG_APPROVAL_NOT_ALLOWED: &str = "Cannot update therapist approval";
pub const MSG_APPROVAL_ONLY: &str = "Changes allowed only for approval and it must be true";

pub struct TherapistService {
    repo: Arc<dyn TherapistRepository>,
    hasher: PasswordHasher,
}

impl TherapistService {
    pub fn new(repo: Arc<dyn TherapistRepository>, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    pub async fn list(&self, filter: &ListFilter) -> ServiceResult<ListResult<Therapist>> {
        let items = self.repo.list(filter).await?;
        let total = self.repo.count(filter).await?;
        Ok(ListResult { total, items })
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Therapist> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(MSG_NOT_FOUND))
    }

    pub async fn create(&self, input: CreateTherapistInput) -> ServiceResult<Therapist> {
        if let Some(field) = input.missing_field() {
            return Err(ServiceError::validation(format!(
                "{} is empty or missing required fields",
                field
            )));
        }

        let password_hash = match input.password.as_deref() {
            Some(password) if !password.is_empty() => Some(self.hasher.hash(password)?),
            _ => None,
        };
        let therapist = input.into_therapist(password_hash);

        let created = self
            .repo
            .create_unique(&therapist)
            .await?
            .ok_or_else(|| ServiceError::conflict(MSG_ALREADY_REGISTERED))?;

        tracing::info!(therapist_id = created.id, "Therapist registered");
        Ok(created)
    }

    /// Edit profile fields. Rejects payloads that try to approve.
    pub async fn update(&self, id: i64, input: UpdateTherapistInput) -> ServiceResult<Therapist> {
        if input.requests_approval() {
            return Err(ServiceError::validation(MSG_APPROVAL_NOT_ALLOWED));
        }

        let mut therapist = self.get(id).await?;
        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            therapist.password_hash = Some(self.hasher.hash(password)?);
        }
        input.apply_to(&mut therapist);

        self.repo
            .update(&therapist)
            .await?
            .ok_or_else(|| ServiceError::not_found(MSG_NOT_FOUND))
    }

    /// Approve a therapist. The payload must carry `is_approved: true`.
    pub async fn approve(&self, id: i64, input: UpdateTherapistInput) -> ServiceResult<Therapist> {
        if !input.requests_approval() {
            return Err(ServiceError::validation(MSG_APPROVAL_ONLY));
        }

        let mut therapist = self.get(id).await?;
        therapist.is_approved = true;
        therapist.updated_at = chrono::Utc::now();

        let approved = self
            .repo
            .update(&therapist)
            .await?
            .ok_or_else(|| ServiceError::not_found(MSG_NOT_FOUND))?;
        tracing::info!(therapist_id = id, "Therapist approved");
        Ok(approved)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.soft_delete(id).await? {
            return Err(ServiceError::not_found(MSG_NOT_FOUND));
        }
        tracing::info!(therapist_id = id, "Therapist deleted");
        Ok(())
    }
}
