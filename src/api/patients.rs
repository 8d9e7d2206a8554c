//! Patient API endpoints
//!
//! Registration (POST /patient) is public so patients can sign themselves
//! up; everything else requires a session.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};

use crate::api::common::{ApiJson, ApiPath, ApiQuery, ListQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiSuccess, PatientListData};
use crate::models::{CreatePatientInput, Patient, UpdatePatientInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/patient", post(create_patient))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/patient", get(list_patients))
        .route(
            "/patient/{id}",
            get(get_patient).patch(update_patient).delete(delete_patient),
        )
}

/// GET /patient
async fn list_patients(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<ApiSuccess<PatientListData>, ApiError> {
    let filter = query.to_filter(chrono::Utc::now());
    let result = state.patient_service.list(&filter).await?;
    Ok(ApiSuccess::ok(
        "Patients retrieved",
        PatientListData {
            total: result.total,
            patients: result.items,
        },
    ))
}

/// GET /patient/{id}
async fn get_patient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiSuccess<Patient>, ApiError> {
    let patient = state.patient_service.get(id).await?;
    Ok(ApiSuccess::ok("Patient retrieved", patient))
}

/// POST /patient
async fn create_patient(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreatePatientInput>,
) -> Result<ApiSuccess<Patient>, ApiError> {
    let patient = state.patient_service.create(input).await?;
    Ok(ApiSuccess::ok("Patient created", patient))
}

/// PATCH /patient/{id}
async fn update_patient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdatePatientInput>,
) -> Result<ApiSuccess<Patient>, ApiError> {
    let patient = state.patient_service.update(id, input).await?;
    Ok(ApiSuccess::ok("Patient updated", patient))
}

/// DELETE /patient/{id}
async fn delete_patient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiSuccess<()>, ApiError> {
    state.patient_service.delete(id).await?;
    Ok(ApiSuccess::message("Patient deleted"))
}
