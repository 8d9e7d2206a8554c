//! Therapist API endpoints
//!
//! PATCH edits a therapist's details; PUT is reserved for approving one.

use axum::{extract::State, routing::get, Router};

use crate::api::common::{ApiJson, ApiPath, ApiQuery, ListQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiSuccess, TherapistListData};
use crate::models::{CreateTherapistInput, Therapist, UpdateTherapistInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/therapist", get(list_therapists).post(create_therapist))
        .route(
            "/therapist/{id}",
            get(get_therapist)
                .patch(update_therapist)
                .put(approve_therapist)
                .delete(delete_therapist),
        )
}

/// GET /therapist
async fn list_therapists(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<ApiSuccess<TherapistListData>, ApiError> {
    let filter = query.to_filter(chrono::Utc::now());
    let result = state.therapist_service.list(&filter).await?;
    Ok(ApiSuccess::ok(
        "Therapist retrieved",
        TherapistListData {
            total: result.total,
            therapist: result.items,
        },
    ))
}

/// GET /therapist/{id}
async fn get_therapist(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiSuccess<Therapist>, ApiError> {
    let therapist = state.therapist_service.get(id).await?;
    Ok(ApiSuccess::ok("Therapist retrieved", therapist))
}

/// POST /therapist
async fn create_therapist(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateTherapistInput>,
) -> Result<ApiSuccess<Therapist>, ApiError> {
    let therapist = state.therapist_service.create(input).await?;
    Ok(ApiSuccess::ok("Therapist created", therapist))
}

/// PATCH /therapist/{id}
async fn update_therapist(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateTherapistInput>,
) -> Result<ApiSuccess<Therapist>, ApiError> {
    let therapist = state.therapist_service.update(id, input).await?;
    Ok(ApiSuccess::ok("Therapist updated", therapist))
}

/// PUT /therapist/{id} - Approve a therapist
async fn approve_therapist(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<UpdateTherapistInput>,
) -> Result<ApiSuccess<Therapist>, ApiError> {
    let therapist = state.therapist_service.approve(id, input).await?;
    Ok(ApiSuccess::ok("Therapist updated", therapist))
}

/// DELETE /therapist/{id}
async fn delete_therapist(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiSuccess<()>, ApiError> {
    state.therapist_service.delete(id).await?;
    Ok(ApiSuccess::message("Therapist deleted"))
}
