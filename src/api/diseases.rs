//! Disease API endpoints

use axum::{extract::State, routing::get, Router};

use crate::api::common::{ApiJson, ApiPath, ApiQuery, ListQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ApiSuccess;
use crate::models::{Disease, DiseaseInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/disease", get(list_diseases).post(create_disease))
        .route(
            "/disease/{id}",
            get(get_disease).patch(update_disease).delete(delete_disease),
        )
}

/// GET /disease - `limit` defaults to 10
async fn list_diseases(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<ApiSuccess<Vec<Disease>>, ApiError> {
    let diseases = state
        .disease_service
        .list(query.limit(), query.offset())
        .await?;
    Ok(ApiSuccess::ok("Diseases retrieved", diseases))
}

/// GET /disease/{id}
async fn get_disease(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiSuccess<Disease>, ApiError> {
    let disease = state.disease_service.get(id).await?;
    Ok(ApiSuccess::ok("Disease retrieved", disease))
}

/// POST /disease
async fn create_disease(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<DiseaseInput>,
) -> Result<ApiSuccess<Disease>, ApiError> {
    let disease = state.disease_service.create(input).await?;
    Ok(ApiSuccess::ok("Disease created", disease))
}

/// PATCH /disease/{id}
async fn update_disease(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<DiseaseInput>,
) -> Result<ApiSuccess<Disease>, ApiError> {
    let disease = state.disease_service.update(id, input).await?;
    Ok(ApiSuccess::ok("Disease updated", disease))
}

/// DELETE /disease/{id}
async fn delete_disease(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiSuccess<()>, ApiError> {
    state.disease_service.delete(id).await?;
    Ok(ApiSuccess::message("Disease deleted"))
}
