//! Service root and health endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ApiSuccess;

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub version: &'static str,
    pub database: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
}

/// GET /
async fn welcome(State(state): State<AppState>) -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: format!("Welcome to {}!", state.app_name),
    })
}

/// GET /health - Pings the database
async fn health(State(state): State<AppState>) -> Result<ApiSuccess<HealthResponse>, ApiError> {
    if let Err(e) = state.pool.ping().await {
        tracing::error!("Health check failed: {:#}", e);
        return Err(ApiError::service_unavailable("Database unavailable"));
    }

    Ok(ApiSuccess::ok(
        "Service healthy",
        HealthResponse {
            version: env!("CARGO_PKG_VERSION"),
            database: "ok",
        },
    ))
}
