//! Authentication API endpoints
//!
//! - POST /signup - Register and receive a session token
//! - POST /login - Receive a session token
//! - DELETE /logout - End the current session
//! - GET /token/validate - Describe the session behind `session-token`

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Extension, Json, Router,
};

use crate::api::middleware::{extract_session_token, ApiError, AppState, CurrentSession};
use crate::api::responses::ApiSuccess;
use crate::models::SessionWithRole;
use crate::services::auth::{MSG_INVALID_PAYLOAD, MSG_INVALID_TOKEN};
use crate::services::{ClientInfo, LoginInput, SignupInput};

/// Build public auth routes (no session required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/token/validate", get(validate_token))
}

/// Build protected auth routes (requires the session gate)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/logout", delete(logout))
}

fn invalid_payload(rejection: JsonRejection) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        MSG_INVALID_PAYLOAD,
        rejection.body_text(),
    )
}

/// POST /signup
async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    body: Result<Json<SignupInput>, JsonRejection>,
) -> Result<ApiSuccess<String>, ApiError> {
    let Json(input) = body.map_err(invalid_payload)?;
    let token = state.auth_service.signup(input, &client).await?;
    Ok(ApiSuccess::ok("Signup successful", token))
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    body: Result<Json<LoginInput>, JsonRejection>,
) -> Result<ApiSuccess<String>, ApiError> {
    let Json(input) = body.map_err(invalid_payload)?;
    let token = state.auth_service.login(input, &client).await?;
    Ok(ApiSuccess::ok("Login successful", token))
}

/// DELETE /logout
async fn logout(
    State(state): State<AppState>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<ApiSuccess<()>, ApiError> {
    state.auth_service.logout(&session.session_token).await?;
    Ok(ApiSuccess::message("Logout successful"))
}

/// GET /token/validate
async fn validate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiSuccess<SessionWithRole>, ApiError> {
    let token = extract_session_token(&headers);
    if token.is_empty() {
        return Err(ApiError::unauthorized(MSG_INVALID_TOKEN));
    }

    let session = state.auth_service.validate_token(&token).await?;
    Ok(ApiSuccess::ok("Valid session token", session))
}
