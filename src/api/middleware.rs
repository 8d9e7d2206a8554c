//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The error envelope and its mapping from service errors
//! - The static API token gate
//! - The session gate for protected routes
//! - Client metadata extraction for session bookkeeping

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        ConnectInfo, FromRequestParts, Request, State,
    },
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{Config, MAX_SESSION_TTL_MINUTES};
use crate::db::repositories::{
    SqlxDiseaseRepository, SqlxPatientRepository, SqlxRoleRepository, SqlxSessionRepository,
    SqlxTherapistRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::Session;
use crate::services::auth::MSG_TOKEN_NOT_PROVIDED;
use crate::services::{
    AuthService, ClientInfo, DiseaseService, PasswordHasher, PatientService, ServiceError,
    TherapistService, TokenSigner,
};

/// Header carrying the session token
pub const SESSION_HEADER: &str = "session-token";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub app_name: Arc<str>,
    pub api_token: Option<Arc<str>>,
    pub auth_service: Arc<AuthService>,
    pub patient_service: Arc<PatientService>,
    pub therapist_service: Arc<TherapistService>,
    pub disease_service: Arc<DiseaseService>,
}

impl AppState {
    /// Wire repositories and services over `pool`.
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let hasher = PasswordHasher::new(config.auth.jwt_secret.as_bytes());
        let signer = TokenSigner::new(
            config.auth.jwt_secret.as_bytes(),
            chrono::Duration::minutes(
                config
                    .auth
                    .session_ttl_minutes
                    .clamp(1, MAX_SESSION_TTL_MINUTES),
            ),
        );

        let auth_service = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxRoleRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            hasher.clone(),
            signer,
        );
        let patient_service =
            PatientService::new(SqlxPatientRepository::boxed(pool.clone()), hasher.clone());
        let therapist_service =
            TherapistService::new(SqlxTherapistRepository::boxed(pool.clone()), hasher);
        let disease_service = DiseaseService::new(SqlxDiseaseRepository::boxed(pool.clone()));

        let api_token = config
            .auth
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Arc::from);

        Self {
            pool,
            app_name: Arc::from(config.app.name.as_str()),
            api_token,
            auth_service: Arc::new(auth_service),
            patient_service: Arc::new(patient_service),
            therapist_service: Arc::new(therapist_service),
            disease_service: Arc::new(disease_service),
        }
    }
}

/// Session of the caller, inserted by [`require_session`]
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

/// Error envelope returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub status: String,
    pub message: String,
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            status: "error".to_string(),
            message: message.into(),
            error: error.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "VALIDATION_ERROR")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message, "CONFLICT")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, "SERVICE_UNAVAILABLE")
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => Self::validation_error(msg),
            ServiceError::NotFound(msg) => Self::not_found(msg),
            ServiceError::Conflict(msg) => Self::conflict(msg),
            ServiceError::Unauthorized(msg) => Self::unauthorized(msg),
            ServiceError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            rejection.body_text(),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid ID", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Invalid query parameters",
            rejection.body_text(),
        )
    }
}

/// Read the session token header, trimmed; empty when absent.
pub fn extract_session_token(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Static API token gate.
///
/// Active only when an API token is configured. Preflight requests pass
/// through so the CORS layer can answer them.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if provided != Some(expected) {
        tracing::debug!("Rejected request to {} with invalid API token", request.uri().path());
        return Err(ApiError::unauthorized("Invalid API token"));
    }

    Ok(next.run(request).await)
}

/// Session gate for protected routes
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers());
    if token.is_empty() {
        return Err(ApiError::unauthorized(MSG_TOKEN_NOT_PROVIDED));
    }

    let session = state.auth_service.authenticate(&token).await?;

    request.extensions_mut().insert(CurrentSession(session));
    Ok(next.run(request).await)
}

/// Extract the client address.
///
/// Proxy headers win over the socket peer: first `X-Forwarded-For` entry,
/// then `X-Real-IP`.
fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            let ip = ip_str.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    None
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = extract_ip_address(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(ClientInfo { ip, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_ip_address(&headers), Some("10.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(extract_ip_address(&headers), Some("10.0.0.9".to_string()));

        assert_eq!(extract_ip_address(&HeaderMap::new()), None);
    }

    #[test]
    fn test_extract_session_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), "");

        headers.insert(SESSION_HEADER, HeaderValue::from_static(" abc.def.ghi "));
        assert_eq!(extract_session_token(&headers), "abc.def.ghi");
    }

    #[test]
    fn test_service_error_mapping() {
        let cases = [
            (ServiceError::validation("bad"), StatusCode::BAD_REQUEST),
            (ServiceError::not_found("gone"), StatusCode::NOT_FOUND),
            (ServiceError::conflict("dup"), StatusCode::CONFLICT),
            (ServiceError::unauthorized("who"), StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            let message = err.to_string();
            let api = ApiError::from(err);
            assert_eq!(api.status_code(), status);
            assert_eq!(api.message, message);
            assert_eq!(api.status, "error");
        }
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let api = ApiError::from(ServiceError::Internal(anyhow::anyhow!(
            "no such table: patients"
        )));
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.message.contains("patients"));
        assert!(!api.error.contains("patients"));
    }

    #[tokio::test]
    async fn test_client_info_from_headers() {
        let request = axum::http::Request::builder()
            .uri("/login")
            .header("x-real-ip", "192.168.1.5")
            .header(header::USER_AGENT, "curl/8.0")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.ip, "192.168.1.5");
        assert_eq!(info.user_agent, "curl/8.0");
    }

    #[tokio::test]
    async fn test_client_info_from_connect_info() {
        let mut request = axum::http::Request::builder().uri("/login").body(()).unwrap();
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        let (mut parts, _) = request.into_parts();

        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.ip, "127.0.0.1");
        assert_eq!(info.user_agent, "");
    }
}
