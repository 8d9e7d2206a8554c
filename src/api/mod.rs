//! API layer - HTTP handlers and routing
//!
//! - Root and health endpoints
//! - Signup, login, logout and token validation
//! - Patient, therapist and disease endpoints
//!
//! Every request passes the optional API token gate; clinic data routes
//! additionally require a live session.

pub mod auth;
pub mod common;
pub mod diseases;
pub mod middleware;
pub mod patients;
pub mod responses;
pub mod site;
pub mod therapists;

use std::time::Duration;

use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{ConfigError, CorsConfig};

pub use middleware::{ApiError, AppState, CurrentSession};
pub use responses::ApiSuccess;

/// Build the API routes
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(patients::protected_router())
        .merge(therapists::router())
        .merge(diseases::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_session,
        ));

    Router::new()
        .merge(site::router())
        .merge(auth::public_router())
        .merge(patients::public_router())
        .merge(protected_routes)
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn invalid_cors(what: &str, value: &str) -> ConfigError {
    ConfigError::ValidationError(format!("invalid CORS {}: '{}'", what, value))
}

/// Build the CORS layer from configuration.
///
/// A `*` origin is mirrored back when credentials are allowed, since a
/// literal wildcard cannot be combined with credentials.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, ConfigError> {
    let origin = config.allow_origin.trim();
    let allow_origin = if origin == "*" {
        if config.allow_credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        let origins = split_list(origin)
            .map(|o| o.parse::<HeaderValue>().map_err(|_| invalid_cors("origin", o)))
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    let methods = split_list(&config.allow_methods)
        .map(|m| Method::from_bytes(m.as_bytes()).map_err(|_| invalid_cors("method", m)))
        .collect::<Result<Vec<_>, _>>()?;

    let allow_headers = if config.allow_headers.trim() == "*" {
        AllowHeaders::mirror_request()
    } else {
        let headers = split_list(&config.allow_headers)
            .map(|h| HeaderName::from_bytes(h.as_bytes()).map_err(|_| invalid_cors("header", h)))
            .collect::<Result<Vec<_>, _>>()?;
        AllowHeaders::list(headers)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(methods)
        .allow_headers(allow_headers)
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs)))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors: &CorsConfig) -> Result<Router, ConfigError> {
    let cors = cors_layer(cors)?;

    Ok(Router::new()
        .merge(build_api_router(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_token,
        ))
        // CORS sits outside the token gate so preflights never need a token
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
