//! Omnitags - Clinic management backend

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use omnitags::{
    api::{self, AppState},
    config::Config,
    db,
    services::AuthService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (and `.env` in local mode) before logging so the
    // environment can pick the default filter
    let (config, dotenv) = Config::load_with_env(Path::new("config.yml"))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.app.env.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match dotenv {
        Some(Ok(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Some(Err(e)) => tracing::debug!("No .env file loaded: {}", e),
        None => {}
    }

    tracing::info!("Starting {} ({})...", config.app.name, config.app.env);
    config.validate()?;

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let state = AppState::new(pool.clone(), &config);
    if state.api_token.is_none() {
        tracing::warn!("APITOKEN is not set; the API token gate is disabled");
    }

    spawn_session_cleanup(
        state.auth_service.clone(),
        Duration::from_secs(config.auth.session_cleanup_interval_secs.max(1)),
    );

    // Build router
    let app = api::build_router(state, &config.cors)?;

    // Start server
    let addr = format!("{}:{}", config.app.host, config.app.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Periodically purge expired sessions
fn spawn_session_cleanup(auth: Arc<AuthService>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match auth.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Removed {} expired sessions", removed),
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
