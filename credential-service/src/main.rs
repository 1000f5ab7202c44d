use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use credential_service::{
    build_router,
    config::CredentialConfig,
    models::AuthSource,
    providers::{DirectoryClient, IdentityProvider},
    scheduler::{spawn_lifecycle_sweeps, LifecycleSweeper},
    services::{CredentialService, IdentityResolver, NotifyClient, TokenManager},
    store::{IdentityStore, PgStore},
    AppState,
};
use service_core::observability::logging::init_tracing;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = CredentialConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting credential service"
    );

    // Database
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| {
            service_core::error::AppError::DatabaseError(anyhow::anyhow!(
                "Failed to connect to database: {}",
                e
            ))
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        service_core::error::AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e))
    })?;
    tracing::info!("Database initialized");

    let store: Arc<dyn IdentityStore> = Arc::new(PgStore::new(pool));

    // External directories, consulted in priority order
    let providers: Vec<Arc<dyn IdentityProvider>> = vec![
        Arc::new(DirectoryClient::new(AuthSource::Directory, &config.directory)?),
        Arc::new(DirectoryClient::new(AuthSource::Hr, &config.hr)?),
    ];

    let notifier = Arc::new(NotifyClient::new(&config.notify)?);
    let tokens = TokenManager::new(store.clone());
    let resolver = IdentityResolver::new(store.clone(), providers);
    let credentials = Arc::new(CredentialService::new(
        store.clone(),
        tokens,
        resolver,
        notifier,
        config.notify.templates.clone(),
    ));

    // Background lifecycle sweeps
    let sweeper = Arc::new(LifecycleSweeper::new(
        store.clone(),
        config.lifecycle.inactivity_threshold_days,
    ));
    spawn_lifecycle_sweeps(
        sweeper,
        Duration::from_secs(config.lifecycle.sweep_interval_seconds),
    );

    let state = AppState {
        config: config.clone(),
        store,
        credentials,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    service_core::axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
