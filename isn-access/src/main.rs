use isn_access::{build_router, config::AccessConfig, db, services::Database, AppState};
use service_core::observability::{init_tracing, LogFormat};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AccessConfig::from_env()?;

    let log_format = if config.environment.is_production() {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(&config.service_name, &config.log_level, log_format)
        .map_err(service_core::error::AppError::ConfigError)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = config.environment.as_str(),
        "Starting ISN access service"
    );

    // Initialize database connections
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;
    tracing::info!("Database initialized successfully");

    let store = Arc::new(Database::new(pool));
    let state = AppState::new(config.clone(), store)?;

    // Build application router
    let app = build_router(state).await?;

    let addr: SocketAddr = config.common.socket_addr()?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = config.environment.as_str(),
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
