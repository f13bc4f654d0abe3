//! PostgreSQL pool and schema setup for the access store.

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Connections idle longer than this are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Connections are recycled after this long regardless of use.
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Open the pool backing [`crate::services::Database`].
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Opening access store pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(&config.url)
        .await?;

    Ok(pool)
}

/// Apply the embedded schema in `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    tracing::info!(count = migrator.iter().count(), "Applying access store migrations");
    migrator.run(pool).await
}
