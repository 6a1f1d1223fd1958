use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

/// Connect with exponential backoff; only used at startup, where the database
/// may still be coming up.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let strategy = ExponentialBackoff::from_millis(200)
        .max_delay(std::time::Duration::from_secs(5))
        .map(jitter)
        .take(config.connect_retries);

    Retry::spawn(strategy, || async {
        create_pool(config).await.map_err(|e| {
            tracing::warn!(error = %e, "Database connection attempt failed");
            e
        })
    })
    .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
