//! Database connection pool management.

use shared::retry::RetryPolicy;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Creates a PostgreSQL connection pool with the given configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
}

/// Creates a pool, retrying with backoff while the database comes up.
///
/// The database is a hard dependency: exhausting the startup policy is fatal
/// and the caller must not begin serving traffic.
pub async fn create_pool_with_retry(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    RetryPolicy::startup()
        .run("database_connect", || create_pool(config), |_| true)
        .await
}
