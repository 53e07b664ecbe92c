//! Database pool construction
//!
//! Both services own a bounded PostgreSQL pool built from the shared
//! [`DatabaseConfig`] DTO.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;

/// Connect a bounded PostgreSQL pool.
///
/// The pool enforces the connection budget of the owning service:
/// maximum and minimum connection counts, an acquire timeout, and
/// idle/lifetime recycling.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool established"
    );

    Ok(pool)
}
