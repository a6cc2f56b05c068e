/// Database access layer
///
/// Provides connection pooling and repository implementations for uploads,
/// chunks, and the three idempotency tables.
pub mod chunk_repo;
pub mod idempotency_repo;
pub mod upload_repo;

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;

/// Build a bounded connection pool, sized from configuration.
pub async fn connect(cfg: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&cfg.url)
        .await
}
