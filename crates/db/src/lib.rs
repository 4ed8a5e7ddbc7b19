//! Postgres persistence for the pipeline attempt log.
//!
//! Exposes pool construction, a startup health check, schema bootstrap, and
//! the [`PgAuditStore`] backing [`clixen_core::audit::AuditStore`].

pub mod models;
pub mod store;

pub use store::PgAuditStore;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Maximum connections held by the pool.
const MAX_CONNECTIONS: u32 = 10;

/// How long to wait for a connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Bootstrap the attempt-log schema.
///
/// Idempotent; safe to run at every startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pipeline_attempts (
            id BIGSERIAL PRIMARY KEY,
            owner_tag TEXT NOT NULL,
            attempt INTEGER NOT NULL,
            phase TEXT NOT NULL,
            error TEXT NOT NULL,
            spec_snapshot JSONB,
            attempted_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_attempts_owner \
         ON pipeline_attempts (owner_tag, created_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
