//! Postgres-backed attempt log.

use clixen_core::audit::{AttemptRecord, AuditError, AuditStore};
use sqlx::PgPool;

use crate::models::AttemptRow;

/// Column list for `pipeline_attempts` SELECT queries.
const COLUMNS: &str = "\
    id, owner_tag, attempt, phase, error, spec_snapshot, \
    attempted_at, created_at";

/// Column list for INSERT (excludes auto-generated `id` and `created_at`).
const INSERT_COLUMNS: &str = "\
    owner_tag, attempt, phase, error, spec_snapshot, attempted_at";

/// Append-only attempt log on Postgres.
#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent attempts for one owner, newest first.
    pub async fn recent_for_owner(
        &self,
        owner_tag: &str,
        limit: i64,
    ) -> Result<Vec<AttemptRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM pipeline_attempts \
             WHERE owner_tag = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, AttemptRow>(&query)
            .bind(owner_tag)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }
}

#[async_trait::async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, owner_tag: &str, record: &AttemptRecord) -> Result<(), AuditError> {
        let query = format!(
            "INSERT INTO pipeline_attempts ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
        sqlx::query(&query)
            .bind(owner_tag)
            .bind(record.attempt as i32)
            .bind(record.phase.as_str())
            .bind(&record.error)
            .bind(&record.spec_snapshot)
            .bind(record.at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(owner = %owner_tag, error = %e, "Failed to persist attempt record");
                AuditError::Unavailable(e.to_string())
            })?;
        Ok(())
    }
}
