//! Row types for the `pipeline_attempts` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// One persisted attempt, as read back for an owner's history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptRow {
    pub id: i64,
    pub owner_tag: String,
    pub attempt: i32,
    pub phase: String,
    /// Empty for a successful attempt.
    pub error: String,
    pub spec_snapshot: Option<serde_json::Value>,
    pub attempted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
