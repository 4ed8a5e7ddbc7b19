//! Attempt records and the append-only audit store.
//!
//! Every generation, validation, or deployment attempt produces one
//! [`AttemptRecord`], persisted through an [`AuditStore`] in attempt order
//! before the pipeline call returns. The store is append-only; the pipeline
//! never reads it back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline phase an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptPhase {
    Generation,
    Validation,
    Deployment,
}

impl AttemptPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptPhase::Generation => "generation",
            AttemptPhase::Validation => "validation",
            AttemptPhase::Deployment => "deployment",
        }
    }
}

/// One row of the durable attempt log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number within one pipeline run.
    pub attempt: u32,
    pub phase: AttemptPhase,
    /// Empty for a successful attempt.
    pub error: String,
    pub at: DateTime<Utc>,
    /// Engine-JSON snapshot of the offending specification, for post-mortem.
    pub spec_snapshot: Option<serde_json::Value>,
}

impl AttemptRecord {
    pub fn new(
        attempt: u32,
        phase: AttemptPhase,
        error: impl Into<String>,
        spec_snapshot: Option<serde_json::Value>,
    ) -> Self {
        Self {
            attempt,
            phase,
            error: error.into(),
            at: Utc::now(),
            spec_snapshot,
        }
    }
}

/// Append-only sink for attempt records, keyed by owner tag.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist one record. Implementations must preserve call order per run.
    async fn append(&self, owner_tag: &str, record: &AttemptRecord) -> Result<(), AuditError>;
}

/// Errors from an audit store implementation.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit store unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory audit store for tests and database-less deployments.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: tokio::sync::Mutex<Vec<(String, AttemptRecord)>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records appended so far, in insertion order.
    pub async fn records(&self) -> Vec<(String, AttemptRecord)> {
        self.records.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, owner_tag: &str, record: &AttemptRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .await
            .push((owner_tag.to_string(), record.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_preserves_append_order() {
        let store = MemoryAuditStore::new();
        for attempt in 1..=3 {
            store
                .append(
                    "owner-1",
                    &AttemptRecord::new(attempt, AttemptPhase::Generation, "boom", None),
                )
                .await
                .unwrap();
        }
        let records = store.records().await;
        let attempts: Vec<u32> = records.iter().map(|(_, r)| r.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn memory_store_keys_by_owner() {
        let store = MemoryAuditStore::new();
        store
            .append(
                "owner-a",
                &AttemptRecord::new(1, AttemptPhase::Validation, "", None),
            )
            .await
            .unwrap();
        let records = store.records().await;
        assert_eq!(records[0].0, "owner-a");
    }

    #[test]
    fn phase_strings() {
        assert_eq!(AttemptPhase::Generation.as_str(), "generation");
        assert_eq!(AttemptPhase::Validation.as_str(), "validation");
        assert_eq!(AttemptPhase::Deployment.as_str(), "deployment");
    }
}
