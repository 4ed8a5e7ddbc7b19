//! Pipeline error taxonomy.

use clixen_core::audit::{AttemptRecord, AuditError};
use clixen_llm::classifier::ClassifyError;
use clixen_n8n::deploy::DeployError;

/// Terminal errors surfaced by the pipeline to its caller.
///
/// Transient generation and validation failures are absorbed by the retry
/// controller; what escapes here is final, and where attempts were made the
/// full ordered history rides along so callers never have to guess at a root
/// cause from a single message.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Intent classification failed after its retry budget.
    #[error("Could not classify the request: {0}")]
    Classification(#[from] ClassifyError),

    /// The generate/validate loop exhausted its attempt budget.
    #[error("Workflow generation failed after {} attempts", attempts.len())]
    ExhaustedRetries { attempts: Vec<AttemptRecord> },

    /// Deployment failed after its own (separate) retry budget.
    #[error("Deployment failed: {source}")]
    Deployment {
        source: DeployError,
        attempts: Vec<AttemptRecord>,
    },

    /// The audit log could not be written; the run stops rather than
    /// proceeding unrecorded.
    #[error("Audit log write failed: {0}")]
    Audit(#[from] AuditError),

    /// The caller cancelled between phases.
    #[error("Pipeline cancelled after {phase}")]
    Cancelled { phase: &'static str },

    /// The detached pipeline task failed to complete (panic or abort).
    #[error("Pipeline task failed: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Attempt history for errors that carry one.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            PipelineError::ExhaustedRetries { attempts }
            | PipelineError::Deployment { attempts, .. } => attempts,
            _ => &[],
        }
    }
}
