//! Specification source seam.
//!
//! The retry controller talks to a [`SpecSource`] rather than the concrete
//! builder so tests can drive the loop with scripted outcomes.

use std::sync::Arc;

use clixen_core::requirement::RequirementSummary;
use clixen_core::spec::WorkflowSpec;
use clixen_core::validation::Violation;
use clixen_llm::builder::{BuildError, SpecBuilder};
use clixen_n8n::capability::CapabilityCache;

/// Produces one workflow specification per call.
///
/// `prior_violations` is empty on a first attempt and carries the previous
/// attempt's violations on regeneration.
#[async_trait::async_trait]
pub trait SpecSource: Send + Sync {
    async fn build(
        &self,
        summary: &RequirementSummary,
        prior_violations: &[Violation],
    ) -> Result<WorkflowSpec, BuildError>;
}

/// Production source: the LLM builder constrained by the engine's current
/// capability snapshot.
pub struct BuilderSource {
    builder: SpecBuilder,
    capabilities: Arc<CapabilityCache>,
}

impl BuilderSource {
    pub fn new(builder: SpecBuilder, capabilities: Arc<CapabilityCache>) -> Self {
        Self {
            builder,
            capabilities,
        }
    }
}

#[async_trait::async_trait]
impl SpecSource for BuilderSource {
    async fn build(
        &self,
        summary: &RequirementSummary,
        prior_violations: &[Violation],
    ) -> Result<WorkflowSpec, BuildError> {
        let allowed = self.capabilities.allowed_kinds().await;
        self.builder.build(summary, prior_violations, &allowed).await
    }
}
