//! Specification building: requirement summary → workflow specification.
//!
//! The builder prompts the model for n8n-shaped workflow JSON constrained to
//! a node-kind allow-list, then parses and normalizes the output into a
//! [`WorkflowSpec`]. On regeneration it feeds each prior violation back as an
//! explicit corrective instruction, which is what makes a retry an
//! auto-correction rather than a blind re-roll.

use std::fmt::Write as _;
use std::sync::Arc;

use clixen_core::requirement::RequirementSummary;
use clixen_core::spec::{validate_spec_name, NodeKind, WorkflowSpec};
use clixen_core::validation::Violation;

use crate::inference::{InferenceError, ModelInference};
use crate::parse::extract_json;

/// Schema hint sent as the system message.
const BUILD_SCHEMA: &str = "You design n8n workflows. Respond with exactly one JSON object in \
the n8n workflow import format: {\"name\": string, \"nodes\": [{\"id\": string, \"name\": \
string, \"type\": string, \"typeVersion\": 1, \"position\": [x, y], \"parameters\": object, \
\"credentials\": object (optional)}], \"connections\": {source node name: {\"main\": [[{\
\"node\": target node name, \"type\": \"main\", \"index\": 0}]]}}}. Use only the node types \
you are given. Every workflow needs exactly one trigger node. No other text.";

/// Errors from specification building.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The underlying generation call failed.
    #[error("Generation inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// The model output could not be parsed into a workflow specification.
    #[error("Generated output is not a valid workflow: {0}")]
    Unparseable(String),

    /// The model used a node kind outside the configured allow-list.
    #[error("Generated workflow uses disallowed node type '{0}'")]
    DisallowedKind(String),
}

/// Builds workflow specifications from requirement summaries.
///
/// The node-kind allow-list is a per-call input (refreshed from capability
/// discovery by the caller), not a hardcoded set.
pub struct SpecBuilder {
    model: Arc<dyn ModelInference>,
}

impl SpecBuilder {
    pub fn new(model: Arc<dyn ModelInference>) -> Self {
        Self { model }
    }

    /// Build a specification for `summary`.
    ///
    /// `prior_violations` is empty on a first attempt; on regeneration it
    /// carries the previous attempt's violations, each of which becomes a
    /// corrective line in the prompt.
    pub async fn build(
        &self,
        summary: &RequirementSummary,
        prior_violations: &[Violation],
        allowed_kinds: &[NodeKind],
    ) -> Result<WorkflowSpec, BuildError> {
        let prompt = build_prompt(summary, prior_violations, allowed_kinds);
        let raw = self.model.infer(&prompt, BUILD_SCHEMA).await?;

        let json = extract_json(&raw)
            .ok_or_else(|| BuildError::Unparseable("response contained no JSON object".into()))?;

        let mut spec = WorkflowSpec::from_engine_json(&json)
            .map_err(|e| BuildError::Unparseable(e.to_string()))?;

        validate_spec_name(&spec.name).map_err(|e| BuildError::Unparseable(e.to_string()))?;

        if spec.nodes.is_empty() {
            return Err(BuildError::Unparseable("workflow has no nodes".into()));
        }
        for node in &spec.nodes {
            if !allowed_kinds.contains(&node.kind) {
                return Err(BuildError::DisallowedKind(
                    node.kind.engine_type().to_string(),
                ));
            }
        }

        dedupe_display_names(&mut spec);

        tracing::debug!(
            name = %spec.name,
            nodes = spec.nodes.len(),
            regeneration = !prior_violations.is_empty(),
            "Built workflow specification",
        );
        Ok(spec)
    }
}

/// Render the generation prompt.
fn build_prompt(
    summary: &RequirementSummary,
    prior_violations: &[Violation],
    allowed_kinds: &[NodeKind],
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Trigger: {}", summary.trigger_description);
    prompt.push_str("Actions:\n");
    for action in &summary.actions {
        let _ = writeln!(prompt, "- {action}");
    }
    if !summary.integrations.is_empty() {
        let _ = writeln!(
            prompt,
            "Integrations: {}",
            summary
                .integrations
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    prompt.push_str("\nAllowed node types:\n");
    for kind in allowed_kinds {
        let _ = writeln!(prompt, "- {}", kind.engine_type());
    }

    if !prior_violations.is_empty() {
        prompt.push_str(
            "\nThe previous workflow was rejected. Fix every problem listed below:\n",
        );
        for violation in prior_violations {
            let _ = writeln!(prompt, "- [{:?}] {}", violation.rule, violation.message);
        }
    }

    prompt
}

/// Make display names unique by suffixing duplicates; connections key on
/// names in the engine shape, so collisions would merge edges.
fn dedupe_display_names(spec: &mut WorkflowSpec) {
    let mut seen: std::collections::BTreeMap<String, u32> = std::collections::BTreeMap::new();
    for node in &mut spec.nodes {
        let count = seen.entry(node.display_name.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            node.display_name = format!("{} {}", node.display_name, count);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
