//! Structured extraction of user intent.
//!
//! A [`RequirementSummary`] is produced by the intent classifier and handed
//! to the specification builder. It is immutable for the duration of one
//! generation attempt; a regenerated attempt may derive a fresh one from
//! clarifying user input.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tier thresholds
// ---------------------------------------------------------------------------

/// Distinct actions + integrations at or below this count are `Simple`.
pub const SIMPLE_TIER_MAX_FEATURES: usize = 2;

/// Distinct actions + integrations at or below this count are `Standard`.
pub const STANDARD_TIER_MAX_FEATURES: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One prior message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

/// Complexity tier driving the node-count ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Simple,
    Standard,
    Advanced,
}

/// Structured summary of what the user asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementSummary {
    /// How the workflow should start (e.g. "every day at 9am").
    pub trigger_description: String,
    /// Ordered list of actions the workflow performs.
    pub actions: Vec<String>,
    /// External services the workflow touches.
    pub integrations: BTreeSet<String>,
    pub tier: ComplexityTier,
}

impl RequirementSummary {
    /// Assemble a summary, deriving the tier from the extracted features.
    ///
    /// The tier is computed locally (never model-chosen) so the node-count
    /// ceiling stays enforceable downstream.
    pub fn new(
        trigger_description: String,
        actions: Vec<String>,
        integrations: BTreeSet<String>,
    ) -> Self {
        let tier = derive_tier(actions.len(), integrations.len());
        Self {
            trigger_description,
            actions,
            integrations,
            tier,
        }
    }
}

/// Derive the complexity tier from distinct action and integration counts.
pub fn derive_tier(action_count: usize, integration_count: usize) -> ComplexityTier {
    let features = action_count + integration_count;
    if features <= SIMPLE_TIER_MAX_FEATURES {
        ComplexityTier::Simple
    } else if features <= STANDARD_TIER_MAX_FEATURES {
        ComplexityTier::Standard
    } else {
        ComplexityTier::Advanced
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_simple_for_one_action() {
        assert_eq!(derive_tier(1, 0), ComplexityTier::Simple);
    }

    #[test]
    fn tier_simple_at_threshold() {
        assert_eq!(derive_tier(1, 1), ComplexityTier::Simple);
    }

    #[test]
    fn tier_standard_between_thresholds() {
        assert_eq!(derive_tier(2, 1), ComplexityTier::Standard);
        assert_eq!(derive_tier(3, 2), ComplexityTier::Standard);
    }

    #[test]
    fn tier_advanced_above_threshold() {
        assert_eq!(derive_tier(4, 2), ComplexityTier::Advanced);
        assert_eq!(derive_tier(0, 12), ComplexityTier::Advanced);
    }

    #[test]
    fn summary_derives_tier_from_features() {
        let summary = RequirementSummary::new(
            "every day at 9am".into(),
            vec!["send email digest".into()],
            BTreeSet::new(),
        );
        assert_eq!(summary.tier, ComplexityTier::Simple);
    }

    #[test]
    fn summary_with_many_integrations_is_advanced() {
        let integrations: BTreeSet<String> =
            (0..12).map(|i| format!("service-{i}")).collect();
        let summary =
            RequirementSummary::new("on webhook".into(), vec!["fan out".into()], integrations);
        assert_eq!(summary.tier, ComplexityTier::Advanced);
    }
}
