//! Platform limits and owner scoping.
//!
//! Supplied per user/project by the namespace allocator; read-only to the
//! pipeline. Tier defaults apply when the allocator has no override.

use serde::{Deserialize, Serialize};

use crate::requirement::ComplexityTier;
use crate::validation::Severity;

/// Node ceiling for the `Simple` tier.
pub const SIMPLE_TIER_MAX_NODES: usize = 8;
/// Node ceiling for the `Standard` tier.
pub const STANDARD_TIER_MAX_NODES: usize = 16;
/// Node ceiling for the `Advanced` tier.
pub const ADVANCED_TIER_MAX_NODES: usize = 32;

/// Structural limits a specification must respect before deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformLimits {
    /// Maximum node count for this owner/tier.
    pub max_nodes: usize,
    /// Severity applied when a node is unreachable from the trigger set.
    /// Tunable because some engines tolerate dead nodes.
    pub orphan_severity: Severity,
}

impl PlatformLimits {
    /// Default limits for a complexity tier.
    pub fn for_tier(tier: ComplexityTier) -> Self {
        let max_nodes = match tier {
            ComplexityTier::Simple => SIMPLE_TIER_MAX_NODES,
            ComplexityTier::Standard => STANDARD_TIER_MAX_NODES,
            ComplexityTier::Advanced => ADVANCED_TIER_MAX_NODES,
        };
        Self {
            max_nodes,
            orphan_severity: Severity::Advisory,
        }
    }
}

/// Per-request owner scope handed in by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerContext {
    /// Identifier used to namespace deployed workflows.
    pub owner_tag: String,
    pub limits: PlatformLimits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_defaults() {
        assert_eq!(
            PlatformLimits::for_tier(ComplexityTier::Simple).max_nodes,
            8
        );
        assert_eq!(
            PlatformLimits::for_tier(ComplexityTier::Standard).max_nodes,
            16
        );
        assert_eq!(
            PlatformLimits::for_tier(ComplexityTier::Advanced).max_nodes,
            32
        );
    }

    #[test]
    fn orphan_severity_defaults_to_advisory() {
        let limits = PlatformLimits::for_tier(ComplexityTier::Simple);
        assert_eq!(limits.orphan_severity, Severity::Advisory);
    }
}
