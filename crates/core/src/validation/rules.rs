//! Validation rule and result types.

use serde::{Deserialize, Serialize};

/// Structural rules checked against every specification.
///
/// Declaration order is diagnostic order: violations are always reported in
/// the order the variants appear here, regardless of discovery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// Node count must not exceed the platform ceiling.
    MaxNodes,
    /// At least one trigger-kind node must be present.
    TriggerRequired,
    /// Every connection endpoint must reference an existing node id.
    ConnectionTargets,
    /// Every node must be reachable from the trigger set.
    Reachability,
    /// Nodes whose kind requires a credential must reference an available one.
    Credentials,
}

/// Whether a violation prevents deployment or is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Advisory,
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: RuleId,
    pub message: String,
    pub severity: Severity,
}

/// Aggregated result of evaluating all rules against one specification.
///
/// Consumed immediately by the retry controller; never persisted beyond the
/// current attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when there are no blocking violations.
    pub is_valid: bool,
    /// All violations in rule-declaration order.
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    /// Only the violations that prevent deployment.
    pub fn blocking(&self) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Blocking)
            .collect()
    }
}
