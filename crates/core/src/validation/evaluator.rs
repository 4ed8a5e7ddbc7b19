//! Rule evaluation against a workflow specification.
//!
//! [`validate_spec`] is a pure function: no I/O, no side effects. Violations
//! come back in rule-declaration order so repeated runs over the same spec
//! produce identical diagnostics.

use std::collections::{BTreeSet, VecDeque};

use crate::limits::PlatformLimits;
use crate::spec::WorkflowSpec;
use crate::validation::rules::{RuleId, Severity, ValidationResult, Violation};

/// Evaluate all structural rules against `spec`.
///
/// `credential_types` is the engine's known-available credential type list;
/// pass `None` when the lookup itself was unavailable, which downgrades the
/// credential rule to advisory rather than producing false negatives from a
/// transient external check.
pub fn validate_spec(
    spec: &WorkflowSpec,
    limits: &PlatformLimits,
    credential_types: Option<&[String]>,
) -> ValidationResult {
    let mut violations = Vec::new();

    check_max_nodes(spec, limits, &mut violations);
    check_trigger_present(spec, &mut violations);
    check_connection_targets(spec, &mut violations);
    check_reachability(spec, limits, &mut violations);
    check_credentials(spec, credential_types, &mut violations);

    let is_valid = !violations.iter().any(|v| v.severity == Severity::Blocking);
    ValidationResult {
        is_valid,
        violations,
    }
}

// ---------------------------------------------------------------------------
// Individual rules (declaration order)
// ---------------------------------------------------------------------------

fn check_max_nodes(spec: &WorkflowSpec, limits: &PlatformLimits, out: &mut Vec<Violation>) {
    if spec.nodes.len() > limits.max_nodes {
        out.push(Violation {
            rule: RuleId::MaxNodes,
            message: format!(
                "workflow has {} nodes but the limit is {}",
                spec.nodes.len(),
                limits.max_nodes
            ),
            severity: Severity::Blocking,
        });
    }
}

fn check_trigger_present(spec: &WorkflowSpec, out: &mut Vec<Violation>) {
    if spec.trigger_nodes().is_empty() {
        out.push(Violation {
            rule: RuleId::TriggerRequired,
            message: "workflow has no trigger node (webhook, schedule, or manual)".to_string(),
            severity: Severity::Blocking,
        });
    }
}

fn check_connection_targets(spec: &WorkflowSpec, out: &mut Vec<Violation>) {
    let ids: BTreeSet<&str> = spec.nodes.iter().map(|n| n.id.as_str()).collect();

    for (source, targets) in &spec.connections {
        if !ids.contains(source.as_str()) {
            out.push(Violation {
                rule: RuleId::ConnectionTargets,
                message: format!("connection source '{source}' references no node"),
                severity: Severity::Blocking,
            });
        }
        for target in targets {
            if !ids.contains(target.node.as_str()) {
                out.push(Violation {
                    rule: RuleId::ConnectionTargets,
                    message: format!(
                        "connection from '{source}' targets missing node '{}'",
                        target.node
                    ),
                    severity: Severity::Blocking,
                });
            }
        }
    }
}

/// BFS over outgoing edges from every trigger node. Nodes never reached are
/// orphans; their severity is the configured `orphan_severity`.
fn check_reachability(spec: &WorkflowSpec, limits: &PlatformLimits, out: &mut Vec<Violation>) {
    // Without a trigger the rule would flag every node; the trigger rule
    // already covers that case.
    let triggers = spec.trigger_nodes();
    if triggers.is_empty() || spec.nodes.is_empty() {
        return;
    }

    let mut reached: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = triggers.iter().map(|n| n.id.as_str()).collect();
    for trigger in &triggers {
        reached.insert(trigger.id.as_str());
    }

    while let Some(current) = queue.pop_front() {
        if let Some(targets) = spec.connections.get(current) {
            for target in targets {
                if reached.insert(target.node.as_str()) {
                    queue.push_back(target.node.as_str());
                }
            }
        }
    }

    for node in &spec.nodes {
        if !reached.contains(node.id.as_str()) {
            out.push(Violation {
                rule: RuleId::Reachability,
                message: format!(
                    "node '{}' ({}) is not reachable from any trigger",
                    node.display_name, node.id
                ),
                severity: limits.orphan_severity,
            });
        }
    }
}

fn check_credentials(
    spec: &WorkflowSpec,
    credential_types: Option<&[String]>,
    out: &mut Vec<Violation>,
) {
    for node in &spec.nodes {
        let Some(required) = node.kind.required_credential() else {
            continue;
        };

        match &node.credential {
            None => {
                // Missing entirely is always a defect; downgrade only the
                // allow-list check when the lookup was unavailable.
                out.push(Violation {
                    rule: RuleId::Credentials,
                    message: format!(
                        "node '{}' requires a '{required}' credential but has none",
                        node.display_name
                    ),
                    severity: Severity::Blocking,
                });
            }
            Some(cred) => match credential_types {
                Some(available) => {
                    if !available.iter().any(|t| t == &cred.cred_type) {
                        out.push(Violation {
                            rule: RuleId::Credentials,
                            message: format!(
                                "node '{}' references credential type '{}' which is not available",
                                node.display_name, cred.cred_type
                            ),
                            severity: Severity::Blocking,
                        });
                    }
                }
                None => {
                    out.push(Violation {
                        rule: RuleId::Credentials,
                        message: format!(
                            "credential type '{}' on node '{}' could not be verified \
                             (lookup unavailable)",
                            cred.cred_type, node.display_name
                        ),
                        severity: Severity::Advisory,
                    });
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
