//! Constraint validation for built workflow specifications.

pub mod evaluator;
pub mod rules;

pub use evaluator::validate_spec;
pub use rules::{RuleId, Severity, ValidationResult, Violation};
