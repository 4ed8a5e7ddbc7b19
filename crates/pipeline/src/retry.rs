//! Bounded generate → validate → auto-correct loop.
//!
//! The loop is an explicit state machine rather than a while-with-counter:
//! every transition either terminates or consumes one attempt, so attempt
//! accounting and termination are structural. Each attempt, including the
//! successful one, appends exactly one [`AttemptRecord`] to the audit store
//! in attempt order before the call returns.

use std::sync::Arc;
use std::time::Duration;

use clixen_core::audit::{AttemptPhase, AttemptRecord, AuditStore};
use clixen_core::limits::PlatformLimits;
use clixen_core::requirement::RequirementSummary;
use clixen_core::spec::WorkflowSpec;
use clixen_core::validation::{validate_spec, Violation};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::source::SpecSource;

/// Default total attempts for the generate/validate loop.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default extra tries for workflow creation (deployment is retried at most
/// this many times beyond the first attempt).
pub const DEFAULT_DEPLOY_RETRIES: u32 = 1;

/// Default extra classification tries after the first failure.
pub const DEFAULT_CLASSIFY_RETRIES: u32 = 2;

/// Default initial classification backoff; doubles per retry.
pub const DEFAULT_CLASSIFY_BACKOFF: Duration = Duration::from_millis(500);

/// Bounds for all three retry loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total generate/validate attempts.
    pub max_attempts: u32,
    /// Extra creation attempts after the first deployment failure.
    pub deploy_retries: u32,
    /// Extra classification attempts after the first failure.
    pub classify_retries: u32,
    /// Initial classification backoff, doubled per retry.
    pub classify_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            deploy_retries: DEFAULT_DEPLOY_RETRIES,
            classify_retries: DEFAULT_CLASSIFY_RETRIES,
            classify_backoff: DEFAULT_CLASSIFY_BACKOFF,
        }
    }
}

/// Loop state. `Build` runs the source (with violation feedback when the
/// previous attempt validated invalid); `Validate` checks the built spec.
enum Phase {
    Build { feedback: Vec<Violation> },
    Validate { spec: WorkflowSpec },
}

/// A validated specification plus the full attempt history that produced it.
#[derive(Debug)]
pub struct GenerateOutcome {
    pub spec: WorkflowSpec,
    pub attempts: Vec<AttemptRecord>,
}

/// Run the bounded generate/validate loop.
///
/// Generation errors restart with a fresh build (no feedback to echo);
/// validation failures feed their violations into the next build. Both
/// consume one attempt. On exhaustion the caller receives the entire
/// history via [`PipelineError::ExhaustedRetries`], not just the last error.
#[allow(clippy::too_many_arguments)]
pub async fn generate_validated(
    source: &dyn SpecSource,
    summary: &RequirementSummary,
    limits: &PlatformLimits,
    credential_types: Option<&[String]>,
    policy: RetryPolicy,
    audit: &Arc<dyn AuditStore>,
    owner_tag: &str,
    cancel: &CancellationToken,
) -> Result<GenerateOutcome, PipelineError> {
    let mut attempts: Vec<AttemptRecord> = Vec::new();
    let mut attempt: u32 = 0;
    let mut phase = Phase::Build {
        feedback: Vec::new(),
    };

    loop {
        match phase {
            Phase::Build { feedback } => {
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled {
                        phase: "generation attempt",
                    });
                }
                attempt += 1;
                if attempt > policy.max_attempts {
                    tracing::warn!(
                        owner = %owner_tag,
                        attempts = attempts.len(),
                        "Generation attempts exhausted",
                    );
                    return Err(PipelineError::ExhaustedRetries { attempts });
                }

                match source.build(summary, &feedback).await {
                    Ok(spec) => {
                        phase = Phase::Validate { spec };
                    }
                    Err(e) => {
                        tracing::warn!(
                            owner = %owner_tag,
                            attempt,
                            error = %e,
                            "Generation attempt failed",
                        );
                        let record =
                            AttemptRecord::new(attempt, AttemptPhase::Generation, e.to_string(), None);
                        audit.append(owner_tag, &record).await?;
                        attempts.push(record);
                        // A generation error carries no spec to correct;
                        // the next build starts fresh.
                        phase = Phase::Build {
                            feedback: Vec::new(),
                        };
                    }
                }
            }

            Phase::Validate { spec } => {
                let result = validate_spec(&spec, limits, credential_types);
                if result.is_valid {
                    let record =
                        AttemptRecord::new(attempt, AttemptPhase::Validation, "", None);
                    audit.append(owner_tag, &record).await?;
                    attempts.push(record);
                    tracing::info!(
                        owner = %owner_tag,
                        attempt,
                        advisories = result.violations.len(),
                        "Specification validated",
                    );
                    return Ok(GenerateOutcome { spec, attempts });
                }

                let summary_msg = result
                    .blocking()
                    .iter()
                    .map(|v| v.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                tracing::warn!(
                    owner = %owner_tag,
                    attempt,
                    violations = result.violations.len(),
                    "Specification failed validation",
                );
                let record = AttemptRecord::new(
                    attempt,
                    AttemptPhase::Validation,
                    summary_msg,
                    Some(spec.to_engine_json()),
                );
                audit.append(owner_tag, &record).await?;
                attempts.push(record);

                phase = Phase::Build {
                    feedback: result.violations,
                };
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use clixen_core::audit::MemoryAuditStore;
    use clixen_core::requirement::ComplexityTier;
    use clixen_core::spec::{
        ConnectionTarget, NodeKind, NodeParameters, WorkflowNode, WorkflowSpec,
    };
    use clixen_core::validation::RuleId;
    use clixen_llm::builder::BuildError;
    use tokio::sync::Mutex;

    use super::*;

    /// Scripted source: each call pops the next outcome; records the
    /// feedback it was handed.
    struct ScriptedSource {
        outcomes: Mutex<Vec<Result<WorkflowSpec, BuildError>>>,
        calls: AtomicUsize,
        feedback_seen: Mutex<Vec<Vec<Violation>>>,
    }

    impl ScriptedSource {
        fn new(outcomes: Vec<Result<WorkflowSpec, BuildError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                feedback_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SpecSource for ScriptedSource {
        async fn build(
            &self,
            _summary: &RequirementSummary,
            prior_violations: &[Violation],
        ) -> Result<WorkflowSpec, BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.feedback_seen
                .lock()
                .await
                .push(prior_violations.to_vec());
            let mut outcomes = self.outcomes.lock().await;
            if outcomes.is_empty() {
                return Err(BuildError::Unparseable("script exhausted".into()));
            }
            outcomes.remove(0)
        }
    }

    fn node(id: &str, kind: NodeKind) -> WorkflowNode {
        WorkflowNode {
            id: id.into(),
            display_name: id.to_uppercase(),
            kind,
            position: (0, 0),
            parameters: match kind {
                NodeKind::ScheduleTrigger => NodeParameters::Schedule {
                    cron: "0 9 * * *".into(),
                },
                _ => NodeParameters::HttpRequest {
                    url: "https://example.com".into(),
                    method: "GET".into(),
                },
            },
            credential: None,
        }
    }

    fn valid_spec() -> WorkflowSpec {
        let mut connections = BTreeMap::new();
        connections.insert(
            "t".to_string(),
            vec![ConnectionTarget {
                node: "a".into(),
                input_index: 0,
            }],
        );
        WorkflowSpec {
            name: "ok".into(),
            nodes: vec![node("t", NodeKind::ScheduleTrigger), node("a", NodeKind::HttpRequest)],
            connections,
            active: false,
        }
    }

    /// 12 nodes against a ceiling of 8.
    fn oversized_spec() -> WorkflowSpec {
        let mut nodes = vec![node("t", NodeKind::ScheduleTrigger)];
        for i in 0..11 {
            nodes.push(node(&format!("a{i}"), NodeKind::HttpRequest));
        }
        let mut connections = BTreeMap::new();
        for pair in nodes.windows(2) {
            connections.insert(
                pair[0].id.clone(),
                vec![ConnectionTarget {
                    node: pair[1].id.clone(),
                    input_index: 0,
                }],
            );
        }
        WorkflowSpec {
            name: "big".into(),
            nodes,
            connections,
            active: false,
        }
    }

    fn summary() -> RequirementSummary {
        RequirementSummary::new("daily".into(), vec!["fetch".into()], BTreeSet::new())
    }

    fn limits() -> PlatformLimits {
        PlatformLimits::for_tier(ComplexityTier::Simple)
    }

    fn audit() -> Arc<MemoryAuditStore> {
        Arc::new(MemoryAuditStore::new())
    }

    async fn run(
        source: &ScriptedSource,
        store: Arc<MemoryAuditStore>,
        policy: RetryPolicy,
    ) -> Result<GenerateOutcome, PipelineError> {
        let store: Arc<dyn AuditStore> = store;
        generate_validated(
            source,
            &summary(),
            &limits(),
            Some(&["smtp".to_string()]),
            policy,
            &store,
            "owner-1",
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn valid_first_attempt_succeeds_with_one_record() {
        let source = ScriptedSource::new(vec![Ok(valid_spec())]);
        let store = audit();
        let outcome = run(&source, store.clone(), RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].attempt, 1);
        assert_eq!(outcome.attempts[0].phase, AttemptPhase::Validation);
        assert!(outcome.attempts[0].error.is_empty());
        // The successful attempt is persisted too.
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn always_invalid_source_exhausts_after_exactly_max_attempts() {
        let source = ScriptedSource::new(vec![
            Ok(oversized_spec()),
            Ok(oversized_spec()),
            Ok(oversized_spec()),
            Ok(oversized_spec()),
        ]);
        let store = audit();
        let result = run(&source, store.clone(), RetryPolicy::default()).await;

        let attempts = assert_matches!(
            result,
            Err(PipelineError::ExhaustedRetries { attempts }) => attempts
        );
        assert_eq!(attempts.len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        let numbers: Vec<u32> = attempts.iter().map(|r| r.attempt).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        // Every attempt's record names the node-ceiling breach.
        assert!(attempts.iter().all(|r| r.error.contains("limit is 8")));
        // Invalid attempts carry the offending spec snapshot.
        assert!(attempts.iter().all(|r| r.spec_snapshot.is_some()));
    }

    #[tokio::test]
    async fn second_attempt_receives_first_attempts_violations() {
        let source = ScriptedSource::new(vec![Ok(oversized_spec()), Ok(valid_spec())]);
        let store = audit();
        let outcome = run(&source, store, RetryPolicy::default()).await.unwrap();

        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let feedback = source.feedback_seen.lock().await;
        assert!(feedback[0].is_empty());
        assert!(feedback[1].iter().any(|v| v.rule == RuleId::MaxNodes));
    }

    #[tokio::test]
    async fn generation_error_counts_as_an_attempt_and_restarts_fresh() {
        let source = ScriptedSource::new(vec![
            Err(BuildError::Unparseable("no json".into())),
            Ok(valid_spec()),
        ]);
        let store = audit();
        let outcome = run(&source, store.clone(), RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].phase, AttemptPhase::Generation);
        assert_eq!(outcome.attempts[1].phase, AttemptPhase::Validation);
        // Fresh restart: no violation feedback after a generation error.
        let feedback = source.feedback_seen.lock().await;
        assert!(feedback[1].is_empty());
    }

    #[tokio::test]
    async fn records_persist_in_attempt_order() {
        let source = ScriptedSource::new(vec![
            Err(BuildError::Unparseable("x".into())),
            Ok(oversized_spec()),
            Ok(valid_spec()),
        ]);
        let store = audit();
        run(&source, store.clone(), RetryPolicy::default())
            .await
            .unwrap();

        let persisted = store.records().await;
        let numbers: Vec<u32> = persisted.iter().map(|(_, r)| r.attempt).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_building() {
        let source = ScriptedSource::new(vec![Ok(valid_spec())]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let store: Arc<dyn AuditStore> = audit();
        let result = generate_validated(
            &source,
            &summary(),
            &limits(),
            None,
            RetryPolicy::default(),
            &store,
            "owner-1",
            &cancel,
        )
        .await;

        assert_matches!(result, Err(PipelineError::Cancelled { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn custom_attempt_budget_is_respected() {
        let source = ScriptedSource::new((0..6).map(|_| Ok(oversized_spec())).collect());
        let store = audit();
        let policy = RetryPolicy {
            max_attempts: 5,
            ..Default::default()
        };
        let result = run(&source, store, policy).await;
        let attempts = assert_matches!(
            result,
            Err(PipelineError::ExhaustedRetries { attempts }) => attempts
        );
        assert_eq!(attempts.len(), 5);
    }
}
