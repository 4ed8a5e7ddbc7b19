//! The pipeline entry point.
//!
//! `run_pipeline` (and its drop-safe wrapper `run_pipeline_detached`) is the
//! surface exposed to calling layers: utterance in, deployment (or an
//! ordered failure account) out. Cancellation is cooperative and checked
//! between phases only — never mid network-call — so the engine is never
//! left half-created without a recorded attempt.

use std::sync::Arc;

use clixen_core::audit::{AttemptPhase, AttemptRecord, AuditStore};
use clixen_core::limits::OwnerContext;
use clixen_core::requirement::ConversationTurn;
use clixen_llm::classifier::{ClassifyError, IntentClassifier};
use clixen_n8n::capability::CapabilityCache;
use clixen_n8n::deploy::{DeployError, Deployment, DeploymentAdapter};
use clixen_n8n::smoke::{smoke_probe, DEFAULT_PROBE_TIMEOUT};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::retry::{generate_validated, RetryPolicy};
use crate::source::SpecSource;

/// Everything the pipeline needs to run, bundled once at startup.
pub struct PipelineDeps {
    pub classifier: IntentClassifier,
    pub source: Arc<dyn SpecSource>,
    pub deployer: DeploymentAdapter,
    pub capabilities: Arc<CapabilityCache>,
    pub audit: Arc<dyn AuditStore>,
    /// Client used for the post-deploy smoke probe.
    pub http: reqwest::Client,
    pub policy: RetryPolicy,
}

/// Successful pipeline result.
#[derive(Debug, Serialize)]
pub struct PipelineOutcome {
    pub deployment: Deployment,
    /// `None` when there was no endpoint to probe; otherwise the probe
    /// verdict. A failed probe is advisory, not fatal.
    pub smoke_passed: Option<bool>,
    /// Full attempt history for the run, in order.
    pub attempts: Vec<AttemptRecord>,
}

/// Run the full pipeline for one request.
pub async fn run_pipeline(
    deps: &PipelineDeps,
    utterance: &str,
    history: &[ConversationTurn],
    owner: &OwnerContext,
    cancel: &CancellationToken,
) -> Result<PipelineOutcome, PipelineError> {
    // --- Phase 1: classification (retried with backoff) ---
    let summary =
        classify_with_backoff(&deps.classifier, utterance, history, &deps.policy).await?;
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled {
            phase: "classification",
        });
    }

    // --- Phase 2: bounded generate/validate loop ---
    let credential_types = deps.capabilities.credential_type_names().await;
    let outcome = generate_validated(
        deps.source.as_ref(),
        &summary,
        &owner.limits,
        credential_types.as_deref(),
        deps.policy,
        &deps.audit,
        &owner.owner_tag,
        cancel,
    )
    .await?;
    let mut attempts = outcome.attempts;

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { phase: "generation" });
    }

    // --- Phase 3: deployment (separate bounded retry) ---
    let deployment = deploy_with_retry(deps, &outcome.spec, owner, &mut attempts).await?;

    // --- Phase 4: smoke probe (advisory) ---
    let smoke_passed = match &deployment.entry_endpoint {
        None => None,
        Some(_) => {
            let passed = smoke_probe(&deps.http, &deployment, DEFAULT_PROBE_TIMEOUT).await;
            if !passed {
                tracing::warn!(
                    workflow_id = %deployment.workflow_id,
                    "Smoke probe failed; deployment stands",
                );
            }
            Some(passed)
        }
    };

    Ok(PipelineOutcome {
        deployment,
        smoke_passed,
        attempts,
    })
}

/// Run the pipeline on a detached task, surviving caller drop.
///
/// Dropping the returned future (a client disconnect, in HTTP terms) does
/// not abort the pipeline mid network-call: the spawned task keeps running,
/// a guard cancels the token, and the next between-phase check stops the
/// work after the in-flight phase and its audit append complete.
pub async fn run_pipeline_detached(
    deps: Arc<PipelineDeps>,
    utterance: String,
    history: Vec<ConversationTurn>,
    owner: OwnerContext,
) -> Result<PipelineOutcome, PipelineError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let task = tokio::spawn(async move {
        run_pipeline(&deps, &utterance, &history, &owner, &cancel).await
    });

    match task.await {
        Ok(result) => result,
        Err(e) => Err(PipelineError::Internal(e.to_string())),
    }
}

/// Classify with bounded retries; empty-utterance rejection is permanent
/// and not retried.
async fn classify_with_backoff(
    classifier: &IntentClassifier,
    utterance: &str,
    history: &[ConversationTurn],
    policy: &RetryPolicy,
) -> Result<clixen_core::requirement::RequirementSummary, PipelineError> {
    let mut delay = policy.classify_backoff;
    let mut tries = 0u32;
    loop {
        match classifier.classify(utterance, history).await {
            Ok(summary) => return Ok(summary),
            Err(ClassifyError::EmptyUtterance) => {
                return Err(PipelineError::Classification(ClassifyError::EmptyUtterance))
            }
            Err(e) => {
                tries += 1;
                if tries > policy.classify_retries {
                    return Err(PipelineError::Classification(e));
                }
                tracing::warn!(error = %e, tries, "Classification failed; backing off");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

/// Deployment loop: only creation failures are retried (same spec,
/// transient-network assumption). Activation failures surface immediately —
/// re-activating a created workflow risks duplicate side effects.
async fn deploy_with_retry(
    deps: &PipelineDeps,
    spec: &clixen_core::spec::WorkflowSpec,
    owner: &OwnerContext,
    attempts: &mut Vec<AttemptRecord>,
) -> Result<Deployment, PipelineError> {
    let base = attempts.last().map(|r| r.attempt).unwrap_or(0);
    let mut tries = 0u32;

    loop {
        tries += 1;
        let attempt_no = base + tries;

        match deps.deployer.deploy(spec, &owner.owner_tag).await {
            Ok(deployment) => {
                let record = AttemptRecord::new(attempt_no, AttemptPhase::Deployment, "", None);
                deps.audit.append(&owner.owner_tag, &record).await?;
                attempts.push(record);
                return Ok(deployment);
            }
            Err(e) => {
                let record = AttemptRecord::new(
                    attempt_no,
                    AttemptPhase::Deployment,
                    e.to_string(),
                    Some(spec.to_engine_json()),
                );
                deps.audit.append(&owner.owner_tag, &record).await?;
                attempts.push(record);

                let retryable = matches!(e, DeployError::Creation(_));
                if retryable && tries <= deps.policy.deploy_retries {
                    tracing::warn!(
                        owner = %owner.owner_tag,
                        error = %e,
                        "Workflow creation failed; retrying once with the same spec",
                    );
                    continue;
                }
                return Err(PipelineError::Deployment {
                    source: e,
                    attempts: std::mem::take(attempts),
                });
            }
        }
    }
}
