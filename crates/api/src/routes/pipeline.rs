//! The pipeline endpoint: natural language in, deployed workflow out.

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::Deserialize;

use clixen_core::limits::{OwnerContext, PlatformLimits};
use clixen_core::requirement::{ComplexityTier, ConversationTurn};
use clixen_pipeline::{run_pipeline_detached, PipelineOutcome};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for `POST /api/pipeline/run`.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// The natural-language workflow request.
    pub utterance: String,
    /// Prior conversation turns, oldest first.
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    /// Namespace tag for the calling user/project.
    pub owner_tag: String,
    /// Plan tier capping workflow size. Defaults to the most permissive
    /// tier; the classifier-derived tier still shapes generation.
    #[serde(default)]
    pub tier: Option<ComplexityTier>,
}

/// POST /api/pipeline/run -- run the full pipeline for one request.
async fn run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> AppResult<Json<PipelineOutcome>> {
    let owner_tag = request.owner_tag.trim();
    if owner_tag.is_empty() {
        return Err(AppError::BadRequest("owner_tag must not be empty".into()));
    }

    let tier = request.tier.unwrap_or(ComplexityTier::Advanced);
    let mut limits = PlatformLimits::for_tier(tier);
    limits.orphan_severity = state.config.orphan_severity;

    let owner = OwnerContext {
        owner_tag: owner_tag.to_string(),
        limits,
    };

    tracing::info!(owner = %owner.owner_tag, tier = ?tier, "Pipeline run requested");

    let owner_tag = owner.owner_tag.clone();

    // Detached so a client disconnect cannot abort an in-flight engine call;
    // the pipeline observes the cancellation at its next phase boundary.
    let outcome = run_pipeline_detached(
        Arc::clone(&state.deps),
        request.utterance,
        request.history,
        owner,
    )
    .await?;

    tracing::info!(
        owner = %owner_tag,
        workflow_id = %outcome.deployment.workflow_id,
        attempts = outcome.attempts.len(),
        "Pipeline run succeeded",
    );

    Ok(Json(outcome))
}

/// Mount pipeline routes (intended for nesting under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/pipeline/run", post(run))
}
