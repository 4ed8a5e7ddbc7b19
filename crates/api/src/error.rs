use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use clixen_core::audit::AttemptRecord;
use clixen_core::error::CoreError;
use clixen_llm::classifier::ClassifyError;
use clixen_pipeline::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`PipelineError`] for domain errors and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce consistent
/// JSON error responses; pipeline failures include their ordered attempt
/// summaries but never raw model output.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `clixen_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A pipeline run failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, attempts) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
                }
                CoreError::Malformed(msg) => {
                    (StatusCode::BAD_REQUEST, "MALFORMED", msg.clone(), None)
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
            },

            // --- Pipeline failures ---
            AppError::Pipeline(pipeline) => classify_pipeline_error(pipeline),

            // --- Database errors ---
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(attempts) = attempts {
            body["attempts"] = attempts;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Map a pipeline failure to an HTTP status, code, message, and optional
/// attempt summary.
///
/// - Empty utterance is the caller's fault: 400.
/// - Other classification failures mean the model endpoint is down: 502.
/// - An exhausted generation budget is a semantic rejection of the request,
///   not a server fault: 422 with per-attempt summaries.
/// - Deployment failures are upstream engine faults: 502 with summaries.
/// - Cancellation gets the nginx-style 499 (client closed request).
fn classify_pipeline_error(
    err: &PipelineError,
) -> (StatusCode, &'static str, String, Option<serde_json::Value>) {
    match err {
        PipelineError::Classification(ClassifyError::EmptyUtterance) => (
            StatusCode::BAD_REQUEST,
            "EMPTY_UTTERANCE",
            "Utterance must not be empty".to_string(),
            None,
        ),
        PipelineError::Classification(e) => {
            tracing::error!(error = %e, "Classification failed");
            (
                StatusCode::BAD_GATEWAY,
                "MODEL_UNAVAILABLE",
                "Could not understand the request; try again".to_string(),
                None,
            )
        }
        PipelineError::ExhaustedRetries { attempts } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "GENERATION_EXHAUSTED",
            format!(
                "Could not produce a valid workflow in {} attempts",
                attempts.len()
            ),
            Some(attempt_summaries(attempts)),
        ),
        PipelineError::Deployment { source, attempts } => {
            tracing::error!(error = %source, "Deployment failed");
            (
                StatusCode::BAD_GATEWAY,
                "DEPLOY_FAILED",
                "Workflow engine rejected the deployment".to_string(),
                Some(attempt_summaries(attempts)),
            )
        }
        PipelineError::Audit(e) => {
            tracing::error!(error = %e, "Audit store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            )
        }
        PipelineError::Cancelled { phase } => (
            StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "CANCELLED",
            format!("Request cancelled after {phase}"),
            None,
        ),
        PipelineError::Internal(e) => {
            tracing::error!(error = %e, "Pipeline task failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            )
        }
    }
}

/// Per-attempt summaries safe to return to callers: attempt number, phase,
/// and error message only. Spec snapshots stay in the audit log.
fn attempt_summaries(attempts: &[AttemptRecord]) -> serde_json::Value {
    attempts
        .iter()
        .map(|r| {
            json!({
                "attempt": r.attempt,
                "phase": r.phase.as_str(),
                "error": r.error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clixen_core::audit::AttemptPhase;

    fn record(attempt: u32, error: &str) -> AttemptRecord {
        AttemptRecord::new(attempt, AttemptPhase::Validation, error, None)
    }

    #[test]
    fn exhausted_retries_maps_to_422_with_summaries() {
        let err = AppError::Pipeline(PipelineError::ExhaustedRetries {
            attempts: vec![record(1, "too many nodes"), record(2, "too many nodes")],
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn empty_utterance_is_a_client_error() {
        let err = AppError::Pipeline(PipelineError::Classification(
            ClassifyError::EmptyUtterance,
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cancellation_uses_client_closed_request() {
        let err = AppError::Pipeline(PipelineError::Cancelled { phase: "generation" });
        assert_eq!(err.into_response().status().as_u16(), 499);
    }

    #[test]
    fn summaries_omit_spec_snapshots() {
        let mut r = record(1, "boom");
        r.spec_snapshot = Some(json!({"nodes": []}));
        let value = attempt_summaries(&[r]);
        assert!(value[0].get("spec_snapshot").is_none());
    }
}
