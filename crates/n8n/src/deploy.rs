//! Deployment adapter: validated specification → live engine workflow.
//!
//! The adapter does not re-validate (that is the validator's job) but does
//! fail fast on obviously malformed input rather than forwarding garbage to
//! the engine. Creation and activation failures are surfaced distinctly
//! because remediation differs: a creation failure can be retried wholesale,
//! an activation failure leaves a created-but-inactive workflow in place for
//! caller-driven cleanup or re-activation.

use std::sync::Arc;

use clixen_core::spec::WorkflowSpec;
use serde::Serialize;

use crate::api::{EngineApi, EngineApiError};

/// Result of a successful deployment.
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    /// Identifier assigned by the engine.
    pub workflow_id: String,
    /// Externally reachable entry URL; present only when the specification
    /// contains a webhook trigger.
    pub entry_endpoint: Option<String>,
    /// Whether the engine confirmed activation.
    pub activated: bool,
}

/// Errors from deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The specification was malformed in a way the adapter refuses to
    /// forward (e.g. zero nodes). No engine call was made.
    #[error("Deployment precondition failed: {0}")]
    Precondition(String),

    /// The engine rejected or failed workflow creation. Nothing was created.
    #[error("Workflow creation failed: {0}")]
    Creation(#[source] EngineApiError),

    /// Creation succeeded but activation failed. The created workflow is
    /// left in place, inactive; `workflow_id` identifies it for remediation.
    #[error("Workflow {workflow_id} was created but activation failed: {source}")]
    Activation {
        workflow_id: String,
        #[source]
        source: EngineApiError,
    },
}

/// Pushes validated specifications to the engine and activates them.
pub struct DeploymentAdapter {
    api: Arc<dyn EngineApi>,
    /// Public base URL used to derive webhook entry endpoints.
    public_base_url: String,
}

impl DeploymentAdapter {
    pub fn new(api: Arc<dyn EngineApi>, public_base_url: String) -> Self {
        Self {
            api,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Deploy `spec` under `owner_tag`'s namespace.
    ///
    /// The submitted workflow name is prefixed with the owner tag so
    /// multi-tenant isolation is enforced here, not left to engine defaults.
    pub async fn deploy(
        &self,
        spec: &WorkflowSpec,
        owner_tag: &str,
    ) -> Result<Deployment, DeployError> {
        if spec.nodes.is_empty() {
            return Err(DeployError::Precondition(
                "specification has no nodes".into(),
            ));
        }

        let mut workflow_json = spec.to_engine_json();
        workflow_json["name"] = serde_json::Value::String(namespaced_name(owner_tag, &spec.name));

        let created = self
            .api
            .create_workflow(&workflow_json)
            .await
            .map_err(DeployError::Creation)?;

        tracing::info!(
            owner = %owner_tag,
            workflow_id = %created.id,
            "Workflow created on engine",
        );

        if let Err(e) = self.api.activate_workflow(&created.id).await {
            // Deliberately not rolled back; the caller decides remediation.
            return Err(DeployError::Activation {
                workflow_id: created.id,
                source: e,
            });
        }

        let entry_endpoint = self.entry_endpoint(spec);

        tracing::info!(
            owner = %owner_tag,
            workflow_id = %created.id,
            has_endpoint = entry_endpoint.is_some(),
            "Workflow activated",
        );

        Ok(Deployment {
            workflow_id: created.id,
            entry_endpoint,
            activated: true,
        })
    }

    /// Derive the externally reachable URL from the first webhook trigger.
    /// A spec without one has no entry endpoint; that is not an error.
    fn entry_endpoint(&self, spec: &WorkflowSpec) -> Option<String> {
        spec.webhook_trigger().map(|node| {
            let path = match &node.parameters {
                clixen_core::spec::NodeParameters::Webhook { path, .. } => path.as_str(),
                _ => node.id.as_str(),
            };
            format!(
                "{}/webhook/{}",
                self.public_base_url,
                path.trim_start_matches('/')
            )
        })
    }
}

/// Workflow name prefixed with its owner tag.
fn namespaced_name(owner_tag: &str, name: &str) -> String {
    format!("[{owner_tag}] {name}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
