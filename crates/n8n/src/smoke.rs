//! Post-deployment smoke probe.
//!
//! One synthetic request against a freshly deployed workflow's entry
//! endpoint. The result is advisory: a failed probe never un-deploys or
//! fails an otherwise successful deployment.

use std::time::Duration;

use crate::deploy::Deployment;

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Fire one synthetic event at the deployment's entry endpoint.
///
/// Returns `true` when the endpoint responds with a success status, and
/// trivially `true` when there is no endpoint to probe (nothing externally
/// callable). Network errors, timeouts, and non-success statuses all yield
/// `false`; this function never returns an error.
pub async fn smoke_probe(
    client: &reqwest::Client,
    deployment: &Deployment,
    timeout: Duration,
) -> bool {
    let Some(endpoint) = &deployment.entry_endpoint else {
        return true;
    };

    let result = client
        .post(endpoint)
        .timeout(timeout)
        .json(&serde_json::json!({ "clixen_smoke_test": true }))
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            tracing::info!(workflow_id = %deployment.workflow_id, "Smoke probe passed");
            true
        }
        Ok(response) => {
            tracing::warn!(
                workflow_id = %deployment.workflow_id,
                status = response.status().as_u16(),
                "Smoke probe got non-success status",
            );
            false
        }
        Err(e) => {
            tracing::warn!(
                workflow_id = %deployment.workflow_id,
                error = %e,
                "Smoke probe request failed",
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(endpoint: Option<&str>) -> Deployment {
        Deployment {
            workflow_id: "wf-1".into(),
            entry_endpoint: endpoint.map(String::from),
            activated: true,
        }
    }

    #[tokio::test]
    async fn no_endpoint_is_trivially_reachable() {
        let client = reqwest::Client::new();
        assert!(smoke_probe(&client, &deployment(None), DEFAULT_PROBE_TIMEOUT).await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_false_not_error() {
        let client = reqwest::Client::new();
        // Port 9 (discard) is not listening locally; connection is refused.
        let probed = smoke_probe(
            &client,
            &deployment(Some("http://127.0.0.1:9/webhook/x")),
            Duration::from_millis(500),
        )
        .await;
        assert!(!probed);
    }
}
