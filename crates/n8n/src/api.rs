//! REST API client for the n8n HTTP endpoints.

use std::time::Duration;

use serde::Deserialize;

/// Default timeout for one engine API call.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the n8n REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// n8n returned a non-2xx status code.
    #[error("n8n API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response parsed but lacked an expected field.
    #[error("Unexpected n8n response shape: {0}")]
    Shape(String),
}

/// Identifier assigned by the engine for a created workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWorkflow {
    pub id: String,
}

/// The remote workflow engine's API surface, as consumed by the pipeline.
///
/// Implemented by [`N8nApi`] in production and by counting stubs in tests.
#[async_trait::async_trait]
pub trait EngineApi: Send + Sync {
    /// Create a workflow from its engine JSON. Does not activate it.
    async fn create_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<CreatedWorkflow, EngineApiError>;

    /// Activate a previously created workflow.
    async fn activate_workflow(&self, workflow_id: &str) -> Result<(), EngineApiError>;

    /// Node type strings installed on the engine.
    async fn list_node_types(&self) -> Result<Vec<String>, EngineApiError>;

    /// Credential type strings configured on the engine.
    async fn list_credential_types(&self) -> Result<Vec<String>, EngineApiError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// HTTP client for a single n8n instance.
pub struct N8nApi {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TypeEntry {
    name: String,
}

impl N8nApi {
    /// Create a new API client for an n8n instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `https://n8n.example.com`.
    /// * `api_key` - Value for the `X-N8N-API-KEY` header.
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            timeout: DEFAULT_API_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base HTTP URL of the instance.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_url))
            .header("X-N8N-API-KEY", &self.api_key)
            .timeout(self.timeout)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or an [`EngineApiError::Api`] containing the
    /// status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EngineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait::async_trait]
impl EngineApi for N8nApi {
    async fn create_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<CreatedWorkflow, EngineApiError> {
        let response = self
            .request(reqwest::Method::POST, "/api/v1/workflows")
            .json(workflow)
            .send()
            .await?;

        let body: serde_json::Value = Self::parse_response(response).await?;

        // n8n has returned both string and numeric ids across versions.
        let id = match body.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                return Err(EngineApiError::Shape(
                    "workflow create response has no 'id'".into(),
                ))
            }
        };

        Ok(CreatedWorkflow { id })
    }

    async fn activate_workflow(&self, workflow_id: &str) -> Result<(), EngineApiError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/workflows/{workflow_id}/activate"),
            )
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn list_node_types(&self) -> Result<Vec<String>, EngineApiError> {
        let response = self
            .request(reqwest::Method::GET, "/types/nodes.json")
            .send()
            .await?;

        let entries: Vec<TypeEntry> = Self::parse_response(response).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    async fn list_credential_types(&self) -> Result<Vec<String>, EngineApiError> {
        let response = self
            .request(reqwest::Method::GET, "/types/credentials.json")
            .send()
            .await?;

        let entries: Vec<TypeEntry> = Self::parse_response(response).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }
}
