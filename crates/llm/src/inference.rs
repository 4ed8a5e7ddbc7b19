//! Model inference service boundary.
//!
//! [`ModelInference`] is the single seam through which the classifier and
//! builder reach a language model. [`HttpModelClient`] talks to an
//! OpenAI-compatible chat-completions endpoint; tests substitute
//! [`PinnedModel`] for deterministic output.

use std::time::Duration;

use serde::Deserialize;

/// Default timeout for one inference call.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from the model inference layer.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The inference service returned a non-2xx status code.
    #[error("Inference API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response parsed but contained no message content.
    #[error("Inference response contained no content")]
    MissingContent,
}

/// A language-model call: prompt in, raw text out.
#[async_trait::async_trait]
pub trait ModelInference: Send + Sync {
    /// Run one inference. `schema_hint` describes the JSON shape the caller
    /// expects back and is passed as the system message.
    async fn infer(&self, prompt: &str, schema_hint: &str) -> Result<String, InferenceError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpModelClient {
    /// Create a client for an inference endpoint.
    ///
    /// * `base_url` - e.g. `https://api.openai.com`.
    /// * `model`    - model identifier sent with every request.
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            timeout: DEFAULT_INFERENCE_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl ModelInference for HttpModelClient {
    async fn infer(&self, prompt: &str, schema_hint: &str) -> Result<String, InferenceError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": schema_hint },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(InferenceError::MissingContent)
    }
}

// ---------------------------------------------------------------------------
// Pinned model for tests
// ---------------------------------------------------------------------------

/// Deterministic model double: returns canned responses in order, then
/// repeats the last one. Records every prompt it receives.
pub struct PinnedModel {
    responses: Vec<String>,
    calls: tokio::sync::Mutex<Vec<String>>,
    cursor: std::sync::atomic::AtomicUsize,
}

impl PinnedModel {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            calls: tokio::sync::Mutex::new(Vec::new()),
            cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Single canned response for every call.
    pub fn single(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Prompts received so far, in call order.
    pub async fn prompts(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ModelInference for PinnedModel {
    async fn infer(&self, prompt: &str, _schema_hint: &str) -> Result<String, InferenceError> {
        self.calls.lock().await.push(prompt.to_string());
        let index = self
            .cursor
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .min(self.responses.len().saturating_sub(1));
        self.responses
            .get(index)
            .cloned()
            .ok_or(InferenceError::MissingContent)
    }
}
