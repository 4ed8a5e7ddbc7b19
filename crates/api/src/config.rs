use clixen_core::validation::Severity;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the two
/// upstream API keys, which must be set.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`; pipeline runs are
    /// slow by nature).
    pub request_timeout_secs: u64,
    /// Base URL of the OpenAI-compatible model endpoint.
    pub llm_api_url: String,
    /// API key for the model endpoint.
    pub llm_api_key: String,
    /// Model identifier sent with every completion request.
    pub llm_model: String,
    /// Base URL of the n8n instance (API and webhook host).
    pub n8n_api_url: String,
    /// n8n API key.
    pub n8n_api_key: String,
    /// Public base URL webhook endpoints are reported under. Defaults to
    /// `n8n_api_url` when unset (single-host deployments).
    pub public_base_url: String,
    /// Severity applied to unreachable nodes during validation.
    pub orphan_severity: Severity,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `120`                      |
    /// | `LLM_API_URL`          | `https://api.openai.com`   |
    /// | `LLM_API_KEY`          | (required)                 |
    /// | `LLM_MODEL`            | `gpt-4o-mini`              |
    /// | `N8N_API_URL`          | `http://localhost:5678`    |
    /// | `N8N_API_KEY`          | (required)                 |
    /// | `PUBLIC_BASE_URL`      | value of `N8N_API_URL`     |
    /// | `ORPHAN_SEVERITY`      | `advisory`                 |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let llm_api_url =
            std::env::var("LLM_API_URL").unwrap_or_else(|_| "https://api.openai.com".into());
        let llm_api_key = std::env::var("LLM_API_KEY").expect("LLM_API_KEY must be set");
        let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

        let n8n_api_url =
            std::env::var("N8N_API_URL").unwrap_or_else(|_| "http://localhost:5678".into());
        let n8n_api_key = std::env::var("N8N_API_KEY").expect("N8N_API_KEY must be set");
        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| n8n_api_url.clone());

        let orphan_severity = match std::env::var("ORPHAN_SEVERITY").as_deref() {
            Ok("blocking") => Severity::Blocking,
            Ok("advisory") | Err(_) => Severity::Advisory,
            Ok(other) => panic!("ORPHAN_SEVERITY must be 'blocking' or 'advisory', got {other}"),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            llm_api_url,
            llm_api_key,
            llm_model,
            n8n_api_url,
            n8n_api_key,
            public_base_url,
            orphan_severity,
        }
    }
}
