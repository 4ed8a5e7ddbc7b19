use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clixen_api::config::ServerConfig;
use clixen_api::{routes, state::AppState};
use clixen_core::audit::{AuditStore, MemoryAuditStore};
use clixen_llm::builder::SpecBuilder;
use clixen_llm::classifier::IntentClassifier;
use clixen_llm::inference::{HttpModelClient, ModelInference};
use clixen_n8n::api::{EngineApi, N8nApi};
use clixen_n8n::capability::CapabilityCache;
use clixen_n8n::deploy::DeploymentAdapter;
use clixen_pipeline::{BuilderSource, PipelineDeps, RetryPolicy};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clixen_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database (optional; in-memory audit log without one) ---
    let (pool, audit): (Option<sqlx::PgPool>, Arc<dyn AuditStore>) =
        match std::env::var("DATABASE_URL") {
            Ok(database_url) => {
                let pool = clixen_db::create_pool(&database_url)
                    .await
                    .expect("Failed to connect to database");
                tracing::info!("Database connection pool created");

                clixen_db::health_check(&pool)
                    .await
                    .expect("Database health check failed");

                clixen_db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");
                tracing::info!("Attempt log schema ready");

                let store = Arc::new(clixen_db::PgAuditStore::new(pool.clone()));
                (Some(pool), store)
            }
            Err(_) => {
                tracing::warn!("DATABASE_URL not set; attempt log is in-memory only");
                (None, Arc::new(MemoryAuditStore::new()))
            }
        };

    // --- Pipeline dependencies ---
    let model: Arc<dyn ModelInference> = Arc::new(HttpModelClient::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));
    let engine: Arc<dyn EngineApi> = Arc::new(N8nApi::new(
        config.n8n_api_url.clone(),
        config.n8n_api_key.clone(),
    ));
    let capabilities = Arc::new(CapabilityCache::new(Arc::clone(&engine)));

    let deps = Arc::new(PipelineDeps {
        classifier: IntentClassifier::new(Arc::clone(&model)),
        source: Arc::new(BuilderSource::new(
            SpecBuilder::new(model),
            Arc::clone(&capabilities),
        )),
        deployer: DeploymentAdapter::new(engine, config.public_base_url.clone()),
        capabilities,
        audit,
        http: reqwest::Client::new(),
        policy: RetryPolicy::default(),
    });
    tracing::info!("Pipeline dependencies wired");

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- App state ---
    let state = AppState {
        deps,
        pool,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api).
        .merge(routes::health::router())
        // API routes.
        .nest("/api", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server shuts
/// down cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
