use std::sync::Arc;

use clixen_pipeline::PipelineDeps;
use sqlx::PgPool;

use crate::config::ServerConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline dependency bundle, built once at startup.
    pub deps: Arc<PipelineDeps>,
    /// `None` when running without a database (in-memory audit log).
    pub pool: Option<PgPool>,
    pub config: Arc<ServerConfig>,
}
