use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod pipeline;

/// Routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(pipeline::router())
}
