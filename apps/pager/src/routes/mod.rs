pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::export::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Export API
        .route("/api/v1/export/plan", post(handlers::handle_plan))
        .route("/api/v1/export/pdf", post(handlers::handle_export_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
