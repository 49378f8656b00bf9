pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::classification::handlers as classification;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/ask", post(analysis::handle_ask))
        .route("/api/v1/classify", post(classification::handle_classify))
        .route(
            "/api/v1/dataset/refresh",
            post(analysis::handle_refresh_dataset),
        )
        .with_state(state)
}
