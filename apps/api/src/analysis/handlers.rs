//! Axum route handlers for the question-answering API.

use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::analysis::pipeline::{answer_question, AskRequest, AskResponse};
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/ask
///
/// Answers a free-text question about the manifestation dataset.
/// Specific questions get the matching rows; general ones get a digest.
pub async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let response = answer_question(&state, request).await?;
    Ok(Json(response))
}

/// POST /api/v1/dataset/refresh
///
/// Drops every cached snapshot so the next question reads the store again.
pub async fn handle_refresh_dataset(State(state): State<AppState>) -> StatusCode {
    let dropped = state.dataset_cache.len();
    state.dataset_cache.invalidate();
    info!("Dataset cache invalidated ({dropped} snapshots dropped)");
    StatusCode::NO_CONTENT
}
