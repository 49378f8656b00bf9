//! Axum route handler for manifestation classification.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classification::{classify, ManifestationClassification};
use crate::errors::AppError;
use crate::notify::{deliver, Notification, NotificationStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub request_id: Uuid,
    pub classification: ManifestationClassification,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationStatus>,
}

/// POST /api/v1/classify
///
/// Suggests species, nature and confidence for one citizen manifestation.
pub async fn handle_classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    if request.notify && state.notifier.is_none() {
        return Err(AppError::Configuration(
            "email notification requested but SMTP_HOST is not set".to_string(),
        ));
    }

    let request_id = Uuid::new_v4();
    let outcome = classify(&state.dispatcher, &state.config.provider.candidates, text).await;

    let notification = match (&state.notifier, request.notify) {
        (Some(notifier), true) => {
            let message = Notification::for_dispatch(request_id, text, &outcome);
            Some(deliver(notifier.as_ref(), &message).await)
        }
        _ => None,
    };

    let (provider, classification) = match outcome.into_result() {
        Ok(classified) => classified,
        Err(failure) => {
            warn!("Request {request_id}: classification failed: {failure}");
            return Err(AppError::from(failure).with_notification(notification));
        }
    };
    info!(
        "Request {request_id}: classified as {:?} ({:?}) by {provider}",
        classification.especie_sugerida, classification.confianca
    );

    Ok(Json(ClassifyResponse {
        request_id,
        classification,
        provider,
        notification,
    }))
}
