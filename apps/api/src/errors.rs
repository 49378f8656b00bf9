use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::DispatchFailure;
use crate::notify::NotificationStatus;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data access error: {0}")]
    DataAccess(#[from] sqlx::Error),

    #[error("Provider '{candidate}' rejected the credential: {message}")]
    ProviderAuth { candidate: String, message: String },

    #[error("All {attempts} provider candidates failed")]
    ProvidersExhausted { attempts: usize },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    /// A failed request whose result was still emailed; the delivery status
    /// travels with the error body.
    #[error("{error}")]
    Notified {
        error: Box<AppError>,
        notification: NotificationStatus,
    },
}

impl AppError {
    pub fn with_notification(self, notification: Option<NotificationStatus>) -> Self {
        match notification {
            Some(notification) => AppError::Notified {
                error: Box::new(self),
                notification,
            },
            None => self,
        }
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    format!("Service is not configured for this request: {msg}"),
                )
            }
            AppError::DataAccess(e) => {
                tracing::error!("Data access error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "DATA_ACCESS_ERROR",
                    "The data store is unavailable; no data could be loaded".to_string(),
                )
            }
            AppError::ProviderAuth { candidate, message } => {
                tracing::error!("Provider {candidate} rejected the credential: {message}");
                (
                    StatusCode::BAD_GATEWAY,
                    "PROVIDER_AUTH_ERROR",
                    "The model provider rejected the API token. Check HF_API_TOKEN and try again"
                        .to_string(),
                )
            }
            AppError::ProvidersExhausted { attempts } => {
                tracing::error!("All {attempts} provider candidates failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PROVIDERS_UNAVAILABLE",
                    "No model is available right now. Please try again later".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::Notified { error, .. } => error.parts(),
        }
    }
}

impl From<DispatchFailure> for AppError {
    fn from(failure: DispatchFailure) -> Self {
        match failure {
            DispatchFailure::Auth { candidate, message } => {
                AppError::ProviderAuth { candidate, message }
            }
            DispatchFailure::Exhausted { errors } => AppError::ProvidersExhausted {
                attempts: errors.len(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let mut body = json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        if let AppError::Notified { notification, .. } = &self {
            body["notification"] = json!(notification);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{AttemptError, FailureKind};

    #[test]
    fn test_dispatch_failures_map_to_taxonomy() {
        let auth: AppError = DispatchFailure::Auth {
            candidate: "org/a".to_string(),
            message: "bad token".to_string(),
        }
        .into();
        assert!(matches!(auth, AppError::ProviderAuth { .. }));

        let exhausted: AppError = DispatchFailure::Exhausted {
            errors: vec![AttemptError {
                candidate: "org/a".to_string(),
                kind: FailureKind::Network,
                status: None,
                message: "timeout".to_string(),
            }],
        }
        .into();
        assert!(matches!(
            exhausted,
            AppError::ProvidersExhausted { attempts: 1 }
        ));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::ProviderAuth {
                    candidate: "a".into(),
                    message: "b".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::ProvidersExhausted { attempts: 3 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::DataAccess(sqlx::Error::PoolTimedOut),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_notified_error_keeps_inner_status() {
        let error = AppError::ProvidersExhausted { attempts: 2 }.with_notification(Some(
            NotificationStatus::Failed {
                detail: "relay refused".to_string(),
            },
        ));
        assert_eq!(error.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let plain = AppError::Validation("x".into()).with_notification(None);
        assert!(matches!(plain, AppError::Validation(_)));
    }
}
