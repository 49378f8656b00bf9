//! Notification sink: optional email carrying a query and its dispatch result.
//!
//! Delivery is attempted once. A failure is reported back to the caller in the
//! response body; it never fails the request and is never retried.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::DispatchOutcome;

pub mod smtp;

pub use smtp::{SmtpConfig, SmtpNotifier};

/// Fixed subject for every notification.
pub const NOTIFY_SUBJECT: &str = "Ouvidoria: resultado de consulta ao assistente";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("mail submission failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_dispatch<T: Serialize>(
        request_id: Uuid,
        query: &str,
        outcome: &DispatchOutcome<T>,
    ) -> Self {
        let serialized = serde_json::to_string_pretty(outcome)
            .unwrap_or_else(|e| format!("<resultado não serializável: {e}>"));
        Self {
            subject: NOTIFY_SUBJECT.to_string(),
            body: format!(
                "Requisição: {request_id}\n\nTexto enviado:\n{query}\n\nResultado:\n{serialized}\n"
            ),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Delivery result as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed { detail: String },
}

/// Sends once and converts the result into a user-visible status.
pub async fn deliver(notifier: &dyn Notifier, notification: &Notification) -> NotificationStatus {
    match notifier.send(notification).await {
        Ok(()) => {
            info!("Notification sent: {}", notification.subject);
            NotificationStatus::Sent
        }
        Err(e) => {
            warn!("Notification failed: {e}");
            NotificationStatus::Failed {
                detail: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records notifications instead of sending them.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Notification>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail {
                let err = "not an address".parse::<lettre::Address>().unwrap_err();
                return Err(NotifyError::Address(err));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;
    use crate::llm_client::{AttemptError, FailureKind};

    #[test]
    fn test_body_carries_query_and_outcome() {
        let outcome: DispatchOutcome<String> = DispatchOutcome::Exhausted {
            errors: vec![AttemptError {
                candidate: "org/a".to_string(),
                kind: FailureKind::ModelLoading,
                status: Some(503),
                message: "model is loading".to_string(),
            }],
        };
        let n = Notification::for_dispatch(Uuid::nil(), "Buraco na rua", &outcome);
        assert_eq!(n.subject, NOTIFY_SUBJECT);
        assert!(n.body.contains("Buraco na rua"));
        assert!(n.body.contains("\"status\": \"exhausted\""), "{}", n.body);
        assert!(n.body.contains("\"kind\": \"model_loading\""));
    }

    #[tokio::test]
    async fn test_deliver_reports_failure_without_retry() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let n = Notification {
            subject: NOTIFY_SUBJECT.to_string(),
            body: "x".to_string(),
        };
        let status = deliver(&notifier, &n).await;
        assert!(matches!(status, NotificationStatus::Failed { .. }));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_sent() {
        let notifier = RecordingNotifier::default();
        let n = Notification {
            subject: NOTIFY_SUBJECT.to_string(),
            body: "x".to_string(),
        };
        assert_eq!(deliver(&notifier, &n).await, NotificationStatus::Sent);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }
}
