//! Provider Dispatcher: walks the candidate list in order until one answers.
//!
//! State: the current index into the list plus the non-fatal errors collected
//! so far. Terminal states are `Success`, `AuthFailure` (a 401 stops the walk,
//! since the same token is sent to every candidate) and `Exhausted`.
//!
//! Each candidate gets exactly one request. The list itself is the retry
//! mechanism; candidates are never tried concurrently.

use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    error_message, extract_text, CandidateKind, ChatRequest, InstructionOptions,
    InstructionParameters, InstructionRequest, PayloadSource, PromptPayload, ProviderCandidate,
    ProviderError, ProviderSettings,
};

/// Coarse failure class recorded per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    ModelLoading,
    RateLimited,
    Status,
    Malformed,
}

/// One non-fatal failure, kept in candidate order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptError {
    pub candidate: String,
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl AttemptError {
    fn new(candidate: &ProviderCandidate, error: &ProviderError) -> Self {
        let (kind, status) = match error {
            ProviderError::Http(e) => (FailureKind::Network, e.status().map(|s| s.as_u16())),
            ProviderError::ModelLoading { .. } => (FailureKind::ModelLoading, Some(503)),
            ProviderError::RateLimited { .. } => (FailureKind::RateLimited, Some(429)),
            ProviderError::Api { status, .. } | ProviderError::Unauthorized { status, .. } => {
                (FailureKind::Status, Some(*status))
            }
            ProviderError::Malformed(_) => (FailureKind::Malformed, None),
        };
        Self {
            candidate: candidate.model.clone(),
            kind,
            status,
            message: error.to_string(),
        }
    }
}

/// Result of walking the candidate list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome<T> {
    Success { candidate: String, value: T },
    AuthFailure { candidate: String, message: String },
    Exhausted { errors: Vec<AttemptError> },
}

/// The two terminal failures, as an error value.
#[derive(Debug, Error)]
pub enum DispatchFailure {
    #[error("candidate '{candidate}' rejected the credential: {message}")]
    Auth { candidate: String, message: String },

    #[error("all {} provider candidates failed", errors.len())]
    Exhausted { errors: Vec<AttemptError> },
}

impl<T> DispatchOutcome<T> {
    /// Splits the outcome into `(candidate, value)` or a terminal failure.
    pub fn into_result(self) -> Result<(String, T), DispatchFailure> {
        match self {
            DispatchOutcome::Success { candidate, value } => Ok((candidate, value)),
            DispatchOutcome::AuthFailure { candidate, message } => {
                Err(DispatchFailure::Auth { candidate, message })
            }
            DispatchOutcome::Exhausted { errors } => Err(DispatchFailure::Exhausted { errors }),
        }
    }
}

#[derive(Clone)]
pub struct ProviderDispatcher {
    client: Client,
    base_url: String,
    api_token: String,
    max_new_tokens: u32,
}

impl ProviderDispatcher {
    pub fn new(settings: &ProviderSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build provider HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone(),
            max_new_tokens: settings.max_new_tokens,
        })
    }

    fn endpoint(&self, candidate: &ProviderCandidate) -> String {
        match candidate.kind {
            CandidateKind::SingleInstruction => {
                format!("{}/models/{}", self.base_url, candidate.model)
            }
            CandidateKind::Conversation => format!(
                "{}/models/{}/v1/chat/completions",
                self.base_url, candidate.model
            ),
        }
    }

    /// Dispatches a free-text prompt. Any non-empty answer is accepted.
    pub async fn dispatch<S>(
        &self,
        source: &S,
        candidates: &[ProviderCandidate],
    ) -> DispatchOutcome<String>
    where
        S: PayloadSource + ?Sized,
    {
        self.dispatch_validated(source, candidates, |text| Ok(text.to_string()))
            .await
    }

    /// Dispatches a prompt whose answer must pass `validate`. A rejected
    /// answer counts as malformed output and moves on to the next candidate.
    pub async fn dispatch_validated<S, T, F>(
        &self,
        source: &S,
        candidates: &[ProviderCandidate],
        validate: F,
    ) -> DispatchOutcome<T>
    where
        S: PayloadSource + ?Sized,
        T: Send,
        F: Fn(&str) -> Result<T, String> + Send + Sync,
    {
        let mut errors = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            debug!(
                "Dispatch attempt {}/{}: {} ({:?})",
                index + 1,
                candidates.len(),
                candidate.model,
                candidate.kind
            );

            let payload = source.payload(candidate.kind);
            let result = self
                .attempt(candidate, payload)
                .await
                .and_then(|text| validate(&text).map_err(ProviderError::Malformed));

            match result {
                Ok(value) => {
                    info!("Candidate {} answered", candidate.model);
                    return DispatchOutcome::Success {
                        candidate: candidate.model.clone(),
                        value,
                    };
                }
                Err(e) if e.is_auth() => {
                    warn!(
                        "Candidate {} rejected the credential; skipping remaining candidates",
                        candidate.model
                    );
                    return DispatchOutcome::AuthFailure {
                        candidate: candidate.model.clone(),
                        message: e.to_string(),
                    };
                }
                Err(e) => {
                    warn!("Candidate {} failed: {}", candidate.model, e);
                    errors.push(AttemptError::new(candidate, &e));
                }
            }
        }

        warn!("All {} provider candidates failed", candidates.len());
        DispatchOutcome::Exhausted { errors }
    }

    /// One request against one candidate. No retries.
    async fn attempt(
        &self,
        candidate: &ProviderCandidate,
        payload: &PromptPayload,
    ) -> Result<String, ProviderError> {
        let request = self
            .client
            .post(self.endpoint(candidate))
            .bearer_auth(&self.api_token);

        let request = match payload {
            PromptPayload::Instruction(inputs) => request.json(&InstructionRequest {
                inputs,
                parameters: InstructionParameters {
                    max_new_tokens: self.max_new_tokens,
                    return_full_text: false,
                },
                options: InstructionOptions {
                    wait_for_model: candidate.wait_for_model,
                    use_cache: false,
                },
            }),
            PromptPayload::Conversation(messages) => request.json(&ChatRequest {
                model: &candidate.model,
                messages,
                max_tokens: self.max_new_tokens,
                stream: false,
            }),
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::UNAUTHORIZED => Err(ProviderError::Unauthorized {
                status: status.as_u16(),
                message: error_message(&body),
            }),
            StatusCode::SERVICE_UNAVAILABLE => Err(ProviderError::ModelLoading {
                message: error_message(&body),
            }),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited {
                message: error_message(&body),
            }),
            s if !s.is_success() => Err(ProviderError::Api {
                status: s.as_u16(),
                message: error_message(&body),
            }),
            _ => extract_text(candidate.kind, payload, &body),
        }
    }
}
