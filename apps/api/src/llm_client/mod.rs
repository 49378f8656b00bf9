/// LLM client: the single point of entry for hosted model calls.
///
/// No other module talks to a provider endpoint directly. Features build a
/// `PayloadSource` and hand it to `ProviderDispatcher`, which walks the
/// configured fallback list.
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod candidates;
pub mod dispatcher;
pub mod prompts;

pub use candidates::{CandidateKind, ProviderCandidate};
pub use dispatcher::{
    AttemptError, DispatchFailure, DispatchOutcome, FailureKind, ProviderDispatcher,
};

pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("credential rejected (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("model is loading: {message}")]
    ModelLoading { message: String },

    #[error("rate limited: {message}")]
    RateLimited { message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed model output: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// A rejected credential fails identically against every candidate.
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Unauthorized { .. })
    }
}

/// Connection settings shared by every candidate.
#[derive(Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_token: String,
    pub timeout: Duration,
    pub max_new_tokens: u32,
    pub candidates: Vec<ProviderCandidate>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("max_new_tokens", &self.max_new_tokens)
            .field("candidates", &self.candidates)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Rendered request content, in the shape one candidate kind expects.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPayload {
    Instruction(String),
    Conversation(Vec<ChatMessage>),
}

/// Anything that can render its prompt in either request shape on demand.
pub trait PayloadSource: Sync {
    fn payload(&self, kind: CandidateKind) -> &PromptPayload;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InstructionRequest<'a> {
    inputs: &'a str,
    parameters: InstructionParameters,
    options: InstructionOptions,
}

#[derive(Debug, Serialize)]
struct InstructionParameters {
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct InstructionOptions {
    wait_for_model: bool,
    use_cache: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeneratedOutput {
    Many(Vec<Generated>),
    One(Generated),
}

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Pulls the answer text out of a 2xx response body.
///
/// Conversation candidates return a chat completion object. Instruction
/// candidates return `[{"generated_text": ...}]`, which may start with the
/// prompt itself; the echoed prefix is removed.
pub fn extract_text(
    kind: CandidateKind,
    payload: &PromptPayload,
    body: &str,
) -> Result<String, ProviderError> {
    let text = match kind {
        CandidateKind::Conversation => {
            let completion: ChatCompletion = serde_json::from_str(body)
                .map_err(|e| ProviderError::Malformed(format!("invalid chat completion: {e}")))?;
            completion
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| ProviderError::Malformed("completion has no choices".to_string()))?
        }
        CandidateKind::SingleInstruction => {
            let output: GeneratedOutput = serde_json::from_str(body)
                .map_err(|e| ProviderError::Malformed(format!("invalid generation: {e}")))?;
            let generated = match output {
                GeneratedOutput::Many(items) => items
                    .into_iter()
                    .next()
                    .map(|g| g.generated_text)
                    .ok_or_else(|| {
                        ProviderError::Malformed("generation list is empty".to_string())
                    })?,
                GeneratedOutput::One(g) => g.generated_text,
            };
            match payload {
                PromptPayload::Instruction(prompt) => generated
                    .strip_prefix(prompt.as_str())
                    .map(str::to_string)
                    .unwrap_or(generated),
                PromptPayload::Conversation(_) => generated,
            }
        }
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ProviderError::Malformed("model returned empty text".to_string()));
    }
    Ok(text.to_string())
}

/// Reads a human message out of a provider error body. Handles
/// `{"error": "..."}`, `{"error": {"message": "..."}}` and plain text.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| match e {
            serde_json::Value::String(s) => Some(s.clone()),
            other => other
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
        })
        .unwrap_or_else(|| body.trim().to_string())
}
