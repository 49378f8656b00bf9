//! Ordered fallback list of hosted models.
//!
//! Each candidate names one model and the request shape its endpoint expects.
//! The list is configuration: it is parsed once at startup and never mutated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request/response shape a candidate endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// `{"inputs": ...}` → `[{"generated_text": ...}]`, may echo the prompt.
    SingleInstruction,
    /// `{"messages": [...]}` → chat completion object.
    Conversation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCandidate {
    pub model: String,
    pub kind: CandidateKind,
    /// Ask the provider to hold the request while a cold model loads instead of
    /// answering 503 straight away.
    pub wait_for_model: bool,
}

impl ProviderCandidate {
    pub fn conversation(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            kind: CandidateKind::Conversation,
            wait_for_model: false,
        }
    }

    pub fn instruction(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            kind: CandidateKind::SingleInstruction,
            wait_for_model: false,
        }
    }

    pub fn waiting(mut self) -> Self {
        self.wait_for_model = true;
        self
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CandidateParseError {
    #[error("invalid provider candidate '{0}': expected 'chat:<model>' or 'instruct:<model>'")]
    Malformed(String),

    #[error("unknown candidate kind '{0}': expected 'chat' or 'instruct'")]
    UnknownKind(String),

    #[error("provider candidate list is empty")]
    Empty,
}

/// Fallback order used when `PROVIDER_CANDIDATES` is not set.
pub fn default_candidates() -> Vec<ProviderCandidate> {
    vec![
        ProviderCandidate::conversation("mistralai/Mistral-7B-Instruct-v0.3"),
        ProviderCandidate::conversation("HuggingFaceH4/zephyr-7b-beta"),
        ProviderCandidate::instruction("google/flan-t5-large").waiting(),
        ProviderCandidate::instruction("tiiuae/falcon-7b-instruct"),
    ]
}

/// Parses a comma-separated `kind:model` list. A trailing `!` on the model
/// enables `wait_for_model`, e.g. `chat:org/model-a,instruct:org/model-b!`.
pub fn parse_candidates(list: &str) -> Result<Vec<ProviderCandidate>, CandidateParseError> {
    let mut candidates = Vec::new();

    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (kind, model) = item
            .split_once(':')
            .ok_or_else(|| CandidateParseError::Malformed(item.to_string()))?;

        let (model, wait_for_model) = match model.trim().strip_suffix('!') {
            Some(stripped) => (stripped.trim(), true),
            None => (model.trim(), false),
        };
        if model.is_empty() {
            return Err(CandidateParseError::Malformed(item.to_string()));
        }

        let kind = match kind.trim().to_lowercase().as_str() {
            "chat" | "conversation" => CandidateKind::Conversation,
            "instruct" | "instruction" | "text" => CandidateKind::SingleInstruction,
            other => return Err(CandidateParseError::UnknownKind(other.to_string())),
        };

        candidates.push(ProviderCandidate {
            model: model.to_string(),
            kind,
            wait_for_model,
        });
    }

    if candidates.is_empty() {
        return Err(CandidateParseError::Empty);
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_order_and_kinds() {
        let parsed = parse_candidates("chat:org/a, instruct:org/b!,text:org/c").unwrap();
        assert_eq!(
            parsed,
            vec![
                ProviderCandidate::conversation("org/a"),
                ProviderCandidate::instruction("org/b").waiting(),
                ProviderCandidate::instruction("org/c"),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_missing_kind() {
        assert_eq!(
            parse_candidates("org/a"),
            Err(CandidateParseError::Malformed("org/a".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert_eq!(
            parse_candidates("vision:org/a"),
            Err(CandidateParseError::UnknownKind("vision".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_empty_list() {
        assert_eq!(parse_candidates(" , "), Err(CandidateParseError::Empty));
    }

    #[test]
    fn test_default_list_mixes_shapes() {
        let defaults = default_candidates();
        assert!(defaults.iter().any(|c| c.kind == CandidateKind::Conversation));
        assert!(defaults
            .iter()
            .any(|c| c.kind == CandidateKind::SingleInstruction));
    }
}
