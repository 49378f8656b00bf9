//! Manifestation classification: species, nature and confidence for one
//! free-text citizen report, produced by the hosted model as JSON.
//!
//! The answer must parse into `ManifestationClassification`; anything else is
//! treated as malformed output and the dispatcher moves to the next candidate.

pub mod handlers;
pub mod prompts;

use serde::{Deserialize, Serialize};

use crate::analysis::prompt_builder::PromptSource;
use crate::classification::prompts::{CLASSIFY_INSTRUCTION, CLASSIFY_ROLE};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{DispatchOutcome, ProviderCandidate, ProviderDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Especie {
    #[serde(rename = "RECLAMAÇÃO", alias = "RECLAMACAO")]
    Reclamacao,
    #[serde(rename = "DENÚNCIA", alias = "DENUNCIA")]
    Denuncia,
    #[serde(rename = "SUGESTÃO", alias = "SUGESTAO")]
    Sugestao,
    #[serde(rename = "ELOGIO")]
    Elogio,
    #[serde(rename = "SOLICITAÇÃO", alias = "SOLICITACAO")]
    Solicitacao,
    #[serde(rename = "INFORMAÇÃO", alias = "INFORMACAO")]
    Informacao,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confianca {
    #[serde(rename = "alta")]
    Alta,
    #[serde(rename = "média", alias = "media")]
    Media,
    #[serde(rename = "baixa")]
    Baixa,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestationClassification {
    pub especie_sugerida: Especie,
    pub natureza_sugerida: String,
    pub confianca: Confianca,
    pub justificativa: String,
    #[serde(default)]
    pub elementos_identificados: Vec<String>,
}

/// The JSON object in a model answer: the body of the first code fence, else
/// the outermost braces, else the whole trimmed text.
fn json_block(text: &str) -> &str {
    let text = text.trim();
    if let Some((_, after)) = text.split_once("```") {
        let body = after.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        let body = body.split_once("```").map_or(body, |(inside, _)| inside);
        return body.trim();
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Validator handed to the dispatcher. Accepts fenced JSON or JSON wrapped in prose.
pub fn parse_classification(text: &str) -> Result<ManifestationClassification, String> {
    let parsed: ManifestationClassification = serde_json::from_str(json_block(text))
        .map_err(|e| format!("classification is not valid JSON of the expected shape: {e}"))?;

    if parsed.natureza_sugerida.trim().is_empty() {
        return Err("classification has an empty natureza_sugerida".to_string());
    }
    if parsed.justificativa.trim().is_empty() {
        return Err("classification has an empty justificativa".to_string());
    }
    Ok(parsed)
}

pub fn build_source(text: &str) -> PromptSource {
    PromptSource::with_role(
        &format!("{CLASSIFY_ROLE}\n\n{JSON_ONLY_SYSTEM}"),
        text.trim().to_string(),
        CLASSIFY_INSTRUCTION,
    )
}

pub async fn classify(
    dispatcher: &ProviderDispatcher,
    candidates: &[ProviderCandidate],
    text: &str,
) -> DispatchOutcome<ManifestationClassification> {
    let source = build_source(text);
    dispatcher
        .dispatch_validated(&source, candidates, parse_classification)
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::llm_client::{CandidateKind, PayloadSource, PromptPayload, ProviderSettings};

    const VALID: &str = r#"{
        "especie_sugerida": "RECLAMAÇÃO",
        "natureza_sugerida": "ATENDIMENTO_RUIM",
        "confianca": "média",
        "justificativa": "Texto indica insatisfação com a demora.",
        "elementos_identificados": ["demora_prazo", "insatisfação"]
    }"#;

    #[test]
    fn test_parses_valid_classification() {
        let parsed = parse_classification(VALID).unwrap();
        assert_eq!(parsed.especie_sugerida, Especie::Reclamacao);
        assert_eq!(parsed.confianca, Confianca::Media);
        assert_eq!(parsed.elementos_identificados.len(), 2);
    }

    #[test]
    fn test_accepts_fenced_and_unaccented_values() {
        let fenced = "```json\n{\"especie_sugerida\":\"DENUNCIA\",\"natureza_sugerida\":\"OBRA_IRREGULAR\",\"confianca\":\"alta\",\"justificativa\":\"Relata obra sem licença.\"}\n```";
        let parsed = parse_classification(fenced).unwrap();
        assert_eq!(parsed.especie_sugerida, Especie::Denuncia);
        assert!(parsed.elementos_identificados.is_empty());
    }

    #[test]
    fn test_json_block_finds_object_in_answer() {
        assert_eq!(json_block("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(json_block("```\n{\"a\":1}\n```\nEspero ter ajudado."), "{\"a\":1}");
        assert_eq!(
            json_block("Classificação sugerida: {\"a\":{\"b\":2}} conforme o relato."),
            "{\"a\":{\"b\":2}}"
        );
        assert_eq!(json_block("  sem objeto  "), "sem objeto");
    }

    #[test]
    fn test_accepts_classification_wrapped_in_prose() {
        let answer = format!("Segue a classificação:\n{VALID}\nQualquer dúvida, estou à disposição.");
        let parsed = parse_classification(&answer).unwrap();
        assert_eq!(parsed.especie_sugerida, Especie::Reclamacao);
    }

    #[test]
    fn test_rejects_unknown_species() {
        let text = VALID.replace("RECLAMAÇÃO", "PEDIDO");
        assert!(parse_classification(&text).is_err());
    }

    #[test]
    fn test_rejects_prose() {
        assert!(parse_classification("É uma reclamação.").is_err());
    }

    #[test]
    fn test_source_keeps_text_as_data_and_json_policy() {
        let source = build_source("  Esperei 3 horas no posto de saúde. ");
        let PromptPayload::Conversation(messages) = source.payload(CandidateKind::Conversation)
        else {
            panic!("expected conversation payload");
        };
        assert!(messages[0].content.contains("objeto JSON"));
        assert!(messages[0].content.contains("NUNCA invente"));
        assert!(messages[1]
            .content
            .contains("Esperei 3 horas no posto de saúde."));
    }

    #[tokio::test]
    async fn test_malformed_answer_falls_through_to_next_candidate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/org/a/v1/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "Acho que é uma reclamação." } }]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/org/b/v1/chat/completions");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": VALID } }]
                }));
            })
            .await;

        let dispatcher = ProviderDispatcher::new(&ProviderSettings {
            base_url: server.base_url(),
            api_token: "hf_test".to_string(),
            timeout: Duration::from_secs(5),
            max_new_tokens: 256,
            candidates: vec![],
        })
        .unwrap();
        let candidates = vec![
            ProviderCandidate::conversation("org/a"),
            ProviderCandidate::conversation("org/b"),
        ];

        let outcome = classify(&dispatcher, &candidates, "Demora no atendimento").await;
        let (candidate, classification) = outcome.into_result().unwrap();
        assert_eq!(candidate, "org/b");
        assert_eq!(classification.natureza_sugerida, "ATENDIMENTO_RUIM");
    }
}
