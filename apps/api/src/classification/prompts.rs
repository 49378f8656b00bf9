// Prompt text for manifestation classification.

pub const CLASSIFY_ROLE: &str = "Você é um analista de ouvidoria pública que classifica \
    manifestações de cidadãos quanto à espécie e à natureza do problema relatado.";

/// Instruction sent in place of a question. The manifestation text travels as the data block.
pub const CLASSIFY_INSTRUCTION: &str = r#"Classifique a manifestação acima e responda com um objeto JSON exatamente neste formato:
{
  "especie_sugerida": "RECLAMAÇÃO",
  "natureza_sugerida": "ATENDIMENTO_RUIM",
  "confianca": "média",
  "justificativa": "Frase curta explicando a classificação com base no texto.",
  "elementos_identificados": ["demora_prazo", "insatisfação"]
}

Valores permitidos:
- especie_sugerida: RECLAMAÇÃO, DENÚNCIA, SUGESTÃO, ELOGIO, SOLICITAÇÃO ou INFORMAÇÃO
- confianca: alta, média ou baixa
- natureza_sugerida: rótulo curto em MAIÚSCULAS com sublinhados
- elementos_identificados: trechos ou conceitos do texto que sustentam a classificação"#;
