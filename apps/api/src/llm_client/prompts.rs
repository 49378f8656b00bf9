// Shared prompt fragments.
// Each feature that calls the dispatcher defines its own prompts.rs alongside it;
// this file holds the policy text every system instruction must carry.

/// Policy appended to every system instruction. Never optional.
pub const DATA_ONLY_POLICY: &str = "\
    REGRAS OBRIGATÓRIAS: Responda somente com base nos dados fornecidos. \
    Se os dados não contêm a resposta, diga claramente que a informação não está disponível. \
    NUNCA invente registros, números, nomes ou datas que não estejam nos dados. \
    NUNCA produza código executável, scripts ou consultas SQL.";

/// System fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "\
    Você DEVE responder apenas com um objeto JSON válido. \
    Não inclua texto fora do objeto JSON. \
    Não use blocos de código markdown. \
    Não inclua explicações nem desculpas.";
