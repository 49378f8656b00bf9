// Prompt templates for the question-answering pipeline.
// The data-only policy from llm_client::prompts is appended to the role text at render time.

/// Role of the assistant when answering questions about manifestation data.
pub const ANSWER_ROLE: &str = "Você é um assistente de análise de dados de uma ouvidoria pública. \
    Você recebe registros de manifestações de cidadãos (reclamações, denúncias, sugestões, \
    elogios e colaborações) e responde perguntas sobre eles de forma objetiva, em português.";

/// Opening/closing markers around the data block in single-instruction prompts.
pub const DATA_START: &str = "### DADOS";
pub const DATA_END: &str = "### FIM DOS DADOS";
pub const QUESTION_MARKER: &str = "### PERGUNTA";
pub const ANSWER_MARKER: &str = "### RESPOSTA";

/// Single-instruction template.
/// Replace: {system}, {data_start}, {data}, {data_end}, {question_marker}, {question}, {answer_marker}
pub const INSTRUCTION_TEMPLATE: &str = "{system}

{data_start}
{data}
{data_end}

{question_marker}
{question}

{answer_marker}
";

/// User message for conversation-shaped prompts. Replace: {data}, {question}
pub const CONVERSATION_USER_TEMPLATE: &str = "Dados disponíveis:
{data}

Pergunta: {question}";
