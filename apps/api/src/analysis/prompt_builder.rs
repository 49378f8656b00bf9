//! Prompt Builder: turns a question plus its context into a model payload.
//!
//! The context block (CSV rows or a digest) is serialized once per request.
//! Each payload shape is rendered lazily and at most once, so a dispatch that
//! falls back across candidate kinds never rebuilds the prompt.

use std::sync::OnceLock;

use crate::analysis::prompts::{
    ANSWER_MARKER, ANSWER_ROLE, CONVERSATION_USER_TEMPLATE, DATA_END, DATA_START,
    INSTRUCTION_TEMPLATE, QUESTION_MARKER,
};
use crate::llm_client::prompts::DATA_ONLY_POLICY;
use crate::llm_client::{CandidateKind, ChatMessage, PayloadSource, PromptPayload};
use crate::models::Record;

/// What the model gets to see alongside the question.
#[derive(Debug, Clone)]
pub enum PromptContext {
    Subset(Vec<Record>),
    Digest(String),
}

pub struct PromptSource {
    system: String,
    data: String,
    question: String,
    instruction: OnceLock<PromptPayload>,
    conversation: OnceLock<PromptPayload>,
}

impl PromptSource {
    /// Question-answering prompt over dataset rows or a digest.
    pub fn new(question: &str, context: &PromptContext) -> Result<Self, csv::Error> {
        let data = match context {
            PromptContext::Subset(records) => to_csv(records)?,
            PromptContext::Digest(digest) => digest.clone(),
        };
        Ok(Self::with_role(ANSWER_ROLE, data, question))
    }

    /// Prompt with a custom assistant role. The data-only policy is always appended.
    pub fn with_role(role: &str, data: String, question: &str) -> Self {
        Self {
            system: format!("{role}\n\n{DATA_ONLY_POLICY}"),
            data,
            question: question.trim().to_string(),
            instruction: OnceLock::new(),
            conversation: OnceLock::new(),
        }
    }

    pub fn data_block(&self) -> &str {
        &self.data
    }

    pub fn render(&self, kind: CandidateKind) -> &PromptPayload {
        match kind {
            CandidateKind::SingleInstruction => self.instruction.get_or_init(|| {
                PromptPayload::Instruction(fill(
                    INSTRUCTION_TEMPLATE,
                    &[
                        ("system", self.system.as_str()),
                        ("data_start", DATA_START),
                        ("data", self.data.as_str()),
                        ("data_end", DATA_END),
                        ("question_marker", QUESTION_MARKER),
                        ("question", self.question.as_str()),
                        ("answer_marker", ANSWER_MARKER),
                    ],
                ))
            }),
            CandidateKind::Conversation => self.conversation.get_or_init(|| {
                PromptPayload::Conversation(vec![
                    ChatMessage::system(self.system.clone()),
                    ChatMessage::user(fill(
                        CONVERSATION_USER_TEMPLATE,
                        &[("data", self.data.as_str()), ("question", self.question.as_str())],
                    )),
                ])
            }),
        }
    }
}

impl PayloadSource for PromptSource {
    fn payload(&self, kind: CandidateKind) -> &PromptPayload {
        self.render(kind)
    }
}

/// Single-pass `{key}` substitution. Substituted values are never rescanned,
/// so braces inside user text or data stay literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replacement = after.find('}').and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, end))
        });
        match replacement {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Serializes records as CSV. Columns are the union of field names in
/// first-seen order; absent fields render as empty cells.
pub fn to_csv(records: &[Record]) -> Result<String, csv::Error> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
    }
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|column| {
            record
                .get(column)
                .map(|value| value.to_string())
                .unwrap_or_default()
        }))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_end_matches('\n').to_string())
}
