//! Question pipeline: dataset → relevance filter → (subset | digest) →
//! prompt → provider dispatch → result sink.
//!
//! Each request runs the stages sequentially. A data-store failure halts the
//! pipeline before any prompt is built.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::prompt_builder::{PromptContext, PromptSource};
use crate::analysis::relevance::{self, FilterSettings};
use crate::analysis::summarizer::{self, SummarySettings};
use crate::dataset::{load_dataset, DatasetQuery};
use crate::errors::AppError;
use crate::llm_client::{DispatchOutcome, ProviderCandidate, ProviderDispatcher};
use crate::models::Dataset;
use crate::notify::{deliver, Notification, NotificationStatus};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Restricts the dataset to the last N days. Falls back to the configured default.
    #[serde(default)]
    pub recency_days: Option<u32>,
    #[serde(default)]
    pub notify: bool,
}

/// Which kind of context the model was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    Subset,
    Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub request_id: Uuid,
    pub answer: String,
    pub provider: String,
    pub context_mode: ContextMode,
    pub records_used: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationStatus>,
}

/// A prompt ready for dispatch, plus what went into it.
pub struct PreparedPrompt {
    pub source: PromptSource,
    pub context_mode: ContextMode,
    pub records_used: usize,
}

pub struct PipelineRun {
    pub outcome: DispatchOutcome<String>,
    pub context_mode: ContextMode,
    pub records_used: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Chooses between a narrowed subset and a digest, then builds the prompt.
/// A subset whose CSV exceeds `max_data_bytes` is replaced by the digest.
pub fn prepare_prompt(
    dataset: &Dataset,
    question: &str,
    filter: &FilterSettings,
    summary: &SummarySettings,
) -> Result<PreparedPrompt, AppError> {
    if let Some(subset) = relevance::filter(dataset, question, filter) {
        let records_used = subset.len();
        let source = PromptSource::new(question, &PromptContext::Subset(subset))
            .map_err(|e| AppError::Internal(e.into()))?;

        if source.data_block().len() <= filter.max_data_bytes {
            return Ok(PreparedPrompt {
                source,
                context_mode: ContextMode::Subset,
                records_used,
            });
        }
        debug!(
            "Subset of {records_used} records is {} bytes, over {}; using digest",
            source.data_block().len(),
            filter.max_data_bytes
        );
    }

    let digest = summarizer::summarize(dataset, summary);
    let source = PromptSource::new(question, &PromptContext::Digest(digest))
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(PreparedPrompt {
        source,
        context_mode: ContextMode::Summary,
        records_used: dataset.len(),
    })
}

/// Runs filter, prompt building and dispatch over an already-loaded dataset.
pub async fn run_pipeline(
    dataset: &Dataset,
    question: &str,
    dispatcher: &ProviderDispatcher,
    candidates: &[ProviderCandidate],
    filter: &FilterSettings,
    summary: &SummarySettings,
) -> Result<PipelineRun, AppError> {
    let prepared = prepare_prompt(dataset, question, filter, summary)?;
    info!(
        "Prompt context: {:?} over {} of {} records ({} bytes)",
        prepared.context_mode,
        prepared.records_used,
        dataset.len(),
        prepared.source.data_block().len()
    );

    let outcome = dispatcher.dispatch(&prepared.source, candidates).await;

    Ok(PipelineRun {
        outcome,
        context_mode: prepared.context_mode,
        records_used: prepared.records_used,
    })
}

/// Full request flow: load the dataset, run the pipeline, optionally notify.
///
/// The email (when requested) is sent whatever the dispatch outcome, and its
/// delivery status is returned on both the success and the error body.
pub async fn answer_question(state: &AppState, request: AskRequest) -> Result<AskResponse, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }

    let notifier = match (request.notify, &state.notifier) {
        (false, _) => None,
        (true, Some(notifier)) => Some(notifier.clone()),
        (true, None) => {
            return Err(AppError::Configuration(
                "email notification requested but SMTP_HOST is not set".to_string(),
            ))
        }
    };

    let request_id = Uuid::new_v4();
    let query = DatasetQuery {
        recency_days: request
            .recency_days
            .or(state.config.dataset.default_recency_days),
    };

    // Step 1: Load dataset (cached per query)
    let dataset = load_dataset(&state.db, &state.dataset_cache, &state.config.dataset, query).await?;
    info!(
        "Request {request_id}: dataset has {} records (recency {:?})",
        dataset.len(),
        query.recency_days
    );

    // Step 2-4: Filter or summarize, build prompt, dispatch
    let run = run_pipeline(
        &dataset,
        question,
        &state.dispatcher,
        &state.config.provider.candidates,
        &state.config.filter,
        &state.config.summary,
    )
    .await?;

    // Step 5: Result sink
    let notification = match notifier {
        Some(notifier) => {
            let message = Notification::for_dispatch(request_id, question, &run.outcome);
            Some(deliver(notifier.as_ref(), &message).await)
        }
        None => None,
    };

    let (provider, answer) = match run.outcome.into_result() {
        Ok(answered) => answered,
        Err(failure) => {
            warn!("Request {request_id}: dispatch failed: {failure}");
            return Err(AppError::from(failure).with_notification(notification));
        }
    };
    info!("Request {request_id}: answered by {provider}");

    Ok(AskResponse {
        request_id,
        answer,
        provider,
        context_mode: run.context_mode,
        records_used: run.records_used,
        notification,
    })
}
