use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::dataset::DatasetCache;
use crate::llm_client::ProviderDispatcher;
use crate::notify::Notifier;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub dispatcher: ProviderDispatcher,
    pub config: Config,
    /// Dataset snapshots shared across requests, keyed by query and time bucket.
    pub dataset_cache: Arc<DatasetCache>,
    /// `None` unless SMTP is configured; requests asking to notify are then refused.
    pub notifier: Option<Arc<dyn Notifier>>,
}
