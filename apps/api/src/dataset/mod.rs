// Data-store access: the read-only collection query plus its TTL memo.

pub mod cache;
pub mod repository;

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;

use crate::models::Dataset;
pub use cache::DatasetCache;
pub use repository::{DatasetQuery, DatasetSettings};

/// Returns the cached snapshot for `query` if it is still fresh, otherwise
/// fetches a new one and caches it.
pub async fn load_dataset(
    pool: &PgPool,
    cache: &DatasetCache,
    settings: &DatasetSettings,
    query: DatasetQuery,
) -> Result<Arc<Dataset>, sqlx::Error> {
    let now = Utc::now();
    if let Some(hit) = cache.get(&query, now) {
        debug!(
            "Dataset cache hit ({} records, fetched at {})",
            hit.len(),
            hit.fetched_at
        );
        return Ok(hit);
    }

    let dataset = repository::fetch_dataset(pool, settings, &query).await?;
    Ok(cache.insert(&query, dataset, now))
}
