//! Time-bounded memo for dataset fetches.
//!
//! Entries are keyed by the query parameters plus the TTL-sized time bucket
//! they were fetched in, and carry an explicit `expires_at`. A hit requires
//! both the same bucket and an unexpired entry. Cached datasets are shared
//! read-only through `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::dataset::repository::DatasetQuery;
use crate::models::Dataset;

/// Longest accepted TTL; larger values are clamped to it.
pub const MAX_TTL_SECS: u64 = 365 * 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    query: DatasetQuery,
    bucket: i64,
}

#[derive(Debug)]
struct CacheEntry {
    dataset: Arc<Dataset>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DatasetCache {
    ttl_secs: i64,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl DatasetCache {
    /// A zero TTL disables caching: `get` always misses and `insert` stores nothing.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_secs: i64::try_from(ttl.as_secs().min(MAX_TTL_SECS)).unwrap_or(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_secs > 0
    }

    fn key(&self, query: &DatasetQuery, now: DateTime<Utc>) -> CacheKey {
        CacheKey {
            query: *query,
            bucket: now.timestamp().div_euclid(self.ttl_secs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, query: &DatasetQuery, now: DateTime<Utc>) -> Option<Arc<Dataset>> {
        if !self.is_enabled() {
            return None;
        }
        let key = self.key(query, now);
        self.lock()
            .get(&key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| Arc::clone(&entry.dataset))
    }

    /// Stores a freshly fetched dataset and drops every expired entry.
    pub fn insert(&self, query: &DatasetQuery, dataset: Dataset, now: DateTime<Utc>) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        if !self.is_enabled() {
            return dataset;
        }

        let key = self.key(query, now);
        let mut entries = self.lock();
        entries.retain(|k, entry| entry.expires_at > now && k.bucket >= key.bucket);
        entries.insert(
            key,
            CacheEntry {
                dataset: Arc::clone(&dataset),
                expires_at: now
                    .checked_add_signed(chrono::Duration::seconds(self.ttl_secs))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
        dataset
    }

    pub fn invalidate(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
