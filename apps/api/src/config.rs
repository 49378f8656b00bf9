use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::analysis::relevance::FilterSettings;
use crate::analysis::summarizer::SummarySettings;
use crate::dataset::cache::MAX_TTL_SECS;
use crate::dataset::repository::is_valid_identifier;
use crate::dataset::DatasetSettings;
use crate::llm_client::candidates::{default_candidates, parse_candidates};
use crate::llm_client::{
    ProviderSettings, DEFAULT_BASE_URL, DEFAULT_MAX_NEW_TOKENS, DEFAULT_TIMEOUT_SECS,
};
use crate::notify::SmtpConfig;

/// Application configuration loaded from environment variables.
/// Built once at startup; a missing or invalid key aborts the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub provider: ProviderSettings,
    pub dataset: DatasetSettings,
    pub filter: FilterSettings,
    pub summary: SummarySettings,
    /// Present only when `SMTP_HOST` is set.
    pub smtp: Option<SmtpConfig>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);

        let candidates = match env.optional("PROVIDER_CANDIDATES") {
            Some(list) => parse_candidates(&list).context("Invalid PROVIDER_CANDIDATES")?,
            None => default_candidates(),
        };
        let provider = ProviderSettings {
            base_url: env
                .optional("PROVIDER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_token: env.require("HF_API_TOKEN")?,
            timeout: Duration::from_secs(env.parsed("PROVIDER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            max_new_tokens: env.parsed("PROVIDER_MAX_NEW_TOKENS", DEFAULT_MAX_NEW_TOKENS)?,
            candidates,
        };

        let mut dataset = DatasetSettings::default();
        if let Some(table) = env.optional("DATASET_TABLE") {
            dataset.table = table;
        }
        if let Some(column) = env.optional("DATASET_TIMESTAMP_COLUMN") {
            dataset.timestamp_column = column;
        }
        for (key, ident) in [
            ("DATASET_TABLE", &dataset.table),
            ("DATASET_TIMESTAMP_COLUMN", &dataset.timestamp_column),
        ] {
            if !is_valid_identifier(ident) {
                bail!("{key} must be a plain SQL identifier, got '{ident}'");
            }
        }
        dataset.default_recency_days = env
            .optional("DATASET_RECENCY_DAYS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("DATASET_RECENCY_DAYS must be a whole number of days")?;
        let ttl_secs = env.parsed("DATASET_CACHE_TTL_SECS", dataset.cache_ttl.as_secs())?;
        if ttl_secs > MAX_TTL_SECS {
            bail!("DATASET_CACHE_TTL_SECS must be at most {MAX_TTL_SECS}, got {ttl_secs}");
        }
        dataset.cache_ttl = Duration::from_secs(ttl_secs);

        let mut filter = FilterSettings::default();
        if let Some(terms) = env.list("FILTER_GENERAL_TERMS") {
            filter.general_terms = terms.into_iter().map(|t| t.to_lowercase()).collect();
        }
        filter.min_token_len = env.parsed("FILTER_MIN_TOKEN_LEN", filter.min_token_len)?;
        if let Some(fields) = env.list("FILTER_SCAN_FIELDS") {
            filter.scan_fields = fields;
        }
        filter.max_subset_records =
            env.parsed("FILTER_MAX_SUBSET_ROWS", filter.max_subset_records)?;
        filter.max_data_bytes = env.parsed("FILTER_MAX_DATA_BYTES", filter.max_data_bytes)?;

        let mut summary = SummarySettings {
            timestamp_field: dataset.timestamp_column.clone(),
            ..SummarySettings::default()
        };
        if let Some(fields) = env.list("SUMMARY_CATEGORICAL_FIELDS") {
            summary.categorical_fields = fields;
        }

        let smtp = match env.optional("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                username: env.require("SMTP_USERNAME")?,
                password: env.require("SMTP_PASSWORD")?,
                from: env.require("NOTIFY_FROM")?,
                to: env.require("NOTIFY_TO")?,
            }),
            None => None,
        };

        Ok(Config {
            database_url: env.require("DATABASE_URL")?,
            provider,
            dataset,
            filter,
            summary,
            smtp,
            port: env.parsed("PORT", 8080)?,
            rust_log: env.optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Unset and blank are treated the same.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.optional(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'")),
            None => Ok(default),
        }
    }

    /// Comma-separated list; `None` when unset.
    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.optional(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
