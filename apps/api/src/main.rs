mod analysis;
mod classification;
mod config;
mod dataset;
mod db;
mod errors;
mod llm_client;
mod models;
mod notify;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::dataset::DatasetCache;
use crate::db::create_pool;
use crate::llm_client::ProviderDispatcher;
use crate::notify::{Notifier, SmtpNotifier};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (aborts on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ouvidoria API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize provider dispatcher
    let dispatcher = ProviderDispatcher::new(&config.provider)?;
    info!(
        "Provider dispatcher initialized: {} candidates at {}",
        config.provider.candidates.len(),
        config.provider.base_url
    );
    for (index, candidate) in config.provider.candidates.iter().enumerate() {
        info!(
            "  {}. {} ({:?}{})",
            index + 1,
            candidate.model,
            candidate.kind,
            if candidate.wait_for_model { ", waits for model" } else { "" }
        );
    }

    // Initialize email notifier (optional)
    let notifier: Option<Arc<dyn Notifier>> = match &config.smtp {
        Some(smtp) => {
            let notifier = SmtpNotifier::new(smtp).context("Invalid SMTP configuration")?;
            info!("Email notifications enabled via {}", smtp.host);
            Some(Arc::new(notifier) as Arc<dyn Notifier>)
        }
        None => {
            info!("Email notifications disabled (SMTP_HOST not set)");
            None
        }
    };

    // Dataset snapshot cache
    let dataset_cache = Arc::new(DatasetCache::new(config.dataset.cache_ttl));
    info!(
        "Dataset source: {} (cache ttl {}s)",
        config.dataset.table,
        config.dataset.cache_ttl.as_secs()
    );

    // Build app state
    let state = AppState {
        db,
        dispatcher,
        config: config.clone(),
        dataset_cache,
        notifier,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the form's origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
