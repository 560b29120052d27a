mod auth;
mod rest;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use companionwire_archive::sources::sources_from_env;
use companionwire_archive::ConnectorRegistry;
use companionwire_common::Config;
use companionwire_engine::{Clusterer, Normalizer, Pipeline, Ranker};
use companionwire_store::credibility::CredibilityCache;
use companionwire_store::Store;

pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub pipeline: Pipeline,
    pub ingest_lock: tokio::sync::Mutex<()>,
}

#[derive(Parser)]
#[command(about = "companionwire: AI-companion news cluster backend")]
struct Cli {
    /// Run a single ingest cycle and exit instead of serving HTTP.
    #[arg(long)]
    ingest: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("companionwire=info".parse()?),
        )
        .init();

    info!("companionwire starting...");

    // Load .env from the workspace root (doesn't override existing env vars)
    dotenv_load();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let store = Store::connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    store.migrate().await.context("Migrations failed")?;

    let pipeline = build_pipeline(&config, store.clone());

    if cli.ingest {
        let report = pipeline.run_cycle().await?;
        info!(
            run = %report.run_id,
            status = report.status.as_str(),
            fetched = report.signals_fetched,
            accepted = report.signals_accepted,
            "single ingest cycle finished"
        );
        return Ok(());
    }

    let state = Arc::new(AppState {
        store,
        config: config.clone(),
        pipeline,
        ingest_lock: tokio::sync::Mutex::new(()),
    });

    let app = Router::new()
        .route("/healthz", get(rest::healthz))
        .route("/clusters", get(rest::clusters::list_clusters))
        .route("/platforms", get(rest::platforms::list_platforms))
        .route(
            "/ingest",
            get(rest::ingest::recent_runs).post(rest::ingest::trigger_ingest),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(addr = addr.as_str(), "listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_pipeline(config: &Config, store: Store) -> Pipeline {
    let api_key = match config.llm_provider.as_str() {
        "anthropic" | "claude" => config.anthropic_api_key.as_str(),
        _ => config.openai_api_key.as_str(),
    };
    let chat = ai_client::build_chat_client(&config.llm_provider, api_key, config.llm_model.as_deref());
    let normalizer = Arc::new(Normalizer::new(chat, config.min_confidence_threshold));

    let clusterer = Clusterer::new(
        store.clone(),
        config.cluster_similarity_threshold,
        config.cluster_trgm_threshold,
        config.cluster_active_days,
    );
    let credibility = Arc::new(CredibilityCache::new(store.pool().clone()));
    let ranker = Ranker::new(
        store.clone(),
        credibility,
        config.ranking_max_domains,
        config.ranking_recency_decay_hours,
    );

    Pipeline::new(
        store,
        ConnectorRegistry::default(),
        normalizer,
        clusterer,
        ranker,
        sources_from_env(),
        config.max_items,
        config.timeout_ms,
        config.llm_concurrency,
    )
}

fn dotenv_load() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.join(".env"));
    let Some(path) = path else { return };
    if let Ok(content) = std::fs::read_to_string(&path) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if std::env::var(key.trim()).is_err() {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}
