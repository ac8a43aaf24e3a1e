mod cli;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;
use cli::{Cli, Commands};
use news_aggregator::{
    AggregatorConfig, EnrichmentGateway, GeminiAdapter, NewGalleryPost, NewsAggregator, PgSharedStore, SharedStore,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => AggregatorConfig::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let mut config = AggregatorConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    match cli.command {
        Commands::InitDb => {
            let store = connect_store(&config).await?.context("DATABASE_URL is not set")?;
            store.setup_schema().await?;
            info!("Schema initialized");
        }
        Commands::GalleryAdd {
            title,
            description,
            media_url,
        } => {
            ensure_non_empty(&title, "--title")?;
            ensure_non_empty(&media_url, "--media-url")?;
            let store = connect_store(&config).await?.context("DATABASE_URL is not set")?;
            let created = store
                .insert_gallery_post(&NewGalleryPost {
                    title,
                    description,
                    media_url,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Commands::Fetch { category } => {
            let shared = shared_or_none(&config).await;
            let aggregator = NewsAggregator::new(config, shared)?;
            let items = aggregator.fetch_category(category).await;
            println!("{}", serde_json::to_string_pretty(&items)?);
            aggregator.flush_background().await;
        }
        Commands::Enhance { id, title, description } => {
            let shared = shared_or_none(&config).await;
            let aggregator = NewsAggregator::new(config.clone(), shared.clone())?;
            let gateway = build_gateway(&config, &aggregator, shared);
            let payload = gateway.enhance(&id, &title, &description).await;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            aggregator.flush_background().await;
        }
        Commands::Audio { text, output } => {
            let shared = shared_or_none(&config).await;
            let aggregator = NewsAggregator::new(config.clone(), shared.clone())?;
            let gateway = build_gateway(&config, &aggregator, shared);
            let audio = gateway.synthesize_audio(&text).await?;
            match output {
                Some(path) => {
                    let bytes = STANDARD.decode(audio.as_bytes()).context("decoding audio")?;
                    tokio::fs::write(&path, bytes).await?;
                    info!("Wrote audio to {}", path.display());
                }
                None => println!("{}", audio),
            }
            aggregator.flush_background().await;
        }
    }

    Ok(())
}

async fn connect_store(config: &AggregatorConfig) -> anyhow::Result<Option<PgSharedStore>> {
    match &config.database_url {
        Some(url) => Ok(Some(PgSharedStore::connect(url).await?)),
        None => Ok(None),
    }
}

/// The pipeline runs without the shared tier when it cannot be reached.
async fn shared_or_none(config: &AggregatorConfig) -> Option<Arc<dyn SharedStore>> {
    match connect_store(config).await {
        Ok(Some(store)) => Some(Arc::new(store)),
        Ok(None) => None,
        Err(e) => {
            warn!("Shared store unavailable, continuing without it: {}", e);
            None
        }
    }
}

fn build_gateway(
    config: &AggregatorConfig,
    aggregator: &NewsAggregator,
    shared: Option<Arc<dyn SharedStore>>,
) -> EnrichmentGateway {
    let mut gateway = EnrichmentGateway::new(aggregator.background(), &config.gemini.voice);
    if let Some(store) = shared {
        gateway = gateway.with_shared_store(store);
    }
    match GeminiAdapter::new(config.gemini.clone()) {
        Ok(adapter) => {
            let adapter = Arc::new(adapter);
            gateway.with_generation(adapter.clone()).with_speech(adapter)
        }
        Err(e) => {
            warn!("AI capabilities disabled: {}", e);
            gateway
        }
    }
}

fn ensure_non_empty(value: &str, what: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        bail!("{} must not be empty", what);
    }
    Ok(())
}
