use anyhow::{Context, Result};
use channel_ingestion::{ArchiveDatabase, BotApi, ChannelIngester, IngestionConfig, Update};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = IngestionConfig::from_env()?;

    let database = ArchiveDatabase::new(&config.database_url).await?;
    database.setup_schema().await?;

    let api = BotApi::new(&config.api_base, &config.bot_token, config.retry)?;
    let ingester = ChannelIngester::new(api, Arc::new(database));

    // A single update JSON file may be handed in instead of long-polling.
    if let Some(path) = std::env::args().nth(1) {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading update from {}", path))?;
        let update: Update = serde_json::from_str(&raw).context("parsing update JSON")?;
        match ingester.handle_update(&update).await? {
            Some(record) => info!("Archived post {}/{}", record.chat_id, record.message_id),
            None => info!("Update {} has no channel post", update.update_id),
        }
        return Ok(());
    }

    info!("Long-polling {} for channel posts", config.api_base);
    ingester.run(config.poll_timeout_secs).await;
    Ok(())
}
