use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use interfaces::{ArchiveMediaType, ArchiveSink, ChannelPostRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bot API returned {status}: {description}")]
    Api { status: u16, description: String },

    #[error("File {0} has no download path")]
    MissingFilePath(String),

    #[error("Archive error: {0}")]
    Archive(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestionError {
    /// Transport failures and server-side errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            IngestionError::Http(_) => true,
            IngestionError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub bot_token: String,
    pub database_url: String,
    pub api_base: String,
    pub poll_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl IngestionConfig {
    /// Reads `BOT_TOKEN`, `DATABASE_URL` and the optional `TELEGRAM_API_BASE`.
    pub fn from_env() -> Result<Self, IngestionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, IngestionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| IngestionError::Config(format!("{} is not set", key)))
        };

        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            database_url: required("DATABASE_URL")?,
            api_base: lookup("TELEGRAM_API_BASE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            poll_timeout_secs: 30,
            retry: RetryPolicy::default(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            max_interval: self.initial_delay * 32,
            multiplier: 2.0,
            max_elapsed_time: Some(self.initial_delay * 60),
            ..Default::default()
        }
    }
}

// Bot API payloads. Only the fields the archive needs are modelled.

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub channel_post: Option<Message>,
    #[serde(default)]
    pub edited_channel_post: Option<Message>,
}

impl Update {
    pub fn post(&self) -> Option<&Message> {
        self.channel_post.as_ref().or(self.edited_channel_post.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    #[serde(default)]
    pub video: Option<FileRef>,
    #[serde(default)]
    pub animation: Option<FileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_id: String,
    #[serde(default)]
    file_path: Option<String>,
}

impl Message {
    pub fn body(&self) -> String {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    /// Largest photo by area, else the video, else the animation.
    pub fn media(&self) -> Option<(&str, ArchiveMediaType)> {
        if let Some(photo) = self
            .photo
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        {
            return Some((photo.file_id.as_str(), ArchiveMediaType::Photo));
        }
        if let Some(video) = &self.video {
            return Some((video.file_id.as_str(), ArchiveMediaType::Video));
        }
        self.animation
            .as_ref()
            .map(|a| (a.file_id.as_str(), ArchiveMediaType::Animation))
    }
}

/// Minimal Bot API client: `getUpdates` and `getFile`.
#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    api_base: String,
    token: String,
    retry: RetryPolicy,
}

impl BotApi {
    pub fn new(api_base: &str, token: &str, retry: RetryPolicy) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, IngestionError> {
        let response = self.client.get(self.method_url(method)).query(query).send().await?;
        let status = response.status().as_u16();
        let envelope: ApiEnvelope<T> = response.json().await?;

        match envelope {
            ApiEnvelope {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiEnvelope { description, .. } => Err(IngestionError::Api {
                status,
                description: description.unwrap_or_else(|| "no result".to_string()),
            }),
        }
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, IngestionError> {
        let mut query = vec![
            ("timeout", timeout_secs.to_string()),
            (
                "allowed_updates",
                r#"["channel_post","edited_channel_post"]"#.to_string(),
            ),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        self.call("getUpdates", &query).await
    }

    /// Resolves a `file_id` to a direct download URL, retrying transient failures.
    pub async fn file_url(&self, file_id: &str) -> Result<String, IngestionError> {
        let mut backoff = self.retry.backoff();
        let mut attempt = 0;

        loop {
            match self.resolve_file(file_id).await {
                Ok(url) => return Ok(url),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    match backoff.next_backoff() {
                        Some(delay) => {
                            warn!("getFile attempt {} failed for {}: {}, retrying in {:?}", attempt, file_id, e, delay);
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn resolve_file(&self, file_id: &str) -> Result<String, IngestionError> {
        let file: TelegramFile = self
            .call("getFile", &[("file_id", file_id.to_string())])
            .await?;
        let path = file
            .file_path
            .ok_or_else(|| IngestionError::MissingFilePath(file.file_id.clone()))?;
        Ok(format!("{}/file/bot{}/{}", self.api_base, self.token, path))
    }
}

/// Turns channel-post updates into archive rows.
pub struct ChannelIngester {
    api: BotApi,
    sink: Arc<dyn ArchiveSink>,
}

impl ChannelIngester {
    pub fn new(api: BotApi, sink: Arc<dyn ArchiveSink>) -> Self {
        Self { api, sink }
    }

    /// Archives the post carried by `update`, if any.
    ///
    /// Edits land on the same `(chat_id, message_id)` row.
    pub async fn handle_update(&self, update: &Update) -> Result<Option<ChannelPostRecord>, IngestionError> {
        let Some(post) = update.post() else {
            debug!("Update {} carries no channel post", update.update_id);
            return Ok(None);
        };

        let (media_url, media_type) = match post.media() {
            Some((file_id, kind)) => (Some(self.api.file_url(file_id).await?), Some(kind)),
            None => (None, None),
        };

        let record = ChannelPostRecord {
            chat_id: post.chat.id,
            message_id: post.message_id,
            text: post.body(),
            media_url,
            media_type,
        };

        self.sink.upsert_post(&record).await?;
        Ok(Some(record))
    }

    /// One `getUpdates` round. Returns the offset for the next round.
    pub async fn poll_once(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Option<i64>, IngestionError> {
        let updates = self.api.get_updates(offset, timeout_secs).await?;
        let mut next = offset;

        for update in &updates {
            if let Err(e) = self.handle_update(update).await {
                warn!("Failed to archive update {}: {}", update.update_id, e);
            }
            next = Some(next.map_or(update.update_id + 1, |n| n.max(update.update_id + 1)));
        }

        if !updates.is_empty() {
            info!("Processed {} updates", updates.len());
        }
        Ok(next)
    }

    pub async fn run(&self, timeout_secs: u64) {
        let mut offset = None;
        loop {
            match self.poll_once(offset, timeout_secs).await {
                Ok(next) => offset = next,
                Err(e) => {
                    warn!("Polling failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}
