#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use news_aggregator::llm_adapter::{
    CapabilityError, GenerationCapability, GenerationRequest, ResponseFormat, SpeechCapability, SpeechRequest,
};
use news_aggregator::traits::{CachedFeed, SharedStore, StoreError, StoreResult};
use news_aggregator::{
    AggregatorConfig, ArchivedPost, Category, ContentItem, EnrichmentPayload, GalleryPost, NewGalleryPost,
    ProxyRoute,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Config pointing every source at a local mock server through a direct route.
pub fn test_config(cache_dir: &Path, server_uri: &str) -> AggregatorConfig {
    let mut config = AggregatorConfig::default();
    config.cache_dir = Some(cache_dir.to_path_buf());
    config.feeds.clear();
    config.feed_proxies = vec![ProxyRoute::text("direct", "{raw_url}")];
    config.channel_proxies = vec![ProxyRoute::text("direct", "{raw_url}")];
    config.channel_url = format!("{}/s/studio", server_uri);
    config.feed_timeout_ms = 1_000;
    config.channel_timeout_ms = 1_000;
    config
}

/// Minimal RSS 2.0 document with one item per `(title, link)`.
pub fn rss_fixture(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| {
            format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description>Story body for {title}</description>\
                 <pubDate>Mon, 21 Oct 2024 07:28:00 GMT</pubDate></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Fixture</title><link>https://fixture.example</link><description>Fixture feed</description>{body}</channel></rss>"#
    )
}

pub fn item(id: &str, title: &str, category: Category) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: title.to_string(),
        source: "TEST".to_string(),
        timestamp: "Recent".to_string(),
        description: format!("About {title}"),
        content: format!("About {title}"),
        category,
        url: "#".to_string(),
        image_url: None,
        video_url: None,
        media_type: Default::default(),
    }
}

pub fn complete_payload() -> EnrichmentPayload {
    EnrichmentPayload {
        full_article: "Full article".to_string(),
        summary_short: "Short summary".to_string(),
        summary_roman_urdu: "Khulasa".to_string(),
        summary_urdu: "خلاصہ".to_string(),
        summary_hindi: "सारांश".to_string(),
        summary_telugu: "సారాంశం".to_string(),
        full_article_roman_urdu: "Poora mazmoon".to_string(),
        full_article_urdu: "پورا مضمون".to_string(),
        full_article_hindi: "पूरा लेख".to_string(),
        full_article_telugu: "పూర్తి వ్యాసం".to_string(),
    }
}

/// In-memory [`SharedStore`] with switchable failure and write delay.
#[derive(Default)]
pub struct InMemoryStore {
    pub feeds: Mutex<HashMap<Category, CachedFeed>>,
    pub enrichments: Mutex<HashMap<String, EnrichmentPayload>>,
    pub audio: Mutex<HashMap<String, String>>,
    pub archived: Mutex<Vec<ArchivedPost>>,
    pub gallery: Mutex<Vec<GalleryPost>>,
    pub unavailable: AtomicBool,
    pub write_delay: Mutex<Option<Duration>>,
    pub feed_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_feed(&self, category: Category, items: Vec<ContentItem>, written_at: DateTime<Utc>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(category, CachedFeed { items, written_at });
    }

    pub fn feed(&self, category: Category) -> Option<CachedFeed> {
        self.feeds.lock().unwrap().get(&category).cloned()
    }

    pub fn fail(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    async fn delay_write(&self) {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn feed_cache(&self, category: Category) -> StoreResult<Option<CachedFeed>> {
        self.check()?;
        Ok(self.feed(category))
    }

    async fn upsert_feed_cache(&self, category: Category, items: &[ContentItem]) -> StoreResult<()> {
        self.delay_write().await;
        self.check()?;
        self.set_feed(category, items.to_vec(), Utc::now());
        self.feed_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn enrichment(&self, item_id: &str) -> StoreResult<Option<EnrichmentPayload>> {
        self.check()?;
        Ok(self.enrichments.lock().unwrap().get(item_id).cloned())
    }

    async fn upsert_enrichment(&self, item_id: &str, payload: &EnrichmentPayload) -> StoreResult<()> {
        self.delay_write().await;
        self.check()?;
        self.enrichments
            .lock()
            .unwrap()
            .insert(item_id.to_string(), payload.clone());
        Ok(())
    }

    async fn audio(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        Ok(self.audio.lock().unwrap().get(key).cloned())
    }

    async fn upsert_audio(&self, key: &str, audio_base64: &str) -> StoreResult<()> {
        self.delay_write().await;
        self.check()?;
        self.audio
            .lock()
            .unwrap()
            .insert(key.to_string(), audio_base64.to_string());
        Ok(())
    }

    async fn recent_archived_posts(&self, limit: i64) -> StoreResult<Vec<ArchivedPost>> {
        self.check()?;
        let mut posts = self.archived.lock().unwrap().clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit.max(0) as usize);
        Ok(posts)
    }

    async fn gallery_posts(&self) -> StoreResult<Vec<GalleryPost>> {
        self.check()?;
        let mut posts = self.gallery.lock().unwrap().clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn insert_gallery_post(&self, post: &NewGalleryPost) -> StoreResult<GalleryPost> {
        self.check()?;
        let mut gallery = self.gallery.lock().unwrap();
        let created = GalleryPost {
            id: gallery.len() as i64 + 1,
            title: Some(post.title.clone()),
            description: Some(post.description.clone()),
            media_url: Some(post.media_url.clone()),
            created_at: Utc::now(),
        };
        gallery.push(created.clone());
        Ok(created)
    }
}

/// Generation double answering from a script, one entry per call.
#[derive(Default)]
pub struct ScriptedGeneration {
    pub replies: Mutex<VecDeque<Result<String, CapabilityError>>>,
    pub calls: Mutex<Vec<ResponseFormat>>,
}

impl ScriptedGeneration {
    pub fn new(replies: Vec<Result<String, CapabilityError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationCapability for ScriptedGeneration {
    fn adapter_name(&self) -> String {
        "scripted".to_string()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        self.calls.lock().unwrap().push(request.shape);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(CapabilityError::Empty))
    }
}

/// Speech double that records the text it was asked to speak.
#[derive(Default)]
pub struct ScriptedSpeech {
    pub reply: Mutex<Option<String>>,
    pub requests: Mutex<Vec<SpeechRequest>>,
}

impl ScriptedSpeech {
    pub fn returning(audio: &str) -> Self {
        Self {
            reply: Mutex::new(Some(audio.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechCapability for ScriptedSpeech {
    fn adapter_name(&self) -> String {
        "scripted".to_string()
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<String, CapabilityError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.lock().unwrap().clone().ok_or(CapabilityError::Rejected {
            status: 503,
            message: "overloaded".to_string(),
        })
    }
}
