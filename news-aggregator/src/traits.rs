use crate::normalizer::RawRecord;
use crate::types::{ArchivedPost, Category, ContentItem, EnrichmentPayload, GalleryPost, NewGalleryPost};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Failure talking to the shared store. Callers on the read path treat any
/// of these as "tier unavailable".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("shared store not configured")]
    Unavailable,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A category's cached item list as held by one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFeed {
    pub items: Vec<ContentItem>,
    pub written_at: DateTime<Utc>,
}

/// Remote store shared by every client of the pipeline. Writes are upserts
/// keyed by the natural key of each table, last write wins.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn feed_cache(&self, category: Category) -> StoreResult<Option<CachedFeed>>;

    async fn upsert_feed_cache(&self, category: Category, items: &[ContentItem]) -> StoreResult<()>;

    async fn enrichment(&self, item_id: &str) -> StoreResult<Option<EnrichmentPayload>>;

    async fn upsert_enrichment(&self, item_id: &str, payload: &EnrichmentPayload) -> StoreResult<()>;

    async fn audio(&self, key: &str) -> StoreResult<Option<String>>;

    async fn upsert_audio(&self, key: &str, audio_base64: &str) -> StoreResult<()>;

    /// Newest first.
    async fn recent_archived_posts(&self, limit: i64) -> StoreResult<Vec<ArchivedPost>>;

    /// Newest first.
    async fn gallery_posts(&self) -> StoreResult<Vec<GalleryPost>>;

    async fn insert_gallery_post(&self, post: &NewGalleryPost) -> StoreResult<GalleryPost>;
}

/// A live upstream that yields raw records for one category.
#[async_trait]
pub trait PullSource: Send + Sync {
    /// Stable identifier, used in logs.
    fn source_id(&self) -> String;

    /// Pull the current records. Empty when the upstream could not be reached.
    async fn pull(&self) -> Vec<RawRecord>;
}
