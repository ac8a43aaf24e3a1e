use crate::background::BackgroundWrites;
use crate::rss_utils::time;
use crate::traits::{CachedFeed, SharedStore};
use crate::types::{Category, ContentItem, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const LOCAL_CACHE_PREFIX: &str = "news_pulse_cache_";

/// Process-lifetime key/value cache. Built once and shared by reference.
pub struct MemoryCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> MemoryCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: K, value: V) {
        self.entries.write().await.insert(key, value);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LocalCacheFile {
    /// Epoch milliseconds.
    timestamp: i64,
    articles: Vec<ContentItem>,
}

/// Device-local tier: one JSON file per category.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, category: Category) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", LOCAL_CACHE_PREFIX, category.key()))
    }

    /// Missing and corrupt files both read as `None`.
    pub async fn read(&self, category: Category) -> Option<CachedFeed> {
        let path = self.path_for(category);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read local cache {}: {}", path.display(), e);
                return None;
            }
        };

        let file: LocalCacheFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!("Ignoring corrupt local cache {}: {}", path.display(), e);
                return None;
            }
        };

        let written_at = Utc.timestamp_millis_opt(file.timestamp).single()?;
        Some(CachedFeed {
            items: file.articles,
            written_at,
        })
    }

    /// Write via a temp file and rename so readers never see a partial file.
    pub async fn write(&self, category: Category, items: &[ContentItem], written_at: DateTime<Utc>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file = LocalCacheFile {
            timestamp: written_at.timestamp_millis(),
            articles: items.to_vec(),
        };
        let content = serde_json::to_string(&file)?;

        let path = self.path_for(category);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Wrote {} items to {}", items.len(), path.display());
        Ok(())
    }
}

/// Outcome of a cache check.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Fresh(Vec<ContentItem>),
    /// Nothing fresh. Carries whatever stale payloads were seen on the way.
    Stale {
        shared: Option<Vec<ContentItem>>,
        local: Option<Vec<ContentItem>>,
    },
}

impl CacheLookup {
    /// Best stale payload: shared before local.
    pub fn into_stale(self) -> Option<Vec<ContentItem>> {
        match self {
            CacheLookup::Fresh(items) => Some(items),
            CacheLookup::Stale { shared, local } => shared.or(local),
        }
    }
}

/// Shared and local feed tiers with a common freshness window.
#[derive(Clone)]
pub struct TieredCache {
    shared: Option<Arc<dyn SharedStore>>,
    local: LocalStore,
    window: Duration,
    background: BackgroundWrites,
}

impl TieredCache {
    pub fn new(
        shared: Option<Arc<dyn SharedStore>>,
        local: LocalStore,
        window: Duration,
        background: BackgroundWrites,
    ) -> Self {
        Self {
            shared,
            local,
            window,
            background,
        }
    }

    pub fn is_fresh(&self, written_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        time::is_fresh(written_at, now, self.window)
    }

    pub async fn read(&self, category: Category) -> CacheLookup {
        self.read_at(category, Utc::now()).await
    }

    /// Shared tier first, then local. The first fresh non-empty payload wins.
    pub async fn read_at(&self, category: Category, now: DateTime<Utc>) -> CacheLookup {
        let mut shared_stale = None;
        if let Some(entry) = self.read_shared(category).await {
            if self.is_fresh(entry.written_at, now) {
                debug!("Fresh shared cache hit for {}", category);
                return CacheLookup::Fresh(entry.items);
            }
            shared_stale = Some(entry.items);
        }

        let mut local_stale = None;
        if let Some(entry) = self.read_local(category).await {
            if self.is_fresh(entry.written_at, now) {
                debug!("Fresh local cache hit for {}", category);
                return CacheLookup::Fresh(entry.items);
            }
            local_stale = Some(entry.items);
        }

        debug!("No fresh cache for {}", category);
        CacheLookup::Stale {
            shared: shared_stale,
            local: local_stale,
        }
    }

    /// Latest payload from either tier regardless of age.
    pub async fn read_stale_fallback(&self, category: Category) -> Option<Vec<ContentItem>> {
        if let Some(entry) = self.read_shared(category).await {
            return Some(entry.items);
        }
        self.read_local(category).await.map(|entry| entry.items)
    }

    pub async fn write(&self, category: Category, items: &[ContentItem]) {
        self.write_at(category, items, Utc::now()).await
    }

    /// Local tier is awaited; the shared tier is written in the background.
    pub async fn write_at(&self, category: Category, items: &[ContentItem], now: DateTime<Utc>) {
        if let Err(e) = self.local.write(category, items, now).await {
            warn!("Local cache write failed for {}: {}", category, e);
        }

        if let Some(store) = &self.shared {
            let store = store.clone();
            let items = items.to_vec();
            self.background.spawn("feed_cache", async move {
                store.upsert_feed_cache(category, &items).await
            });
        }
        info!("Cached {} items for {}", items.len(), category);
    }

    async fn read_shared(&self, category: Category) -> Option<CachedFeed> {
        let store = self.shared.as_ref()?;
        match store.feed_cache(category).await {
            Ok(Some(entry)) if !entry.items.is_empty() => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!("Shared cache unavailable for {}: {}", category, e);
                None
            }
        }
    }

    async fn read_local(&self, category: Category) -> Option<CachedFeed> {
        self.local
            .read(category)
            .await
            .filter(|entry| !entry.items.is_empty())
    }
}
