use crate::background::BackgroundWrites;
use crate::cache::{CacheLookup, LocalStore, TieredCache};
use crate::config::{AggregatorConfig, ProxyRoute};
use crate::fetcher::ProxyChainFetcher;
use crate::normalizer::{dedup_items, Normalizer, RawRecord};
use crate::rss_utils::url::is_valid_feed_url;
use crate::sources::{ChannelSource, RssFeedSource};
use crate::traits::{PullSource, SharedStore};
use crate::types::{Category, ContentItem, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-category aggregation: cache check, live fetch, merge, persist, degrade.
pub struct NewsAggregator {
    config: Arc<AggregatorConfig>,
    fetcher: ProxyChainFetcher,
    normalizer: Normalizer,
    cache: TieredCache,
    shared: Option<Arc<dyn SharedStore>>,
    background: BackgroundWrites,
    feed_routes: Arc<Vec<ProxyRoute>>,
    channel_routes: Arc<Vec<ProxyRoute>>,
}

impl NewsAggregator {
    pub fn new(config: AggregatorConfig, shared: Option<Arc<dyn SharedStore>>) -> Result<Self> {
        let fetcher = ProxyChainFetcher::new(&config.user_agent)?;
        Ok(Self::with_parts(config, shared, fetcher, BackgroundWrites::new()))
    }

    pub fn with_parts(
        config: AggregatorConfig,
        shared: Option<Arc<dyn SharedStore>>,
        fetcher: ProxyChainFetcher,
        background: BackgroundWrites,
    ) -> Self {
        let local = LocalStore::new(config.resolved_cache_dir());
        let cache = TieredCache::new(shared.clone(), local, config.freshness_window(), background.clone());
        let normalizer = Normalizer::new(&config);
        let feed_routes = Arc::new(config.feed_proxies.clone());
        let channel_routes = Arc::new(config.channel_proxies.clone());

        Self {
            config: Arc::new(config),
            fetcher,
            normalizer,
            cache,
            shared,
            background,
            feed_routes,
            channel_routes,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    /// Handle to the detached-write set, shared with the enrichment gateway.
    pub fn background(&self) -> BackgroundWrites {
        self.background.clone()
    }

    pub async fn fetch_category(&self, category: Category) -> Vec<ContentItem> {
        self.fetch_category_at(category, Utc::now()).await
    }

    /// Never fails; exhaustion of every source yields stale data or `[]`.
    pub async fn fetch_category_at(&self, category: Category, now: DateTime<Utc>) -> Vec<ContentItem> {
        let stale = match self.cache.read_at(category, now).await {
            CacheLookup::Fresh(items) => {
                info!("Serving {} {} items from cache", items.len(), category);
                return items;
            }
            stale => stale,
        };

        let live = match category {
            Category::Studio => self.fetch_channel(category).await,
            Category::Gallery => self.fetch_gallery(category).await,
            _ => self.fetch_feeds(category).await,
        };

        if !live.is_empty() {
            self.cache.write_at(category, &live, now).await;
            info!("Fetched {} live items for {}", live.len(), category);
            return live;
        }

        self.degrade(category, stale).await
    }

    async fn degrade(&self, category: Category, stale: CacheLookup) -> Vec<ContentItem> {
        if category == Category::Studio {
            let archived = self.fetch_archive(category).await;
            if !archived.is_empty() {
                warn!("Live channel unavailable, serving {} archived posts", archived.len());
                return archived;
            }
        }

        let stale = match stale.into_stale() {
            Some(items) => Some(items),
            None => self.cache.read_stale_fallback(category).await,
        };

        match stale {
            Some(items) => {
                warn!("Serving {} stale items for {}", items.len(), category);
                items
            }
            None => {
                warn!("No data available for {}", category);
                Vec::new()
            }
        }
    }

    async fn fetch_feeds(&self, category: Category) -> Vec<ContentItem> {
        let sources: Vec<RssFeedSource> = self
            .config
            .sources_for(category)
            .iter()
            .filter(|url| {
                let valid = is_valid_feed_url(url);
                if !valid {
                    warn!("Skipping invalid feed URL {}", url);
                }
                valid
            })
            .map(|url| {
                RssFeedSource::new(
                    url.clone(),
                    self.fetcher.clone(),
                    self.feed_routes.clone(),
                    self.config.feed_timeout(),
                )
            })
            .collect();

        if sources.is_empty() {
            debug!("No feed sources configured for {}", category);
            return Vec::new();
        }

        // Every source settles; results stay in source-list order.
        let pulled = join_all(sources.iter().map(|source| source.pull())).await;
        let records: Vec<RawRecord> = pulled.into_iter().flatten().collect();
        dedup_items(self.normalizer.normalize_all(&records, category))
    }

    async fn fetch_channel(&self, category: Category) -> Vec<ContentItem> {
        let source = ChannelSource::new(
            self.config.channel_url.clone(),
            self.fetcher.clone(),
            self.channel_routes.clone(),
            self.config.channel_timeout(),
        );
        debug!("Pulling {}", source.source_id());
        let records = source.pull().await;
        self.normalizer.normalize_all(&records, category)
    }

    async fn fetch_gallery(&self, category: Category) -> Vec<ContentItem> {
        let Some(store) = &self.shared else {
            debug!("Gallery needs the shared store");
            return Vec::new();
        };
        match store.gallery_posts().await {
            Ok(posts) => {
                let records: Vec<RawRecord> = posts.into_iter().map(RawRecord::Gallery).collect();
                self.normalizer.normalize_all(&records, category)
            }
            Err(e) => {
                warn!("Gallery unavailable: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_archive(&self, category: Category) -> Vec<ContentItem> {
        let Some(store) = &self.shared else {
            return Vec::new();
        };
        match store.recent_archived_posts(self.config.archive_limit).await {
            Ok(posts) => {
                let records: Vec<RawRecord> = posts.into_iter().map(RawRecord::Archived).collect();
                self.normalizer.normalize_all(&records, category)
            }
            Err(e) => {
                warn!("Channel archive unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Wait for detached shared-store writes. Shutdown and tests only.
    pub async fn flush_background(&self) {
        self.background.flush().await
    }
}

/// Hands out liveness tokens so a caller can drop results of a request that
/// has since been superseded. Network work is not cancelled.
#[derive(Debug, Clone, Default)]
pub struct RequestGuard {
    latest: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct RequestToken {
    latest: Arc<AtomicU64>,
    id: u64,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RequestToken {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RequestToken {
            latest: self.latest.clone(),
            id,
        }
    }
}

impl RequestToken {
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id
    }
}
