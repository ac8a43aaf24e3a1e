use crate::types::{AggregatorError, Category, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a route wraps the upstream body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseShape {
    /// JSON object carrying the upstream body in a string field.
    JsonWrapped { field: String },
    /// Upstream body passed through verbatim.
    Text,
}

/// One alternate retrieval route in a proxy chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRoute {
    pub name: String,
    /// Endpoint template. `{url}` is replaced by the percent-encoded target,
    /// `{raw_url}` by the target verbatim.
    pub template: String,
    pub shape: ResponseShape,
    /// Append a `t=<millis>` query parameter to the target.
    #[serde(default)]
    pub cache_bust: bool,
}

impl ProxyRoute {
    pub fn text(name: &str, template: &str) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            shape: ResponseShape::Text,
            cache_bust: false,
        }
    }

    pub fn json_wrapped(name: &str, template: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            shape: ResponseShape::JsonWrapped {
                field: field.to_string(),
            },
            cache_bust: false,
        }
    }

    pub fn with_cache_bust(mut self) -> Self {
        self.cache_bust = true;
        self
    }

    /// Build the request URL for `target`.
    pub fn resolve(&self, target: &str, now_millis: i64) -> String {
        let target = if self.cache_bust {
            let separator = if target.contains('?') { '&' } else { '?' };
            format!("{}{}t={}", target, separator, now_millis)
        } else {
            target.to_string()
        };
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();

        self.template
            .replace("{raw_url}", &target)
            .replace("{url}", &encoded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub speech_model: String,
    pub voice: String,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Fenrir".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub user_agent: String,
    /// Source URLs per category. Studio and Gallery use dedicated sources.
    pub feeds: BTreeMap<Category, Vec<String>>,
    pub feed_proxies: Vec<ProxyRoute>,
    pub channel_proxies: Vec<ProxyRoute>,
    /// Public web preview of the Telegram channel (`https://t.me/s/<name>`).
    pub channel_url: String,
    pub channel_source_label: String,
    pub channel_logo_url: Option<String>,
    pub feed_timeout_ms: u64,
    pub channel_timeout_ms: u64,
    pub freshness_secs: i64,
    pub description_limit: usize,
    pub title_limit: usize,
    pub archive_limit: i64,
    /// Offset used for display timestamps (IST by default).
    pub display_utc_offset_minutes: i32,
    pub cache_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub gemini: GeminiConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            user_agent: "NewsPulse-Aggregator/1.0".to_string(),
            feeds: default_feeds(),
            feed_proxies: default_feed_proxies(),
            channel_proxies: default_channel_proxies(),
            channel_url: "https://t.me/s/newspulse_studio".to_string(),
            channel_source_label: "Studio Live".to_string(),
            channel_logo_url: None,
            feed_timeout_ms: 6_000,
            channel_timeout_ms: 8_000,
            freshness_secs: 300,
            description_limit: 200,
            title_limit: 80,
            archive_limit: 20,
            display_utc_offset_minutes: 330,
            cache_dir: None,
            database_url: None,
            gemini: GeminiConfig::default(),
        }
    }
}

fn default_feeds() -> BTreeMap<Category, Vec<String>> {
    let mut feeds = BTreeMap::new();
    feeds.insert(
        Category::Hyderabad,
        vec![
            "https://www.thehindu.com/news/cities/Hyderabad/feeder/default.rss".to_string(),
            "https://timesofindia.indiatimes.com/rssfeeds/-2128816011.cms".to_string(),
        ],
    );
    feeds.insert(
        Category::Telangana,
        vec!["https://www.thehindu.com/news/national/telangana/feeder/default.rss".to_string()],
    );
    feeds.insert(
        Category::India,
        vec![
            "https://feeds.feedburner.com/ndtvnews-india-news".to_string(),
            "https://www.thehindu.com/news/national/feeder/default.rss".to_string(),
        ],
    );
    feeds.insert(
        Category::International,
        vec![
            "https://feeds.bbci.co.uk/news/world/rss.xml".to_string(),
            "https://www.aljazeera.com/xml/rss/all.xml".to_string(),
        ],
    );
    feeds.insert(
        Category::Sports,
        vec![
            "https://feeds.bbci.co.uk/sport/rss.xml".to_string(),
            "https://www.espncricinfo.com/rss/content/story/feeds/0.xml".to_string(),
        ],
    );
    feeds
}

fn default_feed_proxies() -> Vec<ProxyRoute> {
    vec![
        ProxyRoute::text("direct", "{raw_url}"),
        ProxyRoute::json_wrapped("allorigins", "https://api.allorigins.win/get?url={url}", "contents"),
        ProxyRoute::text("codetabs", "https://api.codetabs.com/v1/proxy?quest={url}"),
        ProxyRoute::text("corsproxy", "https://corsproxy.io/?{url}"),
        ProxyRoute::text("thingproxy", "https://thingproxy.freeboard.io/fetch/{raw_url}"),
    ]
}

fn default_channel_proxies() -> Vec<ProxyRoute> {
    vec![
        ProxyRoute::text("direct", "{raw_url}"),
        ProxyRoute::json_wrapped("allorigins", "https://api.allorigins.win/get?url={url}", "contents")
            .with_cache_bust(),
        ProxyRoute::text("codetabs", "https://api.codetabs.com/v1/proxy?quest={url}"),
        ProxyRoute::text("corsproxy", "https://corsproxy.io/?{url}"),
    ]
}

impl AggregatorConfig {
    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AggregatorError::Config(format!("config parse error: {e}")))
    }

    /// Supported environment variables:
    /// - `DATABASE_URL`: shared store connection string
    /// - `GEMINI_API_KEY`: generation/speech capability key
    /// - `NEWS_PULSE_CACHE_DIR`: device-local cache directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.gemini.api_key = Some(key);
            }
        }
        if let Ok(dir) = std::env::var("NEWS_PULSE_CACHE_DIR") {
            if !dir.is_empty() {
                self.cache_dir = Some(PathBuf::from(dir));
            }
        }
    }

    pub fn sources_for(&self, category: Category) -> &[String] {
        self.feeds.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resolved_cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .map(|dir| dir.join("news-pulse"))
                .unwrap_or_else(|| PathBuf::from(".news-pulse-cache")),
        }
    }

    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.freshness_secs)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_millis(self.feed_timeout_ms)
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_millis(self.channel_timeout_ms)
    }

    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.display_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}
