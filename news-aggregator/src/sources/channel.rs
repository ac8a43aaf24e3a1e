use crate::config::ProxyRoute;
use crate::fetcher::ProxyChainFetcher;
use crate::normalizer::RawRecord;
use crate::parser::ChannelPageParser;
use crate::traits::PullSource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Public web preview of the studio channel (`https://t.me/s/<name>`).
pub struct ChannelSource {
    pub url: String,
    fetcher: ProxyChainFetcher,
    routes: Arc<Vec<ProxyRoute>>,
    timeout: Duration,
}

impl ChannelSource {
    pub fn new(url: String, fetcher: ProxyChainFetcher, routes: Arc<Vec<ProxyRoute>>, timeout: Duration) -> Self {
        Self {
            url,
            fetcher,
            routes,
            timeout,
        }
    }
}

#[async_trait]
impl PullSource for ChannelSource {
    fn source_id(&self) -> String {
        format!("channel:{}", self.url)
    }

    async fn pull(&self) -> Vec<RawRecord> {
        let page = self
            .fetcher
            .fetch(&self.url, &self.routes, self.timeout, ChannelPageParser::accept_page)
            .await;

        let Some(page) = page else {
            warn!("Channel page unavailable on every route");
            return Vec::new();
        };

        let posts = ChannelPageParser::parse_page(&page);
        info!("Scraped {} posts from {}", posts.len(), self.url);
        posts.into_iter().map(RawRecord::ChannelPost).collect()
    }
}
