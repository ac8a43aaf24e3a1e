use crate::config::ProxyRoute;
use crate::fetcher::ProxyChainFetcher;
use crate::normalizer::RawRecord;
use crate::parser::FeedParser;
use crate::traits::PullSource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One RSS/Atom URL pulled through the feed proxy chain.
pub struct RssFeedSource {
    pub url: String,
    fetcher: ProxyChainFetcher,
    routes: Arc<Vec<ProxyRoute>>,
    timeout: Duration,
}

impl RssFeedSource {
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
impl PullSource for RssFeedSource {
    fn source_id(&self) -> String {
        format!("rss:{}", self.url)
    }

    async fn pull(&self) -> Vec<RawRecord> {
        let records = self
            .fetcher
            .fetch(&self.url, &self.routes, self.timeout, FeedParser::accept_feed)
            .await;

        match records {
            Some(records) => {
                info!("Pulled {} entries from {}", records.len(), self.url);
                records
                    .into_iter()
                    .map(|record| RawRecord::FeedEntry {
                        record,
                        feed_url: self.url.clone(),
                    })
                    .collect()
            }
            None => {
                warn!("No data from feed {}", self.url);
                Vec::new()
            }
        }
    }
}
