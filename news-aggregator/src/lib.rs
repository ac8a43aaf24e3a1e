pub mod aggregator;
pub mod background;
pub mod cache;
pub mod config;
pub mod enrichment;
pub mod fetcher;
pub mod llm_adapter;
pub mod normalizer;
pub mod parser;
pub mod rss_utils;
pub mod shared_store;
pub mod sources;
pub mod traits;
pub mod types;

pub use aggregator::{NewsAggregator, RequestGuard, RequestToken};
pub use background::BackgroundWrites;
pub use cache::{CacheLookup, LocalStore, MemoryCache, TieredCache};
pub use config::{AggregatorConfig, GeminiConfig, ProxyRoute, ResponseShape};
pub use enrichment::{EnrichmentError, EnrichmentGateway};
pub use fetcher::ProxyChainFetcher;
pub use llm_adapter::{
    CapabilityError, GeminiAdapter, GenerationCapability, GenerationRequest, ResponseFormat, SpeechCapability,
    SpeechRequest,
};
pub use normalizer::{Normalizer, RawRecord};
pub use parser::{ChannelPageParser, ChannelPost, FeedParser, FeedRecord};
pub use shared_store::PgSharedStore;
pub use traits::{CachedFeed, PullSource, SharedStore, StoreError};
pub use types::*;
