pub mod channel;
pub mod rss_feed;

pub use channel::ChannelSource;
pub use rss_feed::RssFeedSource;
