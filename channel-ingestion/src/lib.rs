pub mod channel_ingester;
pub mod database;

pub use channel_ingester::{
    BotApi, ChannelIngester, IngestionConfig, IngestionError, Message, RetryPolicy, Update,
};
pub use database::ArchiveDatabase;
