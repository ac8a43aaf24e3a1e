use anyhow::Result;
use async_trait::async_trait;

use crate::defs::ChannelPostRecord;

/// Destination for channel posts captured by an ingester.
///
/// Writes are upserts keyed by `(chat_id, message_id)`, so delivering the
/// same post twice (or an edited version of it) leaves exactly one row.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn upsert_post(&self, post: &ChannelPostRecord) -> Result<()>;
}
