#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use channel_ingestion::{BotApi, RetryPolicy};
use interfaces::{ArchiveSink, ChannelPostRecord};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_TOKEN: &str = "123:test";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(10),
    }
}

pub fn test_api(server_uri: &str) -> BotApi {
    BotApi::new(server_uri, TEST_TOKEN, fast_retry()).unwrap()
}

/// Archive keyed by `(chat_id, message_id)`, mirroring the table's unique key.
#[derive(Default)]
pub struct InMemoryArchive {
    pub rows: Mutex<BTreeMap<(i64, i64), ChannelPostRecord>>,
    pub unavailable: AtomicBool,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn row(&self, chat_id: i64, message_id: i64) -> Option<ChannelPostRecord> {
        self.rows.lock().unwrap().get(&(chat_id, message_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl ArchiveSink for InMemoryArchive {
    async fn upsert_post(&self, post: &ChannelPostRecord) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("archive offline"));
        }
        self.rows
            .lock()
            .unwrap()
            .insert((post.chat_id, post.message_id), post.clone());
        Ok(())
    }
}

pub fn bot_ok(result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "ok": true, "result": result })
}
