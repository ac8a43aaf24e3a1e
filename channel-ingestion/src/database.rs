use anyhow::Result;
use async_trait::async_trait;
use interfaces::{ArchiveSink, ChannelPostRecord};
use sqlx::PgPool;
use tracing::debug;

/// Postgres-backed channel post archive (`telegram_posts`).
pub struct ArchiveDatabase {
    pool: PgPool,
}

impl ArchiveDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS telegram_posts (
                id BIGSERIAL PRIMARY KEY,
                chat_id BIGINT NOT NULL,
                message_id BIGINT NOT NULL,
                title TEXT,
                message TEXT,
                media_url TEXT,
                media_type TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (chat_id, message_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ArchiveSink for ArchiveDatabase {
    async fn upsert_post(&self, post: &ChannelPostRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO telegram_posts (chat_id, message_id, message, media_url, media_type)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chat_id, message_id)
            DO UPDATE SET
                message = EXCLUDED.message,
                media_url = EXCLUDED.media_url,
                media_type = EXCLUDED.media_type
            "#,
        )
        .bind(post.chat_id)
        .bind(post.message_id)
        .bind(&post.text)
        .bind(&post.media_url)
        .bind(post.media_type.map(|m| m.as_str()))
        .execute(&self.pool)
        .await?;

        debug!("Archived post {}/{}", post.chat_id, post.message_id);
        Ok(())
    }
}
