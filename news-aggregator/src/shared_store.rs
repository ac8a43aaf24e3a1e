use crate::traits::{CachedFeed, SharedStore, StoreResult};
use crate::types::{ArchivedPost, Category, ContentItem, EnrichmentPayload, GalleryPost, NewGalleryPost};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feed_cache (
        category TEXT PRIMARY KEY,
        articles JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_articles_cache (
        article_id TEXT PRIMARY KEY,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ai_audio_cache (
        text_hash TEXT PRIMARY KEY,
        audio_data TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
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
    r#"
    CREATE TABLE IF NOT EXISTS gallery_posts (
        id BIGSERIAL PRIMARY KEY,
        title TEXT,
        description TEXT,
        media_url TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_telegram_posts_created_at ON telegram_posts(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_gallery_posts_created_at ON gallery_posts(created_at DESC)",
];

/// PostgreSQL-backed [`SharedStore`].
pub struct PgSharedStore {
    db: PgPool,
}

impl PgSharedStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("Connected to shared store");
        Ok(Self { db })
    }

    pub fn from_pool(db: PgPool) -> Self {
        Self { db }
    }

    /// Create every table the pipeline reads or writes. Safe to re-run.
    pub async fn setup_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.db).await?;
        }
        info!("Shared store schema ready");
        Ok(())
    }
}

#[async_trait]
impl SharedStore for PgSharedStore {
    async fn feed_cache(&self, category: Category) -> StoreResult<Option<CachedFeed>> {
        let row = sqlx::query("SELECT articles, updated_at FROM feed_cache WHERE category = $1")
            .bind(category.key())
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let articles: serde_json::Value = row.try_get("articles")?;
        let written_at: DateTime<Utc> = row.try_get("updated_at")?;
        let items: Vec<ContentItem> = serde_json::from_value(articles)?;
        debug!("Shared feed cache for {}: {} items", category, items.len());

        Ok(Some(CachedFeed { items, written_at }))
    }

    async fn upsert_feed_cache(&self, category: Category, items: &[ContentItem]) -> StoreResult<()> {
        let articles = serde_json::to_value(items)?;
        sqlx::query(
            r#"
            INSERT INTO feed_cache (category, articles, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (category) DO UPDATE
            SET articles = EXCLUDED.articles, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(category.key())
        .bind(articles)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn enrichment(&self, item_id: &str) -> StoreResult<Option<EnrichmentPayload>> {
        let row = sqlx::query("SELECT data FROM ai_articles_cache WHERE article_id = $1")
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => {
                let data: serde_json::Value = row.try_get("data")?;
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_enrichment(&self, item_id: &str, payload: &EnrichmentPayload) -> StoreResult<()> {
        let data = serde_json::to_value(payload)?;
        sqlx::query(
            r#"
            INSERT INTO ai_articles_cache (article_id, data)
            VALUES ($1, $2)
            ON CONFLICT (article_id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(item_id)
        .bind(data)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn audio(&self, key: &str) -> StoreResult<Option<String>> {
        let audio = sqlx::query_scalar::<_, String>("SELECT audio_data FROM ai_audio_cache WHERE text_hash = $1")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        Ok(audio)
    }

    async fn upsert_audio(&self, key: &str, audio_base64: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_audio_cache (text_hash, audio_data)
            VALUES ($1, $2)
            ON CONFLICT (text_hash) DO UPDATE SET audio_data = EXCLUDED.audio_data
            "#,
        )
        .bind(key)
        .bind(audio_base64)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn recent_archived_posts(&self, limit: i64) -> StoreResult<Vec<ArchivedPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, message, media_url, media_type, created_at
            FROM telegram_posts
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(ArchivedPost {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                message: row.try_get("message")?,
                media_url: row.try_get("media_url")?,
                media_type: row.try_get("media_type")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(posts)
    }

    async fn gallery_posts(&self) -> StoreResult<Vec<GalleryPost>> {
        let rows = sqlx::query(
            "SELECT id, title, description, media_url, created_at FROM gallery_posts ORDER BY created_at DESC",
        )
        .fetch_all(&self.db)
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(gallery_from_row(&row)?);
        }
        Ok(posts)
    }

    async fn insert_gallery_post(&self, post: &NewGalleryPost) -> StoreResult<GalleryPost> {
        let row = sqlx::query(
            r#"
            INSERT INTO gallery_posts (title, description, media_url)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, media_url, created_at
            "#,
        )
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.media_url)
        .fetch_one(&self.db)
        .await?;

        let created = gallery_from_row(&row)?;
        info!("Added gallery post {}", created.id);
        Ok(created)
    }
}

fn gallery_from_row(row: &sqlx::postgres::PgRow) -> StoreResult<GalleryPost> {
    Ok(GalleryPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        media_url: row.try_get("media_url")?,
        created_at: row.try_get("created_at")?,
    })
}
