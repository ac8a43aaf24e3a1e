use crate::config::AggregatorConfig;
use crate::parser::{ChannelPost, FeedRecord};
use crate::rss_utils::{html, text, time, url};
use crate::rss_utils::time::DisplayStyle;
use crate::types::{ArchivedPost, Category, ContentItem, GalleryPost, MediaType};
use chrono::FixedOffset;
use interfaces::ArchiveMediaType;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

pub const ARCHIVE_SOURCE: &str = "Studio (Archive)";
pub const GALLERY_SOURCE: &str = "Gallery";

const NEW_VIDEO_TITLE: &str = "New Video Upload";
const NEW_IMAGE_TITLE: &str = "New Image Upload";
const FEED_TITLE: &str = "No Title";
const CHANNEL_TITLE: &str = "Studio Update";
const ARCHIVE_TITLE: &str = "Studio Archive";
const GALLERY_TITLE: &str = "Gallery Post";

/// A provider record before normalization.
#[derive(Debug, Clone)]
pub enum RawRecord {
    FeedEntry { record: FeedRecord, feed_url: String },
    ChannelPost(ChannelPost),
    Archived(ArchivedPost),
    Gallery(GalleryPost),
    Unrecognized(serde_json::Value),
}

/// Maps raw provider records onto [`ContentItem`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    description_limit: usize,
    title_limit: usize,
    display_offset: FixedOffset,
    channel_source: String,
    channel_logo_url: Option<String>,
}

impl Normalizer {
    pub fn new(config: &AggregatorConfig) -> Self {
        Self {
            description_limit: config.description_limit,
            title_limit: config.title_limit,
            display_offset: config.display_offset(),
            channel_source: config.channel_source_label.clone(),
            channel_logo_url: config.channel_logo_url.clone(),
        }
    }

    /// `None` means the record cannot produce an item and is skipped.
    pub fn normalize(&self, record: &RawRecord, category: Category) -> Option<ContentItem> {
        match record {
            RawRecord::FeedEntry { record, feed_url } => self.feed_entry(record, feed_url, category),
            RawRecord::ChannelPost(post) => self.channel_post(post, category),
            RawRecord::Archived(post) => Some(self.archived(post, category)),
            RawRecord::Gallery(post) => Some(self.gallery(post, category)),
            RawRecord::Unrecognized(value) => {
                debug!("Skipping unrecognized record: {}", value);
                None
            }
        }
    }

    pub fn normalize_all<'a, I>(&self, records: I, category: Category) -> Vec<ContentItem>
    where
        I: IntoIterator<Item = &'a RawRecord>,
    {
        records
            .into_iter()
            .filter_map(|record| self.normalize(record, category))
            .collect()
    }

    fn feed_entry(&self, record: &FeedRecord, feed_url: &str, category: Category) -> Option<ContentItem> {
        let link = record.link.as_deref().map(str::trim).filter(|l| !l.is_empty());
        let natural_key = link.or(record.title.as_deref())?;

        let body_html = record
            .content_html
            .as_deref()
            .or(record.summary_html.as_deref())
            .unwrap_or("");
        let body = html::to_text(body_html);
        let source = url::source_label(feed_url);

        let (image_url, video_url) = match (&record.media_url, record.media_is_video) {
            (Some(media), true) => (html::first_image_src(body_html), Some(media.clone())),
            (Some(media), false) => (Some(media.clone()), None),
            (None, _) => (html::first_image_src(body_html), None),
        };
        let media_type = media_type_of(image_url.as_deref(), video_url.is_some());

        let title = self.pick_title(record.title.as_deref(), &body, media_type, FEED_TITLE);

        Some(self.assemble(AssembledFields {
            id: feed_item_id(natural_key),
            title,
            source,
            timestamp: time::format_display(record.published, self.display_offset, DisplayStyle::Clock),
            body,
            category,
            url: link.unwrap_or("#").to_string(),
            image_url,
            video_url,
            media_type,
        }))
    }

    fn channel_post(&self, post: &ChannelPost, category: Category) -> Option<ContentItem> {
        let data_post = post.data_post.trim();
        if data_post.is_empty() {
            return None;
        }

        let video_url = post.video_url.clone().filter(|v| !v.is_empty());
        let scraped_image = post.image_url.clone().filter(|i| !i.is_empty());
        let media_type = media_type_of(scraped_image.as_deref(), post.is_video);
        let title = self.pick_title(None, &post.text, media_type, CHANNEL_TITLE);
        let image_url = scraped_image.or_else(|| self.channel_logo_url.clone());
        let media_type = media_type_of(image_url.as_deref(), post.is_video);

        Some(self.assemble(AssembledFields {
            id: format!("tg_live_{}", data_post),
            title,
            source: self.channel_source.clone(),
            timestamp: time::format_display(post.datetime, self.display_offset, DisplayStyle::DateTime),
            body: post.text.clone(),
            category,
            url: format!("https://t.me/{}", data_post),
            image_url,
            video_url,
            media_type,
        }))
    }

    fn archived(&self, post: &ArchivedPost, category: Category) -> ContentItem {
        let kind = post.media_type.as_deref().and_then(ArchiveMediaType::parse);
        let media = post.media_url.clone().filter(|m| !m.trim().is_empty());
        let moving = matches!(kind, Some(ArchiveMediaType::Video | ArchiveMediaType::Animation));

        let (image_url, video_url) = if moving {
            (None, media)
        } else {
            (media, None)
        };
        let media_type = match kind {
            Some(ArchiveMediaType::Video) if video_url.is_some() => MediaType::Video,
            Some(ArchiveMediaType::Animation) if video_url.is_some() => MediaType::Animation,
            _ => media_type_of(image_url.as_deref(), false),
        };

        let body = post.message.clone().unwrap_or_default();
        let title = self.pick_title(post.title.as_deref(), &body, media_type, ARCHIVE_TITLE);

        self.assemble(AssembledFields {
            id: format!("tg_db_{}", post.id),
            title,
            source: ARCHIVE_SOURCE.to_string(),
            timestamp: time::format_display(Some(post.created_at), self.display_offset, DisplayStyle::DateTime),
            body,
            category,
            url: "#".to_string(),
            image_url,
            video_url,
            media_type,
        })
    }

    fn gallery(&self, post: &GalleryPost, category: Category) -> ContentItem {
        let image_url = post.media_url.clone().filter(|m| !m.trim().is_empty());
        let media_type = media_type_of(image_url.as_deref(), false);
        let explicit = post.title.as_deref().map(str::trim).filter(|t| !t.is_empty());

        self.assemble(AssembledFields {
            id: format!("gal_{}", post.id),
            title: explicit.unwrap_or(GALLERY_TITLE).to_string(),
            source: GALLERY_SOURCE.to_string(),
            timestamp: time::format_display(Some(post.created_at), self.display_offset, DisplayStyle::Date),
            body: post.description.clone().unwrap_or_default(),
            category,
            url: "#".to_string(),
            image_url,
            video_url: None,
            media_type,
        })
    }

    /// explicit title → first body line → media label → source label.
    fn pick_title(&self, explicit: Option<&str>, body: &str, media: MediaType, fallback: &str) -> String {
        if let Some(title) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        if let Some(line) = text::first_non_empty_line(body) {
            return text::truncate_with_ellipsis(line, self.title_limit);
        }
        match media {
            MediaType::Video | MediaType::Animation => NEW_VIDEO_TITLE.to_string(),
            MediaType::Image => NEW_IMAGE_TITLE.to_string(),
            MediaType::None => fallback.to_string(),
        }
    }

    fn assemble(&self, fields: AssembledFields) -> ContentItem {
        let content = match fields.body.trim() {
            "" => format!("Check out this update from {}.", fields.source),
            body => body.to_string(),
        };
        let description = text::truncate_with_ellipsis(&content, self.description_limit);

        ContentItem {
            id: fields.id,
            title: fields.title,
            source: fields.source,
            timestamp: fields.timestamp,
            description,
            content,
            category: fields.category,
            url: fields.url,
            image_url: fields.image_url,
            video_url: fields.video_url,
            media_type: fields.media_type,
        }
    }
}

struct AssembledFields {
    id: String,
    title: String,
    source: String,
    timestamp: String,
    body: String,
    category: Category,
    url: String,
    image_url: Option<String>,
    video_url: Option<String>,
    media_type: MediaType,
}

fn media_type_of(image_url: Option<&str>, is_video: bool) -> MediaType {
    if is_video {
        MediaType::Video
    } else if image_url.is_some() {
        MediaType::Image
    } else {
        MediaType::None
    }
}

/// `rss_` + first 16 hex chars of SHA-256 over the natural key.
pub fn feed_item_id(natural_key: &str) -> String {
    let digest = Sha256::digest(natural_key.trim().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("rss_{}", &hex[..16])
}

/// Drop items whose normalized title or id was already seen. First wins.
/// Titles with no alphanumerics never collide with each other.
pub fn dedup_items(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen_titles = HashSet::new();
    let mut seen_ids = HashSet::new();
    let before = items.len();

    let unique: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| {
            let key = text::normalized_title_key(&item.title);
            if !key.is_empty() && seen_titles.contains(&key) {
                return false;
            }
            if !seen_ids.insert(item.id.clone()) {
                return false;
            }
            if !key.is_empty() {
                seen_titles.insert(key);
            }
            true
        })
        .collect();

    if unique.len() < before {
        debug!("Removed {} duplicate items", before - unique.len());
    }
    unique
}
