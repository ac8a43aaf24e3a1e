use crate::rss_utils::{html, time};
use crate::types::{AggregatorError, Result};
use chrono::{DateTime, Utc};
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

/// One RSS/Atom entry, reduced to the fields the normalizer reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedRecord {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// `content:encoded` (or Atom content) HTML.
    pub content_html: Option<String>,
    /// `description` / summary HTML.
    pub summary_html: Option<String>,
    /// Structured media (`media:content`, enclosure, thumbnail).
    pub media_url: Option<String>,
    pub media_is_video: bool,
}

/// One message scraped from the channel's public web preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPost {
    /// `<channel>/<message id>`
    pub data_post: String,
    /// Message text, already reduced from HTML.
    pub text: String,
    pub datetime: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub is_video: bool,
}

pub const CHANNEL_MARKER: &str = "tgme_widget_message";

pub struct FeedParser;

impl FeedParser {
    /// Parse an RSS/Atom document. A document that parses but has no entries
    /// still yields `Ok(vec![])`; callers decide whether that is acceptable.
    pub fn parse_feed(content: &str) -> Result<Vec<FeedRecord>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let records: Vec<FeedRecord> = feed.entries.into_iter().map(Self::parse_entry).collect();

        debug!("Parsed feed with {} entries", records.len());
        Ok(records)
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> FeedRecord {
        let title = entry
            .title
            .map(|t| html::decode_entities(t.content.trim()))
            .filter(|t| !t.is_empty());

        let link = entry.links.first().map(|l| l.href.clone());

        let published = entry.published.or(entry.updated);

        let content_html = entry.content.and_then(|c| c.body).filter(|b| !b.trim().is_empty());
        let summary_html = entry.summary.map(|s| s.content).filter(|s| !s.trim().is_empty());

        let mut media_url = None;
        let mut media_is_video = false;
        for media in &entry.media {
            if let Some(content) = media.content.iter().find(|c| c.url.is_some()) {
                media_url = content.url.as_ref().map(|u| u.to_string());
                media_is_video = content
                    .content_type
                    .as_ref()
                    .map(|m| m.to_string().starts_with("video"))
                    .unwrap_or(false);
                break;
            }
            if let Some(thumb) = media.thumbnails.first() {
                media_url = Some(thumb.image.uri.clone());
                break;
            }
        }

        FeedRecord {
            title,
            link,
            published,
            content_html,
            summary_html,
            media_url,
            media_is_video,
        }
    }

    /// Cheap pre-check before a full parse.
    pub fn is_valid_feed_content(content: &str) -> bool {
        let content_lower = content.to_lowercase();
        content_lower.contains("<rss")
            || content_lower.contains("<feed")
            || content_lower.contains("<rdf:rdf")
            || content_lower.contains("<channel")
    }

    /// Acceptance rule for a feed body: it parses and has at least one entry.
    pub fn accept_feed(body: String) -> Option<Vec<FeedRecord>> {
        if !Self::is_valid_feed_content(&body) {
            return None;
        }
        match Self::parse_feed(&body) {
            Ok(records) if !records.is_empty() => Some(records),
            Ok(_) => {
                debug!("Feed parsed but carried no entries");
                None
            }
            Err(e) => {
                debug!("Rejecting feed body: {}", e);
                None
            }
        }
    }
}

static DATA_POST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-post="([^"]+)""#).expect("valid regex"));
static MESSAGE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div class="tgme_widget_message_text[^"]*"[^>]*>(.*?)</div>"#)
        .expect("valid regex")
});
static TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<time[^>]*datetime="([^"]+)""#).expect("valid regex"));
static PHOTO_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class="tgme_widget_message_photo_wrap[^"]*"[^>]*?style="([^"]*)""#)
        .expect("valid regex")
});
static VIDEO_THUMB_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"class="tgme_widget_message_video_thumb[^"]*"[^>]*?style="([^"]*)""#)
        .expect("valid regex")
});
static VIDEO_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<video[^>]+src="([^"]+)""#).expect("valid regex"));

pub struct ChannelPageParser;

impl ChannelPageParser {
    /// Acceptance rule for a channel page body.
    pub fn accept_page(body: String) -> Option<String> {
        if body.contains(CHANNEL_MARKER) {
            Some(body)
        } else {
            None
        }
    }

    /// Extract posts from the channel preview page, newest first.
    pub fn parse_page(page: &str) -> Vec<ChannelPost> {
        let starts: Vec<(usize, String)> = DATA_POST
            .captures_iter(page)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), caps[1].to_string()))
            })
            .collect();

        let mut posts: Vec<ChannelPost> = starts
            .iter()
            .enumerate()
            .map(|(i, (start, data_post))| {
                let end = starts.get(i + 1).map(|(next, _)| *next).unwrap_or(page.len());
                Self::parse_message(data_post, &page[*start..end])
            })
            .collect();

        posts.reverse();
        info!("Parsed {} channel posts", posts.len());
        posts
    }

    fn parse_message(data_post: &str, segment: &str) -> ChannelPost {
        let text = MESSAGE_TEXT
            .captures(segment)
            .map(|caps| html::to_text(&caps[1]))
            .unwrap_or_default();

        let datetime = TIME
            .captures(segment)
            .and_then(|caps| time::parse_rfc3339(&caps[1]));

        let mut image_url = PHOTO_STYLE
            .captures(segment)
            .and_then(|caps| html::css_background_url(&caps[1]));

        let is_video = segment.contains("tgme_widget_message_video_player");
        let mut video_url = None;
        if is_video {
            if image_url.is_none() {
                image_url = VIDEO_THUMB_STYLE
                    .captures(segment)
                    .and_then(|caps| html::css_background_url(&caps[1]));
            }
            video_url = VIDEO_SRC
                .captures(segment)
                .map(|caps| html::decode_entities(&caps[1]));
        }

        ChannelPost {
            data_post: data_post.to_string(),
            text,
            datetime,
            image_url,
            video_url,
            is_video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="tgme_widget_message_wrap"><div class="tgme_widget_message" data-post="studio/10">
  <a class="tgme_widget_message_photo_wrap 1" href="https://t.me/studio/10" style="width:800px;background-image:url('https://cdn.example/p10.jpg')"></a>
  <div class="tgme_widget_message_text js-message_text" dir="auto">Old Bridge reopens<br/>Traffic &amp; buses resume</div>
  <a class="tgme_widget_message_date"><time datetime="2024-10-21T07:28:00+00:00" class="time">07:28</time></a>
</div></div>
<div class="tgme_widget_message_wrap"><div class="tgme_widget_message" data-post="studio/11">
  <a class="tgme_widget_message_video_player" href="https://t.me/studio/11">
    <i class="tgme_widget_message_video_thumb" style="background-image:url('https://cdn.example/t11.jpg')"></i>
    <video src="https://cdn.example/v11.mp4" class="tgme_widget_message_video"></video>
  </a>
  <a class="tgme_widget_message_date"><time datetime="2024-10-21T08:00:00+00:00" class="time">08:00</time></a>
</div></div>
"#;

    #[test]
    fn channel_page_posts_come_back_newest_first() {
        let posts = ChannelPageParser::parse_page(PAGE);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].data_post, "studio/11");
        assert_eq!(posts[1].data_post, "studio/10");
    }

    #[test]
    fn channel_message_fields_are_extracted() {
        let posts = ChannelPageParser::parse_page(PAGE);

        let photo = &posts[1];
        assert_eq!(photo.text, "Old Bridge reopens\nTraffic & buses resume");
        assert_eq!(photo.image_url.as_deref(), Some("https://cdn.example/p10.jpg"));
        assert!(!photo.is_video);
        assert!(photo.datetime.is_some());

        let video = &posts[0];
        assert!(video.is_video);
        assert!(video.text.is_empty());
        assert_eq!(video.image_url.as_deref(), Some("https://cdn.example/t11.jpg"));
        assert_eq!(video.video_url.as_deref(), Some("https://cdn.example/v11.mp4"));
    }

    #[test]
    fn page_without_marker_is_rejected() {
        assert!(ChannelPageParser::accept_page("<html>blocked</html>".to_string()).is_none());
        assert!(ChannelPageParser::accept_page(PAGE.to_string()).is_some());
    }

    #[test]
    fn feed_with_entries_is_accepted() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/"><channel><title>T</title>
<item><title>Monsoon &amp; more</title><link>https://news.example/a1</link>
<description>&lt;p&gt;Body&lt;/p&gt;</description>
<media:content url="https://img.example/a1.jpg" medium="image"/>
<pubDate>Mon, 21 Oct 2024 07:28:00 GMT</pubDate></item>
</channel></rss>"#;
        let records = FeedParser::accept_feed(rss.to_string()).expect("accepted");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Monsoon & more"));
        assert_eq!(records[0].link.as_deref(), Some("https://news.example/a1"));
        assert_eq!(records[0].media_url.as_deref(), Some("https://img.example/a1.jpg"));
        assert!(records[0].published.is_some());
    }

    #[test]
    fn empty_or_broken_feed_is_rejected() {
        let empty = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>T</title></channel></rss>"#;
        assert!(FeedParser::accept_feed(empty.to_string()).is_none());
        assert!(FeedParser::accept_feed("<html>proxy error</html>".to_string()).is_none());
    }
}
