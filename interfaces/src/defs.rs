use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed content partitions. Each one decides which sources are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Posts scraped from the public Telegram channel.
    Studio,
    Hyderabad,
    Telangana,
    India,
    International,
    Sports,
    /// Curated posts stored directly in the shared store.
    Gallery,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Studio,
        Category::Hyderabad,
        Category::Telangana,
        Category::India,
        Category::International,
        Category::Sports,
        Category::Gallery,
    ];

    /// Stable key used for cache entries and store rows.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Studio => "studio",
            Category::Hyderabad => "hyderabad",
            Category::Telangana => "telangana",
            Category::India => "india",
            Category::International => "international",
            Category::Sports => "sports",
            Category::Gallery => "gallery",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Studio => "Studio",
            Category::Hyderabad => "Hyderabad",
            Category::Telangana => "Telangana",
            Category::India => "India",
            Category::International => "International",
            Category::Sports => "Sports",
            Category::Gallery => "Gallery",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.key() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Animation,
    #[default]
    None,
}

/// Canonical unit flowing through the pipeline.
///
/// Items are value objects: every cache tier stores its own copy and hands
/// out clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub source: String,
    /// Display-formatted publish time, `"Recent"` when unknown.
    pub timestamp: String,
    /// Card-sized prefix of `content`.
    pub description: String,
    pub content: String,
    pub category: Category,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
}

/// Target languages of the enrichment payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationLanguage {
    RomanUrdu,
    Urdu,
    Hindi,
    Telugu,
}

impl TranslationLanguage {
    pub const ALL: [TranslationLanguage; 4] = [
        TranslationLanguage::RomanUrdu,
        TranslationLanguage::Urdu,
        TranslationLanguage::Hindi,
        TranslationLanguage::Telugu,
    ];

    /// "Translation unavailable" in the language itself.
    pub fn unavailable_text(&self) -> &'static str {
        match self {
            TranslationLanguage::RomanUrdu => "Tarjuma dastiyab nahi hai.",
            TranslationLanguage::Urdu => "ترجمہ دستیاب نہیں ہے۔",
            TranslationLanguage::Hindi => "अनुवाद उपलब्ध नहीं है।",
            TranslationLanguage::Telugu => "అనువాదం అందుబాటులో లేదు.",
        }
    }
}

pub const CONTENT_UNAVAILABLE: &str = "Content currently unavailable. Please check back later.";
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable.";

/// AI-generated article text with translated variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentPayload {
    pub full_article: String,
    pub summary_short: String,
    pub summary_roman_urdu: String,
    pub summary_urdu: String,
    pub summary_hindi: String,
    pub summary_telugu: String,
    pub full_article_roman_urdu: String,
    pub full_article_urdu: String,
    pub full_article_hindi: String,
    pub full_article_telugu: String,
}

impl EnrichmentPayload {
    /// Placeholder returned when generation failed on every attempt.
    pub fn unavailable(description: &str) -> Self {
        let description = description.trim();
        let or_default = |fallback: &str| {
            if description.is_empty() {
                fallback.to_string()
            } else {
                description.to_string()
            }
        };

        Self {
            full_article: or_default(CONTENT_UNAVAILABLE),
            summary_short: or_default(SUMMARY_UNAVAILABLE),
            summary_roman_urdu: TranslationLanguage::RomanUrdu.unavailable_text().to_string(),
            summary_urdu: TranslationLanguage::Urdu.unavailable_text().to_string(),
            summary_hindi: TranslationLanguage::Hindi.unavailable_text().to_string(),
            summary_telugu: TranslationLanguage::Telugu.unavailable_text().to_string(),
            full_article_roman_urdu: TranslationLanguage::RomanUrdu.unavailable_text().to_string(),
            full_article_urdu: TranslationLanguage::Urdu.unavailable_text().to_string(),
            full_article_hindi: TranslationLanguage::Hindi.unavailable_text().to_string(),
            full_article_telugu: TranslationLanguage::Telugu.unavailable_text().to_string(),
        }
    }

    pub fn summary(&self, language: TranslationLanguage) -> &str {
        match language {
            TranslationLanguage::RomanUrdu => &self.summary_roman_urdu,
            TranslationLanguage::Urdu => &self.summary_urdu,
            TranslationLanguage::Hindi => &self.summary_hindi,
            TranslationLanguage::Telugu => &self.summary_telugu,
        }
    }

    pub fn full_article_in(&self, language: TranslationLanguage) -> &str {
        match language {
            TranslationLanguage::RomanUrdu => &self.full_article_roman_urdu,
            TranslationLanguage::Urdu => &self.full_article_urdu,
            TranslationLanguage::Hindi => &self.full_article_hindi,
            TranslationLanguage::Telugu => &self.full_article_telugu,
        }
    }

    /// True when every field carries text.
    pub fn is_complete(&self) -> bool {
        !self.full_article.trim().is_empty()
            && !self.summary_short.trim().is_empty()
            && TranslationLanguage::ALL.iter().all(|lang| {
                !self.summary(*lang).trim().is_empty()
                    && !self.full_article_in(*lang).trim().is_empty()
            })
    }
}

/// Media kinds the ingester archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMediaType {
    Photo,
    Video,
    Animation,
}

impl ArchiveMediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveMediaType::Photo => "photo",
            ArchiveMediaType::Video => "video",
            ArchiveMediaType::Animation => "animation",
        }
    }

    /// Accepts the stored column value; `"image"` is an older alias of photo.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "photo" | "image" => Some(ArchiveMediaType::Photo),
            "video" => Some(ArchiveMediaType::Video),
            "animation" => Some(ArchiveMediaType::Animation),
            _ => None,
        }
    }
}

/// A channel post as written by the ingester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPostRecord {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    pub media_url: Option<String>,
    pub media_type: Option<ArchiveMediaType>,
}

/// An archived channel post as read back from the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedPost {
    pub id: i64,
    pub title: Option<String>,
    pub message: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryPost {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGalleryPost {
    pub title: String,
    pub description: String,
    pub media_url: String,
}
