/// Text, URL and time helpers shared by the parsers and the normalizer.

/// URL utilities for feed sources
pub mod url {
    use url::Url;

    /// Short display label for a feed URL: `https://feeds.bbci.co.uk/...` → `BBCI`.
    pub fn source_label(url_str: &str) -> String {
        let host = match Url::parse(url_str) {
            Ok(url) => url.host_str().map(|h| h.to_string()),
            Err(_) => None,
        };

        let Some(host) = host else {
            return "RSS".to_string();
        };

        let host = host.strip_prefix("www.").unwrap_or(&host);
        let host = host.strip_prefix("feeds.").unwrap_or(host);
        match host.split('.').next() {
            Some(label) if !label.is_empty() => label.to_uppercase(),
            _ => "RSS".to_string(),
        }
    }

    /// Validate feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        if let Ok(url) = Url::parse(url_str) {
            url.scheme() == "http" || url.scheme() == "https"
        } else {
            false
        }
    }
}

/// Display-time formatting
pub mod time {
    use chrono::{DateTime, Duration, FixedOffset, Utc};

    pub const RECENT: &str = "Recent";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DisplayStyle {
        /// `14:05`
        Clock,
        /// `21/10/2024, 14:05:00`
        DateTime,
        /// `21/10/2024`
        Date,
    }

    pub fn format_display(
        published: Option<DateTime<Utc>>,
        offset: FixedOffset,
        style: DisplayStyle,
    ) -> String {
        let Some(published) = published else {
            return RECENT.to_string();
        };
        let local = published.with_timezone(&offset);
        let pattern = match style {
            DisplayStyle::Clock => "%H:%M",
            DisplayStyle::DateTime => "%d/%m/%Y, %H:%M:%S",
            DisplayStyle::Date => "%d/%m/%Y",
        };
        local.format(pattern).to_string()
    }

    /// An entry written at `written_at` is fresh strictly before `window` elapses.
    pub fn is_fresh(written_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(written_at) < window
    }

    pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// HTML fragment helpers
pub mod html {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static LINE_BREAK: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>|</div\s*>").expect("valid regex"));
    static ENTITY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex"));
    static IMG_SRC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"'>]+)["']"#).expect("valid regex"));
    static CSS_URL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"url\(['"]?(.*?)['"]?\)"#).expect("valid regex"));

    /// Reduce an HTML fragment to plain text, one paragraph per line.
    pub fn to_text(html: &str) -> String {
        let with_breaks = LINE_BREAK.replace_all(html, "\n");

        let stripped = with_breaks
            .chars()
            .fold((String::new(), false), |(mut text, in_tag), c| match c {
                '<' => (text, true),
                '>' => (text, false),
                _ if !in_tag => {
                    text.push(c);
                    (text, in_tag)
                }
                _ => (text, in_tag),
            })
            .0;

        decode_entities(&stripped)
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn decode_entities(text: &str) -> String {
        ENTITY
            .replace_all(text, |caps: &regex::Captures| {
                let entity = &caps[1];
                let decoded = if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok().and_then(char::from_u32)
                } else {
                    match entity {
                        "amp" => Some('&'),
                        "lt" => Some('<'),
                        "gt" => Some('>'),
                        "quot" => Some('"'),
                        "apos" => Some('\''),
                        "nbsp" => Some(' '),
                        _ => None,
                    }
                };
                decoded
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// First `<img src>` inside an HTML fragment.
    pub fn first_image_src(html: &str) -> Option<String> {
        IMG_SRC
            .captures(html)
            .map(|caps| decode_entities(&caps[1]))
    }

    /// URL inside a CSS `background-image:url(...)` declaration.
    pub fn css_background_url(style: &str) -> Option<String> {
        CSS_URL
            .captures(style)
            .map(|caps| decode_entities(&caps[1]))
            .filter(|url| !url.is_empty())
    }
}

/// Text processing utilities
pub mod text {
    /// Keep the first `max_chars` characters, appending `...` when cut.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
            None => text.to_string(),
        }
    }

    pub fn first_non_empty_line(text: &str) -> Option<&str> {
        text.lines().map(str::trim).find(|line| !line.is_empty())
    }

    /// Dedup key for titles: lowercase alphanumerics only.
    pub fn normalized_title_key(title: &str) -> String {
        title
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }
}
