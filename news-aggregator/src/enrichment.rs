use crate::background::BackgroundWrites;
use crate::cache::MemoryCache;
use crate::llm_adapter::{
    CapabilityError, GenerationCapability, GenerationRequest, ResponseFormat, SpeechCapability, SpeechRequest,
};
use crate::traits::SharedStore;
use crate::types::EnrichmentPayload;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SPEECH_CHAR_LIMIT: usize = 4000;
const AUDIO_KEY_SAMPLE_CHARS: usize = 50;

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("nothing left to speak after cleaning the text")]
    EmptyText,
    #[error("speech capability is not configured")]
    SpeechUnavailable,
    #[error("speech synthesis failed: {0}")]
    Speech(#[from] CapabilityError),
}

/// Keyed enrichment with memory and shared-store caching.
pub struct EnrichmentGateway {
    generation: Option<Arc<dyn GenerationCapability>>,
    speech: Option<Arc<dyn SpeechCapability>>,
    shared: Option<Arc<dyn SharedStore>>,
    articles: Arc<MemoryCache<String, EnrichmentPayload>>,
    audio: Arc<MemoryCache<String, String>>,
    background: BackgroundWrites,
    voice: String,
}

impl EnrichmentGateway {
    pub fn new(background: BackgroundWrites, voice: &str) -> Self {
        Self {
            generation: None,
            speech: None,
            shared: None,
            articles: Arc::new(MemoryCache::new()),
            audio: Arc::new(MemoryCache::new()),
            background,
            voice: voice.to_string(),
        }
    }

    pub fn with_generation(mut self, generation: Arc<dyn GenerationCapability>) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechCapability>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_shared_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.shared = Some(store);
        self
    }

    pub fn with_memory(
        mut self,
        articles: Arc<MemoryCache<String, EnrichmentPayload>>,
        audio: Arc<MemoryCache<String, String>>,
    ) -> Self {
        self.articles = articles;
        self.audio = audio;
        self
    }

    /// Always returns a fully populated payload; generation failures end in
    /// the "unavailable" placeholder, which is never cached.
    pub async fn enhance(&self, id: &str, title: &str, description: &str) -> EnrichmentPayload {
        if let Some(payload) = self.articles.get(&id.to_string()).await {
            debug!("Enrichment memory hit for {}", id);
            return payload;
        }

        if let Some(store) = &self.shared {
            match store.enrichment(id).await {
                Ok(Some(payload)) => {
                    debug!("Enrichment shared-store hit for {}", id);
                    self.articles.insert(id.to_string(), payload.clone()).await;
                    return payload;
                }
                Ok(None) => {}
                Err(e) => warn!("Enrichment cache unavailable for {}: {}", id, e),
            }
        }

        match self.generate(title, description).await {
            Some(payload) => {
                info!("Enriched {}", id);
                self.articles.insert(id.to_string(), payload.clone()).await;
                if let Some(store) = &self.shared {
                    let store = store.clone();
                    let id = id.to_string();
                    let stored = payload.clone();
                    self.background.spawn("ai_articles_cache", async move {
                        store.upsert_enrichment(&id, &stored).await
                    });
                }
                payload
            }
            None => {
                warn!("Enrichment unavailable for {}, returning placeholder", id);
                EnrichmentPayload::unavailable(description)
            }
        }
    }

    async fn generate(&self, title: &str, description: &str) -> Option<EnrichmentPayload> {
        let generation = self.generation.as_ref()?;

        let structured = GenerationRequest::new(title, description, ResponseFormat::Structured);
        match generation.generate(&structured).await {
            Ok(text) => match parse_payload(&text) {
                Some(payload) => return Some(payload),
                None => warn!("Structured generation returned an unusable payload"),
            },
            Err(e) => warn!("Structured generation failed: {}", e),
        }

        let free_text = GenerationRequest::new(title, description, ResponseFormat::FreeText);
        match generation.generate(&free_text).await {
            Ok(text) => {
                let recovered = recover_json(&text);
                if recovered.is_none() {
                    warn!("Free-text generation could not be recovered as JSON");
                }
                recovered
            }
            Err(e) => {
                warn!("Free-text generation failed: {}", e);
                None
            }
        }
    }

    /// Base64 audio for `text`. Every failure is surfaced to the caller.
    pub async fn synthesize_audio(&self, text: &str) -> Result<String, EnrichmentError> {
        let key = audio_cache_key(text);

        if let Some(audio) = self.audio.get(&key).await {
            debug!("Audio memory hit");
            return Ok(audio);
        }

        if let Some(store) = &self.shared {
            match store.audio(&key).await {
                Ok(Some(audio)) => {
                    self.audio.insert(key, audio.clone()).await;
                    return Ok(audio);
                }
                Ok(None) => {}
                Err(e) => warn!("Audio cache unavailable: {}", e),
            }
        }

        let cleaned = sanitize_speech_text(text);
        if cleaned.is_empty() {
            return Err(EnrichmentError::EmptyText);
        }
        let speech_text: String = cleaned.chars().take(SPEECH_CHAR_LIMIT).collect();

        let speech = self.speech.as_ref().ok_or(EnrichmentError::SpeechUnavailable)?;
        let request = SpeechRequest {
            text: speech_text,
            voice: self.voice.clone(),
        };
        let audio = speech.synthesize(&request).await?;

        self.audio.insert(key.clone(), audio.clone()).await;
        if let Some(store) = &self.shared {
            let store = store.clone();
            let stored = audio.clone();
            self.background.spawn("ai_audio_cache", async move {
                store.upsert_audio(&key, &stored).await
            });
        }
        Ok(audio)
    }
}

/// Strict parse plus completeness check.
pub fn parse_payload(text: &str) -> Option<EnrichmentPayload> {
    serde_json::from_str::<EnrichmentPayload>(text.trim())
        .ok()
        .filter(EnrichmentPayload::is_complete)
}

/// Strict parse, then a fenced ```json block, then the outermost braces.
pub fn recover_json(text: &str) -> Option<EnrichmentPayload> {
    if let Some(payload) = parse_payload(text) {
        return Some(payload);
    }

    if let Some(payload) = FENCED_JSON
        .captures(text)
        .and_then(|caps| parse_payload(&caps[1]))
    {
        debug!("Recovered payload from fenced block");
        return Some(payload);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let recovered = parse_payload(&text[start..=end]);
    if recovered.is_some() {
        debug!("Recovered payload from outermost braces");
    }
    recovered
}

/// base64 of the first 50 chars of the trimmed text followed by the text
/// length in UTF-16 code units, so keys match rows written by web clients.
pub fn audio_cache_key(text: &str) -> String {
    let sample: String = text.trim().chars().take(AUDIO_KEY_SAMPLE_CHARS).collect();
    STANDARD.encode(format!("{}{}", sample, text.encode_utf16().count()))
}

/// Strip URLs and markup punctuation, collapse whitespace, drop quotes.
pub fn sanitize_speech_text(text: &str) -> String {
    let without_urls = URL.replace_all(text, "");
    let without_markup: String = without_urls
        .chars()
        .filter(|c| !matches!(c, '*' | '#' | '_' | '`' | '~' | '>' | '[' | ']' | '(' | ')' | '"'))
        .collect();
    without_markup.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Device voice locale for a language tab, used when the caller falls back
/// to on-device speech.
pub fn device_voice_lang(tab: &str) -> &'static str {
    match tab.trim().to_lowercase().as_str() {
        "urdu" => "ur-IN",
        "hindi" => "hi-IN",
        "telugu" => "te-IN",
        "roman" => "hi-IN",
        _ => "en-IN",
    }
}
