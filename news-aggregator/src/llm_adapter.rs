use crate::config::GeminiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Fields the enrichment payload must carry, in wire (camelCase) form.
pub const PAYLOAD_FIELDS: [&str; 10] = [
    "fullArticle",
    "summaryShort",
    "summaryRomanUrdu",
    "summaryUrdu",
    "summaryHindi",
    "summaryTelugu",
    "fullArticleRomanUrdu",
    "fullArticleUrdu",
    "fullArticleHindi",
    "fullArticleTelugu",
];

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability not configured: {0}")]
    NotConfigured(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("empty response")]
    Empty,
}

/// How the generation output is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Provider-enforced JSON schema.
    Structured,
    /// Plain text with an instruction to answer with JSON only.
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub title: String,
    pub description: String,
    pub shape: ResponseFormat,
}

impl GenerationRequest {
    pub fn new(title: &str, description: &str, shape: ResponseFormat) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            shape,
        }
    }

    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "You are a news desk editor.\n\
             Source headline: \"{}\"\n\
             Source text: \"{}\"\n\n\
             1. Write a complete news article of 300 to 400 words in a neutral reporting style.\n\
             2. Write a summary of about 50 words covering the key facts.\n\
             3. Translate both the summary and the full article into Roman Urdu (Latin script), \
             Urdu (Nastaliq script), Hindi and Telugu.\n\n\
             Respond with one JSON object with the string fields: {}.",
            self.title,
            self.description,
            PAYLOAD_FIELDS.join(", ")
        );
        if self.shape == ResponseFormat::FreeText {
            prompt.push_str("\n\nReturn ONLY the JSON object. Do not wrap it in Markdown.");
        }
        prompt
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
}

/// Text generation collaborator.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    fn adapter_name(&self) -> String;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError>;
}

/// Text-to-speech collaborator. Returns base64-encoded audio.
#[async_trait]
pub trait SpeechCapability: Send + Sync {
    fn adapter_name(&self) -> String;

    async fn synthesize(&self, request: &SpeechRequest) -> Result<String, CapabilityError>;
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

/// Gemini `generateContent` REST adapter for both capabilities.
pub struct GeminiAdapter {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> Result<Self, CapabilityError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CapabilityError::NotConfigured("GEMINI_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn safety_settings() -> Value {
        json!([
            { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
            { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
            { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
            { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" }
        ])
    }

    fn payload_schema() -> Value {
        let properties: serde_json::Map<String, Value> = PAYLOAD_FIELDS
            .iter()
            .map(|field| (field.to_string(), json!({ "type": "STRING" })))
            .collect();
        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": PAYLOAD_FIELDS,
        })
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<GenerateContentResponse, CapabilityError> {
        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        );
        debug!("POST {}", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<GenerateContentResponse>().await?)
    }
}

#[async_trait]
impl GenerationCapability for GeminiAdapter {
    fn adapter_name(&self) -> String {
        format!("Gemini ({})", self.config.text_model)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        let mut generation_config = serde_json::Map::new();
        if request.shape == ResponseFormat::Structured {
            generation_config.insert("responseMimeType".to_string(), json!("application/json"));
            generation_config.insert("responseSchema".to_string(), Self::payload_schema());
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt() }] }],
            "generationConfig": generation_config,
            "safetySettings": Self::safety_settings(),
        });

        let response = self.generate_content(&self.config.text_model, body).await?;
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CapabilityError::Empty);
        }
        info!("Generated {} chars for \"{}\"", text.len(), request.title);
        Ok(text)
    }
}

#[async_trait]
impl SpeechCapability for GeminiAdapter {
    fn adapter_name(&self) -> String {
        format!("Gemini ({})", self.config.speech_model)
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<String, CapabilityError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": request.text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": request.voice }
                    }
                }
            },
            "safetySettings": Self::safety_settings(),
        });

        let response = self.generate_content(&self.config.speech_model, body).await?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
            .map(|inline| inline.data)
            .filter(|data| !data.is_empty())
            .ok_or(CapabilityError::Empty)
    }
}
