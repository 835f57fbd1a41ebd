use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::models::ImagePayload;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("API key missing")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("status={status} body={body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("response contained no text")]
    EmptyResponse,
    #[error("response contained no image data")]
    NoImage,
}

/// One piece of a multimodal prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    Image(ImagePayload),
}

impl PromptPart {
    fn to_json(&self) -> Value {
        match self {
            PromptPart::Text(text) => json!({ "text": text }),
            PromptPart::Image(img) => json!({ "inlineData": { "mimeType": img.mime_type, "data": img.data } }),
        }
    }
}

/// A JSON-mode request constrained by a response schema.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub parts: Vec<PromptPart>,
    pub schema: Value,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
    /// Ground the answer with the Google Search tool.
    pub google_search: bool,
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub parts: Vec<PromptPart>,
    pub aspect_ratio: String,
}

#[derive(Debug, Clone)]
pub struct TextRequest {
    pub prompt: String,
}

/// The generation capability the orchestrator and studio features are written against.
#[async_trait]
pub trait GenerativeAi: Send + Sync {
    /// Returns the raw JSON text of the first candidate.
    async fn generate_structured(&self, req: StructuredRequest) -> Result<String, AiError>;
    /// Returns the first inline image of the response.
    async fn generate_image(&self, req: ImageRequest) -> Result<ImagePayload, AiError>;
    async fn generate_text(&self, req: TextRequest) -> Result<String, AiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
pub fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn preview(data: &str) -> String {
    if data.chars().nth(50).is_some() {
        format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), data.chars().count())
    } else {
        data.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    async fn perform_api_call(&self, model: &str, request_body: &Value) -> Result<GeminiResponse, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, api_key);

        info!("🔗 Making request to: {}", url.replace(api_key, "***"));

        let mut logged = request_body.clone();
        truncate_base64_in_json(&mut logged);
        info!("📤 Request body: {}", serde_json::to_string(&logged).unwrap_or_default());

        let response = self
            .client
            .post(&url)
            .json(request_body)
            .send()
            .await
            .map_err(|e| AiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(AiError::Status { status: status.as_u16(), body: error_body });
        }

        let response_text = response.text().await.map_err(|e| AiError::Http(e.to_string()))?;

        let truncated_response = if response_text.len() > 1000 {
            match serde_json::from_str::<Value>(&response_text) {
                Ok(mut json_value) => {
                    truncate_base64_in_json(&mut json_value);
                    serde_json::to_string(&json_value).unwrap_or_default()
                }
                Err(_) => format!("{}...", response_text.chars().take(1000).collect::<String>()),
            }
        } else {
            response_text.clone()
        };
        info!("📥 Raw Gemini API response: {}", truncated_response);

        serde_json::from_str(&response_text).map_err(|e| AiError::Decode(format!("parse error: {e}")))
    }
}

#[async_trait]
impl GenerativeAi for GeminiClient {
    async fn generate_structured(&self, req: StructuredRequest) -> Result<String, AiError> {
        let parts: Vec<Value> = req.parts.iter().map(PromptPart::to_json).collect();
        let mut generation_config = json!({
            "responseMimeType": "application/json",
            "responseSchema": req.schema,
        });
        if let Some(temperature) = req.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        let mut body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": generation_config,
        });
        if let Some(system) = &req.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if req.google_search {
            body["tools"] = json!([{ "googleSearch": {} }]);
        }

        info!("Generating structured JSON with {}...", self.text_model);
        let parsed = self.perform_api_call(&self.text_model, &body).await?;
        extract_text(&parsed).ok_or(AiError::EmptyResponse)
    }

    async fn generate_image(&self, req: ImageRequest) -> Result<ImagePayload, AiError> {
        let parts: Vec<Value> = req.parts.iter().map(PromptPart::to_json).collect();
        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": req.aspect_ratio },
                "candidateCount": 1
            }
        });

        info!("Generating image with {}...", self.image_model);
        let parsed = self.perform_api_call(&self.image_model, &body).await?;
        match extract_first_image(&parsed) {
            Some(image) => {
                info!("🖼️ Extracted {} image from API response: {}", image.mime_type, preview(&image.data));
                Ok(image)
            }
            None => {
                info!("⚠️ No image data found in API response");
                Err(AiError::NoImage)
            }
        }
    }

    async fn generate_text(&self, req: TextRequest) -> Result<String, AiError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": req.prompt }] }],
            "generationConfig": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": 450
            }
        });

        info!("Generating text with {}...", self.text_model);
        let parsed = self.perform_api_call(&self.text_model, &body).await?;
        extract_text(&parsed).map(|t| t.trim().to_string()).ok_or(AiError::EmptyResponse)
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default = "default_mime")]
    mime_type: String,
}

fn default_mime() -> String {
    "image/png".to_string()
}

/// Concatenated text parts of the first candidate.
fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let candidate = resp.candidates.first()?;
    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_first_image(resp: &GeminiResponse) -> Option<ImagePayload> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                if !inline_data.data.is_empty() {
                    return Some(ImagePayload::new(inline_data.data.clone(), inline_data.mime_type.clone()));
                }
            }
        }
    }
    None
}
