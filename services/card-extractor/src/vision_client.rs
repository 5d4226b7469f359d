//! Vision Extraction Client
//!
//! Sends a business-card image to an OpenRouter chat-completions endpoint and
//! parses the reply as `{"rows": [...]}`. A reply that is not valid JSON gets
//! exactly one repair round trip before the extraction is reported as failed.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use cardex_utils::{CardexError, CardexResult, OpenRouterConfig};

const DEFAULT_MIME_TYPE: &str = "image/jpeg";
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You extract contact data from business card images and answer with strict JSON only.

Input:
- One image per request. It may show several business cards.
- The user message carries file metadata (fileName, fileId, fileLink).

Output contract:
- Return ONLY a JSON object. No markdown, no code fences, no commentary.
- The object has exactly one key, "rows", whose value is an array.
- Every row object contains ALL of these fields:
  timestamp, fullName, jobTitle, company, phone1, phone2, email1, email2,
  website, address, notes, confidence, rawText, fileName, fileId, fileLink
- Use null for anything not visible on the card, never an empty string.
- Emails are lowercase.
- Phone numbers are digits only (drop +, spaces, hyphens and brackets).
- confidence is a number between 0 and 1, for example 0.82.
- rawText is a short transcription for audit, at most 300 characters.

One row per card. Deduplicate emails and phones within the same image.
If nothing usable is visible, return {"rows": []}.

Example:
{"rows": [{"timestamp": null, "fullName": "John Doe", "jobTitle": "Sales Manager",
  "company": "ABC Pvt Ltd", "phone1": "9876543210", "phone2": null,
  "email1": "john@abc.com", "email2": null, "website": "abc.com", "address": null,
  "notes": null, "confidence": 0.86, "rawText": "John Doe, Sales Manager, ABC Pvt Ltd",
  "fileName": "IMG_123.jpg", "fileId": "1a2b3c4d5e", "fileLink": null}]}
"#;

/// Provenance of the image being extracted, echoed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMeta {
    pub file_name: String,
    pub file_id: Option<String>,
    pub file_link: Option<String>,
}

/// One chat turn sent to the model endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    Image { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatMessage {
    fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text("system", text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text("user", text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text("assistant", text)
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// A chat-completion endpoint returning the assistant's text reply.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> CardexResult<String>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> CardexResult<String> {
        (**self).complete(model, messages).await
    }
}

/// Turns image bytes into raw row objects.
#[async_trait]
pub trait CardExtractor: Send + Sync {
    async fn extract(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        file_meta: &FileMeta,
        model: &str,
    ) -> CardexResult<Vec<Value>>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// HTTP client for OpenRouter chat completions.
pub struct OpenRouterClient {
    client: Client,
    api_url: String,
    api_key: String,
    app_title: String,
    max_retries: u32,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    backoff_base: Duration,
}

impl OpenRouterClient {
    pub fn new(config: &OpenRouterConfig) -> CardexResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CardexError::configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            app_title: config.app_title.clone(),
            max_retries: config.max_retries.max(1),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            backoff_base: Duration::from_secs(1),
        })
    }

    #[cfg(test)]
    /// Base of the exponential backoff; attempt `n` waits `base * 2^n`.
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Lightweight reachability probe used for health reporting.
    pub async fn check_connectivity(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/models", self.api_url))
            .bearer_auth(&self.api_key)
            .timeout(CONNECTIVITY_TIMEOUT)
            .send()
            .await;

        matches!(response, Ok(r) if r.status().is_success())
    }

    async fn send_once(&self, request: &ChatRequest<'_>) -> CardexResult<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", &self.app_title)
            .json(request)
            .send()
            .await
            .map_err(|e| CardexError::model_endpoint(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CardexError::model_endpoint(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CardexError::model_endpoint(format!("Malformed response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CardexError::model_endpoint("No response content"))
    }
}

#[async_trait]
impl ChatTransport for OpenRouterClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> CardexResult<String> {
        let request = ChatRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match self.send_once(&request).await {
                Ok(content) => return Ok(content),
                Err(error) => {
                    let wait = self.backoff_base * 2u32.pow(attempt);
                    warn!(
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        error = %error,
                        "openrouter_request_failed"
                    );
                    last_error = Some(error);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(CardexError::model_endpoint(format!(
            "OpenRouter API failed after {} attempts: {}",
            self.max_retries, reason
        )))
    }
}

/// Extraction protocol on top of any [`ChatTransport`].
pub struct VisionExtractor<T> {
    transport: T,
}

impl<T: ChatTransport> VisionExtractor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: ChatTransport> CardExtractor for VisionExtractor<T> {
    async fn extract(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        file_meta: &FileMeta,
        model: &str,
    ) -> CardexResult<Vec<Value>> {
        let mut messages = vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT.trim()),
            ChatMessage::user_parts(vec![
                ContentPart::Image {
                    image_url: ImageUrl {
                        url: image_data_url(image_bytes, mime_type),
                    },
                },
                ContentPart::Text {
                    text: user_instruction(file_meta),
                },
            ]),
        ];

        let raw_text = self.transport.complete(model, &messages).await?;
        let error = match parse_rows(&raw_text) {
            Ok(rows) => return Ok(rows),
            Err(error) => error,
        };

        warn!(file_name = %file_meta.file_name, error = %error, "json_parse_failed_retrying");
        messages.push(ChatMessage::assistant(raw_text));
        messages.push(ChatMessage::user(repair_instruction(&error)));

        let raw_text = self.transport.complete(model, &messages).await?;
        let rows = parse_rows(&raw_text).map_err(CardexError::invalid_model_output)?;
        debug!(file_name = %file_meta.file_name, rows = rows.len(), "json_repaired");
        Ok(rows)
    }
}

/// Parse a model reply into its `rows` array.
///
/// A single leading/trailing Markdown code fence is tolerated. The error
/// string describes the defect and is fed back to the model on repair.
pub fn parse_rows(raw: &str) -> Result<Vec<Value>, String> {
    let data: Value = serde_json::from_str(strip_code_fence(raw)).map_err(|e| e.to_string())?;

    let Value::Object(mut object) = data else {
        return Err("Top-level JSON must have a 'rows' key".to_string());
    };
    match object.remove("rows") {
        Some(Value::Array(rows)) => Ok(rows),
        Some(_) => Err("'rows' must be an array".to_string()),
        None => Err("Top-level JSON must have a 'rows' key".to_string()),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(fenced) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) together with the opening fence line.
    let body = match fenced.split_once('\n') {
        Some((_, rest)) => rest,
        None => fenced,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn image_data_url(image_bytes: &[u8], mime_type: &str) -> String {
    let mime_type = if mime_type.trim().is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        mime_type
    };
    format!("data:{};base64,{}", mime_type, BASE64.encode(image_bytes))
}

fn user_instruction(file_meta: &FileMeta) -> String {
    format!(
        "Extract contact data from this business card. \
         Metadata: fileName={}, fileId={}, fileLink={}. \
         Return ONLY valid JSON matching the schema.",
        file_meta.file_name,
        file_meta.file_id.as_deref().unwrap_or("null"),
        file_meta.file_link.as_deref().unwrap_or("null"),
    )
}

fn repair_instruction(error: &str) -> String {
    format!(
        "The JSON you provided was invalid. Error: {}\n\
         Please fix and return ONLY valid JSON with no additional text.",
        error
    )
}
