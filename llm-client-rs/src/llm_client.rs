// llm-client-rs/src/llm_client.rs
//
// HTTP client for the Gemini `generateContent` API
//
// One best-effort attempt per call; errors are classified so the relay can
// log them precisely before substituting a fallback.
//
// Configuration (via config-rs UpstreamConfig):
// - GEMINI_API_KEY: API key, may be absent (calls then fail with InvalidRequest)
// - GEMINI_API_URL: API base URL (defaults to generativelanguage.googleapis.com)
// - GEMINI_MODEL: model identifier (defaults to gemini-2.0-flash)
// - UPSTREAM_TIMEOUT_SECS: whole-request timeout (default: 30)

use async_trait::async_trait;
use config_rs::UpstreamConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{GenerationRequest, GenerativeModel, PromptPart, ResponseFormat};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

// Non-text parts (function calls, thoughts) deserialize with text = None
#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl From<&GenerationRequest> for GenerateContentRequest {
    fn from(request: &GenerationRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => Part::Text { text: text.clone() },
                PromptPart::InlineImage { mime_type, data } => Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.clone(),
                        data: data.clone(),
                    },
                },
            })
            .collect();

        let generation_config = match &request.response_format {
            ResponseFormat::Text => None,
            ResponseFormat::Json { schema } => Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema.clone(),
            }),
        };

        Self {
            system_instruction: request.system_instruction.as_ref().map(|framing| Content {
                role: None,
                parts: vec![Part::Text {
                    text: framing.clone(),
                }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config,
        }
    }
}

// Error type for upstream calls
// Transport problems and provider-side problems are kept apart for logging
#[derive(Debug, Clone, PartialEq)]
pub enum LLMError {
    InvalidRequest(String),    // 400, 401, 403, 404 or missing API key
    RateLimitExceeded(String), // 429, quota exhausted
    ServerError(String),       // 500, 502, 503, 504
    NetworkError(String),      // connection failures
    Timeout(String),           // the fixed upstream timeout expired
    ParseError(String),        // body is not a generateContent response
    EmptyResponse(String),     // no candidate text, usually a safety block
    UnknownError(String),
}

impl std::fmt::Display for LLMError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            LLMError::RateLimitExceeded(msg) => write!(f, "Rate limit exceeded: {}", msg),
            LLMError::ServerError(msg) => write!(f, "Server error: {}", msg),
            LLMError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LLMError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            LLMError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            LLMError::EmptyResponse(msg) => write!(f, "Empty response: {}", msg),
            LLMError::UnknownError(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for LLMError {}

impl LLMError {
    /// Transport-level failures, as opposed to the provider answering badly
    pub fn is_transport(&self) -> bool {
        matches!(self, LLMError::NetworkError(_) | LLMError::Timeout(_))
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl GeminiClient {
    /// Creates a client from the upstream section of the portal configuration
    ///
    /// A missing API key is accepted here; every call then fails at request
    /// time with `LLMError::InvalidRequest`.
    pub fn new(config: &UpstreamConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::UnknownError(format!("Failed to build HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            log::warn!("Gemini client created without an API key");
        }
        log::info!(
            "Gemini client initialized (model: {}, timeout: {:?})",
            config.model,
            config.timeout
        );

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_url, self.model)
    }

    // Execute the single request attempt
    async fn execute_request(&self, body: &GenerateContentRequest) -> Result<String, LLMError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LLMError::InvalidRequest("API key is not set".to_string()))?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LLMError::Timeout(format!("Request timed out: {}", err))
                } else if err.is_connect() {
                    LLMError::NetworkError(format!("Connection failed: {}", err))
                } else {
                    LLMError::NetworkError(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                400 => LLMError::InvalidRequest(format!("Bad request: {}", text)),
                401 => LLMError::InvalidRequest(format!("Unauthorized: {}", text)),
                403 => LLMError::InvalidRequest(format!("Forbidden: {}", text)),
                404 => LLMError::InvalidRequest(format!("Not found: {}", text)),
                429 => LLMError::RateLimitExceeded(text),
                500 | 502 | 503 | 504 => LLMError::ServerError(format!("({}): {}", status, text)),
                _ => LLMError::UnknownError(format!("({}): {}", status, text)),
            });
        }

        let data: GenerateContentResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                LLMError::Timeout(format!("Body read timed out: {}", err))
            } else {
                LLMError::ParseError(format!("Failed to parse response: {}", err))
            }
        })?;

        extract_text(data)
    }
}

// Concatenate the text parts of the first candidate
fn extract_text(data: GenerateContentResponse) -> Result<String, LLMError> {
    let block_reason = data.prompt_feedback.and_then(|feedback| feedback.block_reason);

    let Some(candidate) = data.candidates.into_iter().next() else {
        return Err(LLMError::EmptyResponse(match block_reason {
            Some(reason) => format!("prompt blocked ({})", reason),
            None => "no candidates returned".to_string(),
        }));
    };

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LLMError::EmptyResponse(format!(
            "candidate carried no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LLMError> {
        let body = GenerateContentRequest::from(request);

        log::debug!(
            "Sending generateContent request to {} ({} part(s))",
            self.endpoint(),
            request.parts.len()
        );

        match self.execute_request(&body).await {
            Ok(text) => {
                log::info!("Upstream answered with {} bytes", text.len());
                Ok(text)
            }
            Err(err) => {
                log::error!("Upstream call to model {} failed: {}", self.model, err);
                Err(err)
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
