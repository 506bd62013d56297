//! Upstream generative-model access for the portal relay
//!
//! The relay server only sees the `GenerativeModel` trait; `GeminiClient` is
//! the production implementation.

use async_trait::async_trait;
use serde_json::Value;

pub mod llm_client;

pub use llm_client::{GeminiClient, LLMError};

/// One piece of user content sent upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    InlineImage { mime_type: String, data: String },
}

/// Shape the model is asked to answer in
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// JSON output constrained by an OpenAPI-style schema object.
    Json { schema: Value },
}

/// A single generate call: optional system framing plus user parts
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub parts: Vec<PromptPart>,
    pub response_format: ResponseFormat,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            parts: vec![PromptPart::Text(prompt.into())],
            response_format: ResponseFormat::Text,
        }
    }

    /// Image first, then the instruction text
    pub fn image(prompt: impl Into<String>, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            parts: vec![
                PromptPart::InlineImage {
                    mime_type: mime_type.into(),
                    data: data.into(),
                },
                PromptPart::Text(prompt.into()),
            ],
            response_format: ResponseFormat::Text,
        }
    }

    pub fn with_system(mut self, framing: impl Into<String>) -> Self {
        self.system_instruction = Some(framing.into());
        self
    }

    pub fn expecting_json(mut self, schema: Value) -> Self {
        self.response_format = ResponseFormat::Json { schema };
        self
    }
}

/// Anything able to turn a `GenerationRequest` into raw model text
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LLMError>;

    /// Whether credentials are present; calls fail fast when they are not
    fn is_configured(&self) -> bool {
        true
    }
}
