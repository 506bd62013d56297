//! Relay core: one upstream call per request, every failure turned into the
//! typed fallback of its request kind.

use std::sync::Arc;

use llm_client::{GenerationRequest, GenerativeModel};
use relay_types::schema::REQUIRED_KEYS;
use relay_types::{parse_structured_text, RelayRequest, RelayResponse, StructuredResult, TextResult};
use serde_json::{json, Map, Value};

use config_rs::framing::ISSUE_FRAMING;

/// Gemini `responseSchema` for issue triage (OpenAPI subset, upper-case types)
pub fn issue_response_schema() -> Value {
    let mut properties = Map::new();
    for key in REQUIRED_KEYS {
        properties.insert(key.to_string(), json!({ "type": "STRING" }));
    }
    properties.insert(
        "severity".to_string(),
        json!({ "type": "STRING", "enum": ["low", "medium", "high"] }),
    );

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": REQUIRED_KEYS,
    })
}

/// Map a relay request to its upstream call
///
/// `framing` applies to text and image queries; issue queries always carry
/// the triage framing and JSON response mode.
pub fn generation_request(request: &RelayRequest, framing: Option<&str>) -> GenerationRequest {
    let generation = match request {
        RelayRequest::TextQuery { prompt } => GenerationRequest::text(prompt.clone()),
        RelayRequest::ImageQuery {
            prompt,
            image_data,
            mime_type,
        } => GenerationRequest::image(prompt.clone(), mime_type.clone(), image_data.clone()),
        RelayRequest::IssueQuery { description } => {
            return GenerationRequest::text(format!("설비 이슈 분석: {}", description))
                .with_system(ISSUE_FRAMING)
                .expecting_json(issue_response_schema());
        }
    };

    match framing {
        Some(framing) => generation.with_system(framing),
        None => generation,
    }
}

#[derive(Clone)]
pub struct Relay {
    model: Arc<dyn GenerativeModel>,
}

impl Relay {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_configured()
    }

    /// Perform one relay operation. Never fails.
    pub async fn relay(&self, request: &RelayRequest, framing: Option<&str>) -> RelayResponse {
        let generation = generation_request(request, framing);
        let answer = self.model.generate(&generation).await;

        match request {
            RelayRequest::IssueQuery { .. } => {
                let result = answer
                    .map_err(|err| {
                        tracing::error!(error = %err, "Issue analysis upstream call failed");
                    })
                    .and_then(|raw| {
                        parse_structured_text(&raw).map_err(|violation| {
                            tracing::warn!(%violation, "Issue analysis answer rejected");
                        })
                    })
                    .unwrap_or_else(|_| StructuredResult::fallback());
                RelayResponse::Structured(result)
            }
            _ => match answer {
                Ok(text) => RelayResponse::Text(TextResult::new(text)),
                Err(err) => {
                    tracing::error!(error = %err, transport = err.is_transport(), "Upstream call failed");
                    RelayResponse::Text(TextResult::fallback())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_client::{PromptPart, ResponseFormat};

    #[test]
    fn test_issue_schema_requires_all_keys() {
        let schema = issue_response_schema();
        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["required"].as_array().map(Vec::len), Some(5));
        assert_eq!(schema["properties"]["estimatedCost"]["type"], "STRING");
        assert_eq!(schema["properties"]["severity"]["enum"][2], "high");
    }

    #[test]
    fn test_issue_queries_ignore_caller_framing() {
        let generation = generation_request(&RelayRequest::issue("유압 누유"), Some("other"));
        assert_eq!(generation.system_instruction.as_deref(), Some(ISSUE_FRAMING));
        assert!(matches!(generation.response_format, ResponseFormat::Json { .. }));
        assert_eq!(
            generation.parts,
            vec![PromptPart::Text("설비 이슈 분석: 유압 누유".to_string())]
        );
    }

    #[test]
    fn test_image_query_puts_image_before_prompt() {
        let request = RelayRequest::image("점검", "data:image/png;base64,AAAA", Some("image/png"));
        let generation = generation_request(&request, None);
        assert_eq!(generation.system_instruction, None);
        assert_eq!(
            generation.parts,
            vec![
                PromptPart::InlineImage {
                    mime_type: "image/png".to_string(),
                    data: "AAAA".to_string(),
                },
                PromptPart::Text("점검".to_string()),
            ]
        );
    }
}
