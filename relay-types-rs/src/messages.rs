//! Wire types shared by the relay server and the relay client
//!
//! Field names follow the JSON contract of the portal front end (camelCase).

use serde::{Deserialize, Serialize};

use crate::sanitize::strip_data_uri_prefix;

/// Text returned in place of a model answer when anything on the path fails.
pub const FALLBACK_TEXT: &str = "서버 통신 오류";

/// Marker carried next to `FALLBACK_TEXT` by the server.
pub const UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";

pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Single user-facing message for every failed leave lookup.
pub const LEAVE_LOOKUP_RETRY_MESSAGE: &str =
    "일치하는 정보가 없습니다. 이름과 생년월일을 다시 확인해주세요.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Exact, lower-case match only. "High" or "critical" are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue triage answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResult {
    pub issue: String,
    pub explanation: String,
    pub recommendation: String,
    pub severity: Severity,
    pub estimated_cost: String,
}

impl StructuredResult {
    /// The fixed object substituted whenever a valid result cannot be produced
    pub fn fallback() -> Self {
        Self {
            issue: "Error".to_string(),
            explanation: "분석 실패".to_string(),
            recommendation: "재시도 요망".to_string(),
            severity: Severity::Low,
            estimated_cost: "0".to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

/// Free-text answer for chat and image requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResult {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TextResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_TEXT.to_string(),
            error: Some(UPSTREAM_UNAVAILABLE.to_string()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// One relayed request. Exactly one payload kind is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRequest {
    TextQuery {
        prompt: String,
    },
    ImageQuery {
        prompt: String,
        /// Bare base64, never carrying a `data:` prefix.
        image_data: String,
        mime_type: String,
    },
    IssueQuery {
        description: String,
    },
}

impl RelayRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        RelayRequest::TextQuery {
            prompt: prompt.into(),
        }
    }

    /// Build an image request, stripping any data-URI prefix from the payload
    pub fn image(prompt: impl Into<String>, image: &str, mime_type: Option<&str>) -> Self {
        let mime_type = mime_type
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_IMAGE_MIME_TYPE);

        RelayRequest::ImageQuery {
            prompt: prompt.into(),
            image_data: strip_data_uri_prefix(image.trim()).to_string(),
            mime_type: mime_type.to_string(),
        }
    }

    pub fn issue(description: impl Into<String>) -> Self {
        RelayRequest::IssueQuery {
            description: description.into(),
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RelayRequest::TextQuery { .. } => "text",
            RelayRequest::ImageQuery { .. } => "image",
            RelayRequest::IssueQuery { .. } => "issue",
        }
    }
}

/// Normalized answer of a relay operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelayResponse {
    Structured(StructuredResult),
    Text(TextResult),
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ChatBody {
    /// An `image` field switches the request to an image query
    pub fn into_request(self) -> RelayRequest {
        match self.image.as_deref().map(str::trim).filter(|i| !i.is_empty()) {
            Some(image) => RelayRequest::image(self.prompt.clone(), image, self.mime_type.as_deref()),
            None => RelayRequest::text(self.prompt),
        }
    }
}

/// Body of `POST /api/analyze-image`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBody {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ImageBody {
    pub fn into_request(self, default_prompt: &str) -> RelayRequest {
        let prompt = self
            .prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| default_prompt.to_string());
        RelayRequest::image(prompt, &self.image, self.mime_type.as_deref())
    }
}

/// Body of `POST /api/analyze-issue`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueBody {
    pub description: String,
}

/// Body of `POST /api/leave-balance`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveBalanceBody {
    pub name: String,
    /// Six-character credential, usually the birth date as YYMMDD.
    pub birth: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub name: String,
    pub remaining_days: String,
}

/// Reply of `POST /api/leave-balance`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LeaveBalanceReply {
    Found {
        name: String,
        #[serde(rename = "remainingDays")]
        remaining_days: String,
    },
    NotFound {
        message: String,
    },
}

impl LeaveBalanceReply {
    pub fn not_found() -> Self {
        LeaveBalanceReply::NotFound {
            message: LEAVE_LOOKUP_RETRY_MESSAGE.to_string(),
        }
    }
}

impl From<LeaveBalance> for LeaveBalanceReply {
    fn from(balance: LeaveBalance) -> Self {
        LeaveBalanceReply::Found {
            name: balance.name,
            remaining_days: balance.remaining_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_result_uses_camel_case_and_lowercase_severity() {
        let value = serde_json::to_value(StructuredResult::fallback()).unwrap();
        assert_eq!(
            value,
            json!({
                "issue": "Error",
                "explanation": "분석 실패",
                "recommendation": "재시도 요망",
                "severity": "low",
                "estimatedCost": "0"
            })
        );
    }

    #[test]
    fn test_severity_parse_is_exact() {
        assert_eq!(Severity::parse("medium"), Some(Severity::Medium));
        assert_eq!(Severity::parse("High"), None);
        assert_eq!(Severity::parse("critical"), None);
        assert_eq!(Severity::High.to_string(), "high");
    }

    #[test]
    fn test_text_result_omits_error_unless_fallback() {
        let ok = serde_json::to_value(TextResult::new("안녕하세요")).unwrap();
        assert_eq!(ok, json!({ "text": "안녕하세요" }));

        let failed = serde_json::to_value(TextResult::fallback()).unwrap();
        assert_eq!(failed["text"], FALLBACK_TEXT);
        assert_eq!(failed["error"], UPSTREAM_UNAVAILABLE);
    }

    #[test]
    fn test_chat_body_selects_request_kind() {
        let text: ChatBody = serde_json::from_value(json!({ "prompt": "연차 규정?" })).unwrap();
        assert_eq!(text.into_request(), RelayRequest::text("연차 규정?"));

        let blank_image: ChatBody =
            serde_json::from_value(json!({ "prompt": "hi", "image": "  " })).unwrap();
        assert_eq!(blank_image.into_request().kind(), "text");

        let image: ChatBody = serde_json::from_value(json!({
            "prompt": "점검",
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "mimeType": "image/png"
        }))
        .unwrap();
        assert_eq!(
            image.into_request(),
            RelayRequest::ImageQuery {
                prompt: "점검".to_string(),
                image_data: "iVBORw0KGgo=".to_string(),
                mime_type: "image/png".to_string(),
            }
        );
    }

    #[test]
    fn test_image_body_defaults() {
        let body: ImageBody = serde_json::from_value(json!({ "image": "/9j/4AAQ" })).unwrap();
        match body.into_request("기본 프롬프트") {
            RelayRequest::ImageQuery { prompt, mime_type, .. } => {
                assert_eq!(prompt, "기본 프롬프트");
                assert_eq!(mime_type, DEFAULT_IMAGE_MIME_TYPE);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_leave_reply_shapes() {
        let found: LeaveBalanceReply = LeaveBalance {
            name: "홍길동".to_string(),
            remaining_days: "15".to_string(),
        }
        .into();
        assert_eq!(
            serde_json::to_value(&found).unwrap(),
            json!({ "status": "found", "name": "홍길동", "remainingDays": "15" })
        );
        assert_eq!(
            serde_json::to_value(LeaveBalanceReply::not_found()).unwrap(),
            json!({ "status": "notFound", "message": LEAVE_LOOKUP_RETRY_MESSAGE })
        );
    }

    #[test]
    fn test_relay_response_untagged() {
        let parsed: RelayResponse = serde_json::from_value(json!({ "text": "ok" })).unwrap();
        assert_eq!(parsed, RelayResponse::Text(TextResult::new("ok")));
    }
}
