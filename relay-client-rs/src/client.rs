//! HTTP client for the portal relay endpoints
//!
//! Every method is infallible from the caller's point of view: failures are
//! logged and replaced by the fixed fallback values.

use std::time::Duration;

use config_rs::framing::{EQUIPMENT_PHOTO_PROMPT, SITE_PHOTO_PROMPT};
use relay_types::{
    enforce_structured, strip_data_uri_prefix, ChatBody, ImageBody, IssueBody, LeaveBalance,
    LeaveBalanceBody, LeaveBalanceReply, StructuredResult, TextResult, FALLBACK_TEXT,
    LEAVE_LOOKUP_RETRY_MESSAGE,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub const CHAT_PATH: &str = "/api/chat";
pub const ANALYZE_IMAGE_PATH: &str = "/api/analyze-image";
pub const ANALYZE_ISSUE_PATH: &str = "/api/analyze-issue";
pub const LEAVE_BALANCE_PATH: &str = "/api/leave-balance";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Internal failure reasons; only ever logged
#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("relay answered HTTP {0}")]
    Status(u16),

    #[error("unreadable relay response: {0}")]
    Parse(String),

    #[error("relay reported failure: {0}")]
    Upstream(String),
}

/// A leave lookup that produced no balance. `message` is safe to show as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LeaveLookupFailure {
    pub message: String,
}

impl Default for LeaveLookupFailure {
    fn default() -> Self {
        Self {
            message: LEAVE_LOOKUP_RETRY_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RelayClientError> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RelayClientError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, RelayClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayClientError::Status(status.as_u16()));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| RelayClientError::Parse(e.to_string()))
    }

    async fn post_text<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> String {
        let result = self
            .post_json::<_, TextResult>(path, body)
            .await
            .and_then(|reply| match reply.error {
                Some(marker) => Err(RelayClientError::Upstream(marker)),
                None => Ok(reply.text),
            });

        result.unwrap_or_else(|err| {
            log::warn!("Relay call to {} failed: {}", path, err);
            FALLBACK_TEXT.to_string()
        })
    }

    /// Free-text question; answer text verbatim or `FALLBACK_TEXT`
    pub async fn ask_text(&self, prompt: &str) -> String {
        let body = ChatBody {
            prompt: prompt.to_string(),
            image: None,
            mime_type: None,
        };
        self.post_text(CHAT_PATH, &body).await
    }

    /// Question about a photo. A `data:` prefix on `image` is removed before sending.
    pub async fn ask_with_image(&self, prompt: &str, image: &str) -> String {
        let body = ChatBody {
            prompt: prompt.to_string(),
            image: Some(strip_data_uri_prefix(image.trim()).to_string()),
            mime_type: None,
        };
        self.post_text(CHAT_PATH, &body).await
    }

    /// Safety scan with the server-side default prompt
    pub async fn scan_image(&self, image: &str) -> String {
        let body = ImageBody {
            image: strip_data_uri_prefix(image.trim()).to_string(),
            mime_type: None,
            prompt: None,
        };
        self.post_text(ANALYZE_IMAGE_PATH, &body).await
    }

    pub async fn analyze_safety_image(&self, image: &str) -> String {
        self.ask_with_image(SITE_PHOTO_PROMPT, image).await
    }

    pub async fn inspect_equipment_image(&self, image: &str) -> String {
        self.ask_with_image(EQUIPMENT_PHOTO_PROMPT, image).await
    }

    /// Issue triage; whatever the server sends is validated again here
    pub async fn ask_issue(&self, description: &str) -> StructuredResult {
        let body = IssueBody {
            description: description.to_string(),
        };
        match self.post_json::<_, Value>(ANALYZE_ISSUE_PATH, &body).await {
            Ok(value) => enforce_structured(&value),
            Err(err) => {
                log::warn!("Relay call to {} failed: {}", ANALYZE_ISSUE_PATH, err);
                StructuredResult::fallback()
            }
        }
    }

    pub async fn lookup_leave(
        &self,
        name: &str,
        credential: &str,
    ) -> Result<LeaveBalance, LeaveLookupFailure> {
        let body = LeaveBalanceBody {
            name: name.to_string(),
            birth: credential.to_string(),
        };
        match self.post_json::<_, LeaveBalanceReply>(LEAVE_BALANCE_PATH, &body).await {
            Ok(LeaveBalanceReply::Found {
                name,
                remaining_days,
            }) => Ok(LeaveBalance {
                name,
                remaining_days,
            }),
            Ok(LeaveBalanceReply::NotFound { message }) => Err(LeaveLookupFailure { message }),
            Err(err) => {
                log::warn!("Relay call to {} failed: {}", LEAVE_BALANCE_PATH, err);
                Err(LeaveLookupFailure::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn relay_answering(route: &str, template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_ask_text_returns_answer_verbatim() {
        let server = relay_answering(
            CHAT_PATH,
            ResponseTemplate::new(200).set_body_json(json!({ "text": "  연차는 15일입니다.\n" })),
        )
        .await;
        let client = RelayClient::new(server.uri()).unwrap();

        assert_eq!(client.ask_text("연차 며칠?").await, "  연차는 15일입니다.\n");
    }

    #[tokio::test]
    async fn test_ask_text_failures_yield_fallback() {
        let cases = vec![
            ResponseTemplate::new(500).set_body_string("boom"),
            ResponseTemplate::new(200).set_body_string("not json"),
            ResponseTemplate::new(200)
                .set_body_json(json!({ "text": FALLBACK_TEXT, "error": "upstream_unavailable" })),
        ];

        for template in cases {
            let server = relay_answering(CHAT_PATH, template).await;
            let client = RelayClient::new(server.uri()).unwrap();
            assert_eq!(client.ask_text("hello").await, FALLBACK_TEXT);
        }
    }

    #[tokio::test]
    async fn test_unreachable_relay_yields_fallbacks() {
        let client = RelayClient::new("http://127.0.0.1:9").unwrap();
        assert_eq!(client.ask_text("hello").await, FALLBACK_TEXT);
        assert_eq!(client.ask_issue("leak").await, StructuredResult::fallback());
        assert_eq!(
            client.lookup_leave("홍길동", "900101").await,
            Err(LeaveLookupFailure::default())
        );
    }

    #[tokio::test]
    async fn test_image_prefix_is_stripped_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(body_json(json!({ "prompt": SITE_PHOTO_PROMPT, "image": "iVBORw0KGgo=" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "안전모 미착용" })))
            .expect(2)
            .mount(&server)
            .await;
        let client = RelayClient::new(server.uri()).unwrap();

        assert_eq!(
            client.analyze_safety_image("data:image/png;base64,iVBORw0KGgo=").await,
            "안전모 미착용"
        );
        assert_eq!(client.analyze_safety_image("iVBORw0KGgo=").await, "안전모 미착용");
    }

    #[tokio::test]
    async fn test_scan_image_sends_bare_image_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANALYZE_IMAGE_PATH))
            .and(body_json(json!({ "image": "iVBORw0KGgo=" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "이상 없음" })))
            .expect(1)
            .mount(&server)
            .await;
        let client = RelayClient::new(server.uri()).unwrap();

        assert_eq!(
            client.scan_image(" data:image/png;base64,iVBORw0KGgo= ").await,
            "이상 없음"
        );
    }

    #[tokio::test]
    async fn test_equipment_inspection_sends_its_own_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(body_json(json!({ "prompt": EQUIPMENT_PHOTO_PROMPT, "image": "iVBORw0KGgo=" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "벨트 마모" })))
            .expect(1)
            .mount(&server)
            .await;
        let client = RelayClient::new(server.uri()).unwrap();

        assert_eq!(
            client.inspect_equipment_image("data:image/jpeg;base64,iVBORw0KGgo=").await,
            "벨트 마모"
        );
    }

    #[tokio::test]
    async fn test_ask_issue_revalidates_server_answer() {
        let valid = json!({
            "issue": "컨베이어 소음",
            "explanation": "베어링 마모",
            "recommendation": "베어링 교체",
            "severity": "medium",
            "estimatedCost": "30만원"
        });
        let server = relay_answering(
            ANALYZE_ISSUE_PATH,
            ResponseTemplate::new(200).set_body_json(valid),
        )
        .await;
        let client = RelayClient::new(server.uri()).unwrap();
        let result = client.ask_issue("컨베이어에서 소음").await;
        assert_eq!(result.severity, relay_types::Severity::Medium);
        assert_eq!(result.estimated_cost, "30만원");

        let critical = json!({
            "issue": "x",
            "explanation": "x",
            "recommendation": "x",
            "severity": "critical",
            "estimatedCost": "x"
        });
        let server = relay_answering(
            ANALYZE_ISSUE_PATH,
            ResponseTemplate::new(200).set_body_json(critical),
        )
        .await;
        let client = RelayClient::new(server.uri()).unwrap();
        assert!(client.ask_issue("x").await.is_fallback());
    }

    #[tokio::test]
    async fn test_lookup_leave_replies() {
        let server = relay_answering(
            LEAVE_BALANCE_PATH,
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "found", "name": "홍길동", "remainingDays": "15" })),
        )
        .await;
        let client = RelayClient::new(format!("{}/", server.uri())).unwrap();
        assert_eq!(
            client.lookup_leave("홍길동", "900101").await,
            Ok(LeaveBalance {
                name: "홍길동".to_string(),
                remaining_days: "15".to_string(),
            })
        );

        let server = relay_answering(
            LEAVE_BALANCE_PATH,
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "notFound", "message": "다시 확인" })),
        )
        .await;
        let client = RelayClient::new(server.uri()).unwrap();
        assert_eq!(
            client.lookup_leave("홍길동", "999999").await.unwrap_err().message,
            "다시 확인"
        );
    }
}
