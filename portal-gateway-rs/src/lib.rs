use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::{DefaultBodyLimit, State},
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use config_rs::framing::{CHAT_FRAMING, SAFETY_SCAN_PROMPT};
use config_rs::{ConfigError, PortalConfig};
use leave_lookup::{LeaveLookup, LookupError};
use llm_client::{GeminiClient, GenerativeModel, LLMError};
use relay_types::{
    ChatBody, ImageBody, IssueBody, LeaveBalanceBody, LeaveBalanceReply, RelayRequest, RelayResponse,
    StructuredResult,
};

pub mod relay;
pub mod validation;

use relay::Relay;
use validation::{
    is_validated_path, payload_limit_config, prepare_request, validate_content_type,
    ApiValidationError, ValidationErrorResponse, ANALYZE_IMAGE_PATH, ANALYZE_ISSUE_PATH, CHAT_PATH,
    LEAVE_BALANCE_PATH, MAX_PAYLOAD_SIZE,
};

pub const SERVICE_NAME: &str = "portal-gateway";

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
}

/// Startup failures of the gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create upstream client: {0}")]
    Upstream(#[from] LLMError),

    #[error("failed to create leave lookup: {0}")]
    Lookup(#[from] LookupError),
}

/// Core portal gateway state; immutable once built
pub struct PortalGateway {
    relay: Relay,
    leave: LeaveLookup,
    static_dir: PathBuf,
}

impl PortalGateway {
    pub fn new(model: Arc<dyn GenerativeModel>, leave: LeaveLookup, static_dir: impl Into<PathBuf>) -> Self {
        Lazy::force(&START_TIME);
        Self {
            relay: Relay::new(model),
            leave,
            static_dir: static_dir.into(),
        }
    }

    /// Build the production gateway: Gemini upstream and the published leave sheet
    pub fn from_config(config: &PortalConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let model = GeminiClient::new(&config.upstream)?;
        let leave = LeaveLookup::new(&config.leave, config.upstream.timeout)?;
        Ok(Self::new(Arc::new(model), leave, config.static_dir.clone()))
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>) -> Router {
        let spa = ServeDir::new(&self.static_dir)
            .fallback(ServeFile::new(self.static_dir.join("index.html")));

        Router::new()
            .route("/health", get(Self::health_handler))
            .route(CHAT_PATH, post(Self::chat_handler))
            .route(ANALYZE_IMAGE_PATH, post(Self::analyze_image_handler))
            .route(ANALYZE_ISSUE_PATH, post(Self::analyze_issue_handler))
            .route(LEAVE_BALANCE_PATH, post(Self::leave_balance_handler))
            .fallback_service(spa)
            // Content type is checked before the body is read
            .layer(middleware::from_fn(Self::validate_request_middleware))
            .layer(middleware::from_fn(Self::validate_content_type_middleware))
            .layer(payload_limit_config())
            .layer(DefaultBodyLimit::max(MAX_PAYLOAD_SIZE))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .with_state(self)
    }

    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        let status = if state.relay.is_configured() {
            "SERVING"
        } else {
            "DEGRADED"
        };

        Json(HealthResponse {
            healthy: true,
            service_name: SERVICE_NAME.to_string(),
            uptime_seconds: START_TIME.elapsed().as_secs() as i64,
            status: status.to_string(),
        })
    }

    async fn run_relay(&self, request: RelayRequest, framing: Option<&str>) -> Json<RelayResponse> {
        let span = tracing::info_span!("relay", request_id = %Uuid::new_v4(), kind = request.kind());
        async {
            tracing::info!("Relay request received");
            let response = self.relay.relay(&request, framing).await;
            tracing::info!(fallback = is_fallback(&response), "Relay request finished");
            Json(response)
        }
        .instrument(span)
        .await
    }

    async fn chat_handler(State(state): State<Arc<Self>>, Json(body): Json<ChatBody>) -> Json<RelayResponse> {
        state.run_relay(body.into_request(), Some(CHAT_FRAMING)).await
    }

    async fn analyze_image_handler(
        State(state): State<Arc<Self>>,
        Json(body): Json<ImageBody>,
    ) -> Json<RelayResponse> {
        state.run_relay(body.into_request(SAFETY_SCAN_PROMPT), None).await
    }

    async fn analyze_issue_handler(
        State(state): State<Arc<Self>>,
        Json(body): Json<IssueBody>,
    ) -> Json<RelayResponse> {
        state.run_relay(RelayRequest::issue(body.description), None).await
    }

    async fn leave_balance_handler(
        State(state): State<Arc<Self>>,
        Json(body): Json<LeaveBalanceBody>,
    ) -> Json<LeaveBalanceReply> {
        let request_id = Uuid::new_v4();
        match state.leave.lookup(&body.name, &body.birth).await {
            Ok(balance) => {
                tracing::info!(%request_id, "Leave balance found");
                Json(balance.into())
            }
            Err(err) => {
                match &err {
                    LookupError::NotFound | LookupError::EmptyInput => {
                        tracing::info!(%request_id, reason = %err, "Leave balance not found")
                    }
                    _ => tracing::error!(%request_id, error = %err, "Leave balance lookup failed"),
                }
                Json(LeaveBalanceReply::NotFound {
                    message: err.user_message().to_string(),
                })
            }
        }
    }

    async fn validate_content_type_middleware(
        req: axum::http::Request<Body>,
        next: Next,
    ) -> Result<Response, (StatusCode, Json<ValidationErrorResponse>)> {
        if req.method() != Method::POST || !is_validated_path(req.uri().path()) {
            return Ok(next.run(req).await);
        }

        if let Err(err) = validate_content_type(req.headers(), "application/json") {
            return reject(req.uri().path(), err);
        }

        Ok(next.run(req).await)
    }

    async fn validate_request_middleware(
        req: axum::http::Request<Body>,
        next: Next,
    ) -> Result<Response, (StatusCode, Json<ValidationErrorResponse>)> {
        let path = req.uri().path().to_string();
        if req.method() != Method::POST || !is_validated_path(&path) {
            return Ok(next.run(req).await);
        }

        let (mut parts, body) = req.into_parts();

        let sanitized_body = match sanitized_body(&path, body).await {
            Ok(bytes) => bytes,
            Err(err) => return reject(&path, err),
        };

        parts.headers.remove(CONTENT_LENGTH);
        parts
            .headers
            .insert(CONTENT_TYPE, axum::http::HeaderValue::from_static("application/json"));

        let request = axum::http::Request::from_parts(parts, Body::from(sanitized_body));
        Ok(next.run(request).await)
    }
}

/// Read, sanitize and validate a request body, returning the re-encoded JSON
async fn sanitized_body(path: &str, body: Body) -> Result<Vec<u8>, ApiValidationError> {
    let body_bytes = to_bytes(body, MAX_PAYLOAD_SIZE)
        .await
        .map_err(|e| ApiValidationError::PayloadTooLarge(format!("Failed to read request body: {}", e)))?;

    let body_str = std::str::from_utf8(&body_bytes)
        .map_err(|_| ApiValidationError::InvalidFormat("Request body is not valid UTF-8".to_string()))?;

    let payload = prepare_request(path, body_str)?;

    serde_json::to_vec(&payload).map_err(|err| {
        ApiValidationError::InvalidFormat(format!("Failed to serialize sanitized request: {}", err))
    })
}

/// Answer a rejected request body
///
/// Issue analysis always answers 200 with a structured object, so its
/// rejections become the fallback result; other endpoints get the 4xx error.
fn reject(path: &str, err: ApiValidationError) -> Result<Response, (StatusCode, Json<ValidationErrorResponse>)> {
    tracing::warn!(%path, error = %err, "Rejected request body");
    if path == ANALYZE_ISSUE_PATH {
        return Ok(Json(StructuredResult::fallback()).into_response());
    }
    Err(err.to_response())
}

fn is_fallback(response: &RelayResponse) -> bool {
    match response {
        RelayResponse::Structured(result) => result.is_fallback(),
        RelayResponse::Text(result) => result.is_fallback(),
    }
}
