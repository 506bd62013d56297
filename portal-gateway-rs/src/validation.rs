//! Portal Gateway Input Validation
//!
//! Request bodies of the relay endpoints are checked here before any handler
//! runs. A body that fails these checks is a client bug and is answered with
//! a 4xx `ValidationErrorResponse`; upstream trouble never surfaces here.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use jsonschema::{Draft, JSONSchema};
use regex::Regex;
use serde_json::{json, Value};

/// Maximum request payload size (10MB), enough for a phone photo in base64
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

pub const CHAT_PATH: &str = "/api/chat";
pub const ANALYZE_IMAGE_PATH: &str = "/api/analyze-image";
pub const ANALYZE_ISSUE_PATH: &str = "/api/analyze-issue";
pub const LEAVE_BALANCE_PATH: &str = "/api/leave-balance";

fn compile(schema: Value) -> JSONSchema {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .expect("Invalid schema")
}

lazy_static::lazy_static! {
    /// Schema for chat requests, optionally carrying a photo
    pub static ref CHAT_REQUEST_SCHEMA: JSONSchema = compile(json!({
        "type": "object",
        "required": ["prompt"],
        "properties": {
            "prompt": { "type": "string", "minLength": 1 },
            "image": { "type": ["string", "null"] },
            "mimeType": { "type": ["string", "null"], "maxLength": 64 }
        }
    }));

    /// Schema for the safety image scan
    pub static ref ANALYZE_IMAGE_REQUEST_SCHEMA: JSONSchema = compile(json!({
        "type": "object",
        "required": ["image"],
        "properties": {
            "image": { "type": "string", "minLength": 1 },
            "prompt": { "type": ["string", "null"] },
            "mimeType": { "type": ["string", "null"], "maxLength": 64 }
        }
    }));

    pub static ref ANALYZE_ISSUE_REQUEST_SCHEMA: JSONSchema = compile(json!({
        "type": "object",
        "required": ["description"],
        "properties": {
            "description": { "type": "string", "minLength": 1 }
        }
    }));

    pub static ref LEAVE_BALANCE_REQUEST_SCHEMA: JSONSchema = compile(json!({
        "type": "object",
        "required": ["name", "birth"],
        "properties": {
            "name": { "type": "string", "minLength": 1, "maxLength": 64 },
            "birth": { "type": "string", "minLength": 1, "maxLength": 64 }
        }
    }));

    static ref IMAGE_MIME_TYPE: Regex =
        Regex::new(r"^image/[A-Za-z0-9.+-]+$").expect("Invalid mime type pattern");
}

/// Error response for validation failures
#[derive(Debug, serde::Serialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub code: u16,
    pub details: Option<Vec<String>>,
}

/// Validation error for API requests
#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Schema validation error")]
    Schema(Vec<String>),
}

impl ApiValidationError {
    /// Convert to HTTP status code and error response
    pub fn to_response(&self) -> (StatusCode, Json<ValidationErrorResponse>) {
        let status = match self {
            Self::InvalidFormat(_) | Self::Schema(_) => StatusCode::BAD_REQUEST,
            Self::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        };

        let details = match self {
            Self::Schema(details) => Some(details.clone()),
            _ => None,
        };

        (
            status,
            Json(ValidationErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
                details,
            }),
        )
    }
}

/// Paths whose POST bodies are validated
pub fn is_validated_path(path: &str) -> bool {
    schema_for(path).is_some()
}

fn schema_for(path: &str) -> Option<&'static JSONSchema> {
    match path {
        CHAT_PATH => Some(&*CHAT_REQUEST_SCHEMA),
        ANALYZE_IMAGE_PATH => Some(&*ANALYZE_IMAGE_REQUEST_SCHEMA),
        ANALYZE_ISSUE_PATH => Some(&*ANALYZE_ISSUE_REQUEST_SCHEMA),
        LEAVE_BALANCE_PATH => Some(&*LEAVE_BALANCE_REQUEST_SCHEMA),
        _ => None,
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "Expected content type '{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Validate JSON payload against the schema of its endpoint
pub fn validate_json_schema(path: &str, json: &Value) -> Result<(), ApiValidationError> {
    let schema = schema_for(path).ok_or_else(|| {
        ApiValidationError::InvalidFormat(format!("No schema defined for path: {}", path))
    })?;

    if let Err(errors) = schema.validate(json) {
        let details: Vec<String> = errors
            .map(|err| {
                let at = err.instance_path.to_string();
                if at.is_empty() {
                    err.to_string()
                } else {
                    format!("{} at {}", err, at)
                }
            })
            .collect();
        return Err(ApiValidationError::Schema(details));
    }

    Ok(())
}

/// Parse a raw body into JSON
pub fn sanitize_json_input(json_str: &str) -> Result<Value, ApiValidationError> {
    if json_str.len() > MAX_PAYLOAD_SIZE {
        return Err(ApiValidationError::PayloadTooLarge(format!(
            "Payload size ({} bytes) exceeds maximum allowed size ({} bytes)",
            json_str.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    serde_json::from_str::<Value>(json_str.trim())
        .map_err(|e| ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e)))
}

/// Trim every string and remove NUL bytes, recursively
pub fn sanitize_json_object(value: &mut Value) {
    match value {
        Value::String(s) => {
            let cleaned = s.trim().replace('\u{0000}', "");
            if &cleaned != s {
                *s = cleaned;
            }
        }
        Value::Array(arr) => {
            for item in arr {
                sanitize_json_object(item);
            }
        }
        Value::Object(obj) => {
            for (_, val) in obj {
                sanitize_json_object(val);
            }
        }
        _ => {}
    }
}

/// Generate middleware config for payload limits
pub fn payload_limit_config() -> tower_http::limit::RequestBodyLimitLayer {
    tower_http::limit::RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE)
}

/// Validate an already sanitized request by path
pub fn validate_request(path: &str, payload: &Value) -> Result<(), ApiValidationError> {
    validate_json_schema(path, payload)?;

    if matches!(path, CHAT_PATH | ANALYZE_IMAGE_PATH) {
        if let Some(Value::String(mime_type)) = payload.get("mimeType") {
            if !mime_type.is_empty() && !IMAGE_MIME_TYPE.is_match(mime_type) {
                return Err(ApiValidationError::InvalidFormat(format!(
                    "Invalid mimeType '{}': expected image/<subtype>",
                    mime_type
                )));
            }
        }
    }

    Ok(())
}

/// Sanitize, then validate; returns the body handlers will see
pub fn prepare_request(path: &str, body: &str) -> Result<Value, ApiValidationError> {
    let mut payload = sanitize_json_input(body)?;
    sanitize_json_object(&mut payload);
    validate_request(path, &payload)?;
    Ok(payload)
}
