//! Response schema enforcement for issue triage answers

use serde_json::Value;

use crate::messages::{Severity, StructuredResult};
use crate::sanitize::strip_code_fences;

pub const REQUIRED_KEYS: [&str; 5] = [
    "issue",
    "explanation",
    "recommendation",
    "severity",
    "estimatedCost",
];

/// Why a candidate object was rejected. Logged, never shown to end users.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("model output is not valid JSON: {0}")]
    NotJson(String),

    #[error("model output is not a JSON object")]
    NotAnObject,

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("key '{0}' must be a string")]
    NotAString(&'static str),

    #[error("severity '{0}' is not one of low, medium, high")]
    InvalidSeverity(String),
}

/// Check a candidate object against the five-field shape
pub fn validate_structured(value: &Value) -> Result<StructuredResult, SchemaViolation> {
    let object = value.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let field = |key: &'static str| match object.get(key) {
        None | Some(Value::Null) => Err(SchemaViolation::MissingKey(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaViolation::NotAString(key)),
    };

    let issue = field("issue")?;
    let explanation = field("explanation")?;
    let recommendation = field("recommendation")?;
    let severity = field("severity")?;
    let estimated_cost = field("estimatedCost")?;

    let severity = Severity::parse(&severity).ok_or(SchemaViolation::InvalidSeverity(severity))?;

    Ok(StructuredResult {
        issue,
        explanation,
        recommendation,
        severity,
        estimated_cost,
    })
}

/// Total variant of `validate_structured`: anything invalid becomes the fallback
pub fn enforce_structured(value: &Value) -> StructuredResult {
    validate_structured(value).unwrap_or_else(|violation| {
        log::warn!("Structured result rejected: {}", violation);
        StructuredResult::fallback()
    })
}

/// Strip code fences from raw model output, parse it and validate the shape
pub fn parse_structured_text(raw: &str) -> Result<StructuredResult, SchemaViolation> {
    let stripped = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(stripped).map_err(|e| SchemaViolation::NotJson(e.to_string()))?;
    validate_structured(&value)
}
