pub mod messages;
pub mod schema;
pub mod sanitize;

pub use messages::{
    ChatBody, ImageBody, IssueBody, LeaveBalance, LeaveBalanceBody, LeaveBalanceReply, RelayRequest,
    RelayResponse, Severity, StructuredResult, TextResult, DEFAULT_IMAGE_MIME_TYPE, FALLBACK_TEXT,
    LEAVE_LOOKUP_RETRY_MESSAGE, UPSTREAM_UNAVAILABLE,
};
pub use sanitize::{strip_code_fences, strip_data_uri_prefix};
pub use schema::{enforce_structured, parse_structured_text, validate_structured, SchemaViolation};
