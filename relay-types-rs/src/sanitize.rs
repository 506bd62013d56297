//! Stripping of incidental formatting around model output and image payloads

use once_cell::sync::Lazy;
use regex::Regex;

const FENCE: &str = "```";

static DATA_URI_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:[\w.+-]+/[\w.+-]+;base64,").expect("valid data URI pattern"));

/// Remove surrounding triple-backtick fences (with an optional language tag)
///
/// Applied until nothing changes. Whitespace is trimmed only around removed
/// fences, so text without fences comes back untouched.
pub fn strip_code_fences(text: &str) -> &str {
    let mut current = text;
    while let Some(next) = strip_fence_once(current) {
        current = next;
    }
    current
}

fn strip_fence_once(text: &str) -> Option<&str> {
    let mut stripped = text.trim();
    let mut fenced = false;

    if let Some(rest) = stripped.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '.')))
            .unwrap_or(rest.len());
        stripped = &rest[tag_len..];
        fenced = true;
    }

    if let Some(rest) = stripped.strip_suffix(FENCE) {
        stripped = rest;
        fenced = true;
    }

    fenced.then(|| stripped.trim())
}

/// Remove a leading `data:<mime>;base64,` prefix from an image payload
pub fn strip_data_uri_prefix(image: &str) -> &str {
    match DATA_URI_PREFIX.find(image) {
        Some(prefix) => &image[prefix.end()..],
        None => image,
    }
}
