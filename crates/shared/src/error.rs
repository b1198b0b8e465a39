//! Shared error types including RFC7807 Problem Details.

use serde::Deserialize;
use thiserror::Error;

/// RFC7807 Problem Details (application/problem+json)
///
/// The room API may answer failed requests with this envelope; clients use it
/// to surface a readable reason instead of the raw body.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type", default)]
    pub type_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: u16,
    pub detail: Option<String>,
}

/// Attempt to parse an RFC7807 (or RFC7807-ish) JSON body into a user-facing message.
/// Prefers `detail`, falls back to `title`.
pub fn try_problem_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ProblemDetails>(body).ok()?;
    if let Some(detail) = parsed.detail {
        if !detail.trim().is_empty() {
            return Some(detail);
        }
    }
    if !parsed.title.trim().is_empty() {
        return Some(parsed.title);
    }
    None
}

/// A frame that could not be turned into a [`RoomEvent`](crate::RoomEvent).
///
/// Always recoverable: the connection skips the frame and keeps reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unknown event kind `{0}`")]
    UnknownKind(String),
    #[error("invalid `{kind}` payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

/// Connection-level failure. Terminal for the connection it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("read failed: {0}")]
    Read(String),
    #[error("connection closed by server{}", fmt_close_reason(.code, .reason))]
    ClosedByRemote { code: Option<u16>, reason: String },
    #[error("close failed: {0}")]
    Close(String),
}

fn fmt_close_reason(code: &Option<u16>, reason: &str) -> String {
    match (code, reason.is_empty()) {
        (Some(code), false) => format!(" ({code}: {reason})"),
        (Some(code), true) => format!(" ({code})"),
        (None, false) => format!(" ({reason})"),
        (None, true) => String::new(),
    }
}

fn fmt_http_body(body: &str) -> String {
    try_problem_detail(body).unwrap_or_else(|| body.to_string())
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {}", fmt_http_body(.body))]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_detail_prefers_detail_over_title() {
        let body = r#"{"type":"about:blank","title":"Not Found","status":404,"detail":"room not found"}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("room not found"));

        let body = r#"{"title":"Not Found","status":404,"detail":"  "}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("Not Found"));

        assert_eq!(try_problem_detail("plain text"), None);
    }

    #[test]
    fn http_error_displays_problem_detail() {
        let err = ApiError::Http {
            status: 404,
            body: r#"{"title":"Not Found","detail":"room not found"}"#.into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: room not found");

        let err = ApiError::Http {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }

    #[test]
    fn remote_close_display_includes_code() {
        let err = TransportError::ClosedByRemote {
            code: Some(1011),
            reason: "internal".into(),
        };
        assert_eq!(err.to_string(), "connection closed by server (1011: internal)");

        let err = TransportError::ClosedByRemote {
            code: None,
            reason: String::new(),
        };
        assert_eq!(err.to_string(), "connection closed by server");
    }
}
