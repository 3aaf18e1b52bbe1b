use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Terminal failure of one stream session.
///
/// `Display` renders the text surfaced to the caller's error callback.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Non-success response. `detail` carries the server-provided message when
    /// the error body had one.
    #[error("{}", status_message(.status, .detail, .body))]
    Status {
        status: u16,
        detail: Option<String>,
        body: String,
    },

    #[error("no response body")]
    NoResponseBody,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error while reading stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

impl StreamError {
    /// Builds the error for a non-success response from its status and body.
    ///
    /// A JSON body with a `detail` field surfaces that field as the message;
    /// anything else falls back to a generic `HTTP <status>` description.
    #[must_use]
    pub fn from_error_body(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            detail: parse_error_detail(body),
            body: body.trim().to_owned(),
        }
    }

    #[must_use]
    pub fn transport(error: impl std::fmt::Display) -> Self {
        Self::Transport(error.to_string())
    }

    /// Human-readable detail message carried by the error body, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Extracts the `detail` field of a JSON error body.
///
/// String details are returned verbatim, structured ones as compact JSON.
pub fn parse_error_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    match parsed.detail? {
        Value::Null => None,
        Value::String(text) => non_empty(text),
        other => Some(other.to_string()),
    }
}

fn status_message(status: &u16, detail: &Option<String>, body: &str) -> String {
    if let Some(detail) = detail {
        return detail.clone();
    }
    if body.is_empty() {
        format!("HTTP {status}: request failed")
    } else {
        format!("HTTP {status}: {body}")
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
