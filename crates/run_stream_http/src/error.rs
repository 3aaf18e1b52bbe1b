use run_stream::StreamError;
use thiserror::Error;

use crate::retry::is_retryable_http_error;

#[derive(Debug, Error)]
pub enum HttpStreamError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Non-success status, missing body, cancellation.
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },
}

impl HttpStreamError {
    /// Whether opening the request again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(error) => error.is_connect() || error.is_timeout() || error.is_request(),
            Self::Stream(StreamError::Status { status, body, .. }) => {
                is_retryable_http_error(*status, body)
            }
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Stream(StreamError::Cancelled))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Stream(error) => error.status(),
            Self::Request(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

impl From<HttpStreamError> for StreamError {
    fn from(error: HttpStreamError) -> Self {
        match error {
            HttpStreamError::Stream(inner) => inner,
            HttpStreamError::Request(inner) => StreamError::transport(inner),
            other => StreamError::Other(other.to_string()),
        }
    }
}
