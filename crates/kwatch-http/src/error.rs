//! Error types for kwatch transport operations.

use thiserror::Error;

/// Result type for kwatch transport operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while fetching or streaming resources.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    #[error("HTTP {status} {status_text}: {message}")]
    Http {
        status: u16,
        status_text: String,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection closed")]
    Closed,
}

impl ClientError {
    /// Build an HTTP error from a status code and an optional response body.
    ///
    /// Kubernetes-style servers return a `Status` object whose `message`
    /// field is more useful than the reason phrase, so it wins when present.
    pub fn from_status(status: u16, status_text: impl Into<String>, body: &[u8]) -> Self {
        let status_text = status_text.into();
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| status_text.clone());
        ClientError::Http {
            status,
            status_text,
            message,
        }
    }

    /// HTTP status carried by this error, if any.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}
