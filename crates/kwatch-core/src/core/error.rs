//! Error types for watch operations.

use kwatch_http::ClientError;
use thiserror::Error;

/// Result type for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Callback receiving the error that ended a subscription during setup.
pub type ErrorCallback = Box<dyn FnOnce(WatchError) + Send + 'static>;

/// Errors surfaced to watch consumers.
///
/// Only setup failures reach consumers; failures of an established stream
/// are retried.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WatchError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Invalid item name: {0:?}")]
    InvalidName(String),
}

impl WatchError {
    /// HTTP status of the failed request, if there was one.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            WatchError::Client(e) => e.status(),
            WatchError::InvalidName(_) => None,
        }
    }
}
