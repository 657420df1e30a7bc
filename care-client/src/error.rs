//! Client error types

use shared::ErrorCode;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server unreachable (connect failure or timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with an error envelope
    #[error("API error {code} ({status}): {message}")]
    Api {
        status: u16,
        code: u16,
        message: String,
    },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache snapshot could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller cancelled the read
    #[error("Request cancelled")]
    Cancelled,
}

impl ClientError {
    /// True when the server could not be reached at all
    ///
    /// Only these failures fall back to cached data; an answer from the
    /// server, even an error, is authoritative.
    pub fn is_network_failure(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server error code of an API error
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api { code, .. } => ErrorCode::try_from(*code).ok(),
            _ => None,
        }
    }

    /// 403 or 404: the cached copy must not be shown again
    pub fn is_definitive_absence(&self) -> bool {
        matches!(self.status(), Some(403 | 404))
    }

    /// 409: re-read and retry
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
