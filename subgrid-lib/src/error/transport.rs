//! Transport error types

use std::time::Duration;

/// Errors that can occur during any remote call (records, count,
/// metadata or timezone definitions).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP error response from the API.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// Network error during the call.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse the response.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },

    /// No bearer token could be obtained.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service reported a failure without an HTTP exchange.
    #[error("Service failure: {0}")]
    Service(String),
}

impl TransportError {
    /// Creates a new HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Creates a new service failure.
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
