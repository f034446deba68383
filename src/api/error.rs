//! Broker API errors

use thiserror::Error;

/// Errors returned by broker REST calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// Gateway answered but refused the request
    #[error("request rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },
    /// Connection, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Response body did not match the expected shape
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}
