use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single fetch, or of a fetch after all retries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}")]
    Status { status: StatusCode, body: String },

    #[error("Invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Response status, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Request(e) => e.status(),
            FetchError::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Response body truncated for logging, if one was received.
    pub fn body_excerpt(&self) -> Option<&str> {
        match self {
            FetchError::Status { body, .. } => Some(body.as_str()),
            FetchError::Exhausted { last, .. } => last.body_excerpt(),
            _ => None,
        }
    }
}
