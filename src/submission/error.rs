//! Error types for the submission pipeline

use thiserror::Error;

/// Rejections raised before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("No selected file")]
    EmptyFilename,

    #[error("A submission is already in progress")]
    AlreadyInFlight,

    #[error("Submission pipeline has been torn down")]
    Closed,

    #[error("Failed to read upload: {0}")]
    Read(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Failures of the HTTP round trip itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}
