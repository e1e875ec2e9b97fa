//! Upload transport seam.
//!
//! The pipeline only needs "send these bytes as a multipart `file` part and
//! give me the status and body back". [`HttpTransport`] does that with
//! reqwest; tests substitute a mock.

use super::error::{SubmissionError, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::debug;

/// Multipart field name the scanning service reads the upload from.
pub const FILE_FIELD: &str = "file";

/// A fully resolved upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    pub filename: String,
    pub mime: Option<String>,
    pub bytes: Bytes,
}

/// Raw HTTP response: status code and body, uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Send one upload and return the raw response.
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed multipart transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmissionError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(&self, request: UploadRequest) -> Result<TransportResponse, TransportError> {
        let mut part = Part::bytes(request.bytes.to_vec()).file_name(request.filename.clone());
        if let Some(mime) = request.mime.as_deref() {
            part = part
                .mime_str(mime)
                .map_err(|e| TransportError::Request(format!("Invalid MIME type {mime}: {e}")))?;
        }
        // Filenames go out as declared, like a browser form post.
        let form = Form::new().percent_encode_noop().part(FILE_FIELD, part);

        debug!(url = %request.url, bytes = request.bytes.len(), "Sending upload");
        let response = self.client.post(&request.url).multipart(form).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(TransportResponse { status, body })
    }
}
