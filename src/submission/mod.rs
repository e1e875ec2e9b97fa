//! Submission of uploaded files to the external scanning service.
//!
//! The pipeline always sends the original, unmodified upload (never a
//! composited preview) as a multipart `file` part to one of two endpoints:
//! the protected (scanning) endpoint or the unprotected one used for
//! comparison. The response is reduced to a [`SubmissionResult`].
//!
//! At most one submission is pending at a time. A submission is split into
//! [`SubmissionPipeline::begin`], [`SubmissionPipeline::execute`] and
//! [`SubmissionPipeline::complete`]; `complete` drops outcomes for stale
//! tickets and outcomes arriving after teardown.

pub mod error;
pub mod result;
pub mod transport;

pub use error::{SubmissionError, TransportError};
pub use result::{
    block_reason, ScanVerdict, SubmissionResult, SubmissionStatus, GENERIC_FAILURE_MESSAGE,
};
pub use transport::{HttpTransport, TransportResponse, UploadRequest, UploadTransport};

use crate::watermark::{sanitize_filename, FilenamePolicy};
use bytes::Bytes;
use std::path::Path;
use tracing::{info, warn};

/// Client-side cap on the protected path: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 << 20;

pub const DEFAULT_PROTECTED_PATH: &str = "/api/sdk/upload";
pub const DEFAULT_UNPROTECTED_PATH: &str = "/api/sdk/upload-vulnerable";

/// A user-selected file, exactly as uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub bytes: Bytes,
    /// Declared filename, untrusted.
    pub filename: String,
    /// Declared MIME type, if known.
    pub mime: Option<String>,
}

impl UploadFile {
    pub fn new(bytes: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Read a file from disk, naming it after its last path component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SubmissionError::Read(format!("{}: {}", path.display(), e)))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime_for_extension)
            .map(str::to_string);

        Ok(Self {
            bytes: Bytes::from(bytes),
            filename,
            mime,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "zip" => Some("application/zip"),
        _ => None,
    }
}

/// Where submissions go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub protected: String,
    pub unprotected: String,
}

impl Endpoints {
    pub fn new(base_url: &str, protected_path: &str, unprotected_path: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            protected: format!("{}{}", base, protected_path),
            unprotected: format!("{}{}", base, unprotected_path),
        }
    }

    pub fn select(&self, protected: bool) -> &str {
        if protected {
            &self.protected
        } else {
            &self.unprotected
        }
    }
}

/// Pipeline settings, usually built from configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub endpoints: Endpoints,
    pub max_upload_bytes: u64,
    pub filename_policy: FilenamePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::new(
                "http://localhost:8080",
                DEFAULT_PROTECTED_PATH,
                DEFAULT_UNPROTECTED_PATH,
            ),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            filename_policy: FilenamePolicy::default(),
        }
    }
}

/// Handle for one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub generation: u64,
    pub protected: bool,
    pub request: UploadRequest,
}

pub struct SubmissionPipeline<T: UploadTransport> {
    transport: T,
    options: PipelineOptions,
    current: Option<SubmissionResult>,
    generation: u64,
    closed: bool,
}

impl<T: UploadTransport> SubmissionPipeline<T> {
    pub fn new(transport: T, options: PipelineOptions) -> Self {
        Self {
            transport,
            options,
            current: None,
            generation: 0,
            closed: false,
        }
    }

    /// The latest result, pending or terminal.
    pub fn result(&self) -> Option<&SubmissionResult> {
        self.current.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.current.as_ref().is_some_and(SubmissionResult::is_pending)
    }

    /// Validate the upload locally and mark a new submission pending.
    ///
    /// Nothing is sent; a rejected upload leaves the previous result intact.
    pub fn begin(
        &mut self,
        file: &UploadFile,
        protected: bool,
    ) -> Result<SubmissionTicket, SubmissionError> {
        if self.closed {
            return Err(SubmissionError::Closed);
        }
        if self.is_in_flight() {
            return Err(SubmissionError::AlreadyInFlight);
        }

        let filename = match self.options.filename_policy {
            FilenamePolicy::Preserve => file.filename.clone(),
            FilenamePolicy::Sanitize => sanitize_filename(&file.filename),
        };
        if filename.is_empty() {
            return Err(SubmissionError::EmptyFilename);
        }
        if protected && file.size() > self.options.max_upload_bytes {
            warn!(
                filename = %filename,
                size = file.size(),
                limit = self.options.max_upload_bytes,
                "Upload rejected locally: file too large"
            );
            return Err(SubmissionError::FileTooLarge {
                size: file.size(),
                limit: self.options.max_upload_bytes,
            });
        }

        self.generation += 1;
        self.current = Some(SubmissionResult::pending());

        let url = self.options.endpoints.select(protected).to_string();
        info!(
            endpoint = %url,
            filename = %filename,
            size = file.size(),
            protected,
            "Submission started"
        );

        Ok(SubmissionTicket {
            generation: self.generation,
            protected,
            request: UploadRequest {
                url,
                filename,
                mime: file.mime.clone(),
                bytes: file.bytes.clone(),
            },
        })
    }

    /// Perform the round trip for `ticket`. Does not touch pipeline state.
    pub async fn execute(
        &self,
        ticket: &SubmissionTicket,
    ) -> Result<TransportResponse, TransportError> {
        self.transport.send(ticket.request.clone()).await
    }

    /// Record the outcome of `ticket`.
    ///
    /// Returns `false` when the ticket is stale or the pipeline was torn
    /// down; the outcome is then discarded.
    pub fn complete(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: Result<TransportResponse, TransportError>,
    ) -> bool {
        if self.closed || ticket.generation != self.generation || !self.is_in_flight() {
            tracing::debug!(
                ticket_generation = ticket.generation,
                generation = self.generation,
                closed = self.closed,
                "Discarding stale submission outcome"
            );
            return false;
        }

        if let Err(e) = &outcome {
            warn!(endpoint = %ticket.request.url, error = %e, "Submission transport failed");
        }
        let result = SubmissionResult::from_outcome(&outcome);
        info!(
            endpoint = %ticket.request.url,
            status = ?result.status,
            http_status = ?result.http_status,
            server_rejection = result.server_rejection,
            "Submission finished"
        );
        self.current = Some(result);
        true
    }

    /// Run a whole submission: validate, send, interpret.
    pub async fn submit(
        &mut self,
        file: &UploadFile,
        protected: bool,
    ) -> Result<SubmissionResult, SubmissionError> {
        let ticket = self.begin(file, protected)?;
        let outcome = self.execute(&ticket).await;
        if !self.complete(&ticket, outcome) {
            return Err(SubmissionError::Closed);
        }
        self.current.clone().ok_or(SubmissionError::Closed)
    }

    /// Stop accepting submissions and outcomes.
    pub fn teardown(&mut self) {
        self.closed = true;
        self.generation += 1;
    }
}
