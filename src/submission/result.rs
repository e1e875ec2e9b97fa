//! Reducing an HTTP round trip to a submission result.

use super::error::TransportError;
use super::transport::TransportResponse;
use serde::Serialize;
use serde_json::Value;

/// Message shown for every failure that carries no server-provided reason.
pub const GENERIC_FAILURE_MESSAGE: &str = "Upload failed";

/// Keys that may carry a human-readable block reason, in lookup order.
const REASON_KEYS: [&str; 3] = ["reason", "message", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub status: SubmissionStatus,
    /// Response body, verbatim, on success.
    pub payload: Option<Value>,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// The server answered and refused the file. Distinct from a failed
    /// round trip.
    pub server_rejection: bool,
}

impl SubmissionResult {
    pub fn pending() -> Self {
        Self {
            status: SubmissionStatus::Pending,
            payload: None,
            error_message: None,
            http_status: None,
            server_rejection: false,
        }
    }

    fn succeeded(payload: Value, http_status: u16) -> Self {
        Self {
            status: SubmissionStatus::Succeeded,
            payload: Some(payload),
            error_message: None,
            http_status: Some(http_status),
            server_rejection: false,
        }
    }

    fn failed(message: String, http_status: Option<u16>, server_rejection: bool) -> Self {
        Self {
            status: SubmissionStatus::Failed,
            payload: None,
            error_message: Some(message),
            http_status,
            server_rejection,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }

    /// Interpret a completed round trip.
    pub fn from_response(response: &TransportResponse) -> Self {
        let body = serde_json::from_slice::<Value>(&response.body).ok();

        if response.is_success() {
            return match body {
                Some(payload) => Self::succeeded(payload, response.status),
                None => Self::failed(
                    GENERIC_FAILURE_MESSAGE.to_string(),
                    Some(response.status),
                    false,
                ),
            };
        }

        match body.as_ref().and_then(block_reason) {
            Some(reason) => Self::failed(reason, Some(response.status), true),
            None => Self::failed(
                GENERIC_FAILURE_MESSAGE.to_string(),
                Some(response.status),
                false,
            ),
        }
    }

    pub fn from_transport_error(_error: &TransportError) -> Self {
        Self::failed(GENERIC_FAILURE_MESSAGE.to_string(), None, false)
    }

    pub fn from_outcome(outcome: &Result<TransportResponse, TransportError>) -> Self {
        match outcome {
            Ok(response) => Self::from_response(response),
            Err(e) => Self::from_transport_error(e),
        }
    }

    /// Typed view of the scanner verdict in a successful payload.
    pub fn verdict(&self) -> Option<ScanVerdict> {
        self.payload.as_ref().and_then(ScanVerdict::from_payload)
    }
}

/// Find a human-readable block reason in an error body.
///
/// Top-level keys are checked before the nested `scan_results` object.
/// Empty strings are skipped.
pub fn block_reason(body: &Value) -> Option<String> {
    let lookup = |obj: &Value| {
        REASON_KEYS
            .iter()
            .find_map(|key| {
                obj.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .map(str::to_string)
    };

    lookup(body).or_else(|| body.get("scan_results").and_then(lookup))
}

/// Verdict encoded in `scan_result_code` by the scanning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanVerdict {
    Malicious,
    Clean,
    /// Scanner not configured on the server.
    Skipped,
    ScanError,
    /// Empty or oversized file, not scanned.
    NotScanned,
    /// Sent to the unprotected endpoint, never scanned.
    Unscanned,
    Unknown(i64),
}

impl ScanVerdict {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ScanVerdict::Malicious,
            0 => ScanVerdict::Clean,
            -1 => ScanVerdict::Skipped,
            -2 => ScanVerdict::ScanError,
            -3 => ScanVerdict::NotScanned,
            -4 => ScanVerdict::Unscanned,
            other => ScanVerdict::Unknown(other),
        }
    }

    /// Read `scan_result_code` (number or boolean) from a payload.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match payload.get("scan_result_code")? {
            Value::Bool(true) => Some(ScanVerdict::Malicious),
            Value::Bool(false) => Some(ScanVerdict::Clean),
            Value::Number(n) => n.as_i64().map(Self::from_code),
            _ => None,
        }
    }

    pub fn is_malicious(&self) -> bool {
        matches!(self, ScanVerdict::Malicious)
    }
}
