//! Submission endpoint configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::submission::{
    Endpoints, PipelineOptions, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PROTECTED_PATH,
    DEFAULT_UNPROTECTED_PATH,
};
use crate::watermark::FilenamePolicy;

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_protected_path() -> String {
    DEFAULT_PROTECTED_PATH.to_string()
}

fn default_unprotected_path() -> String {
    DEFAULT_UNPROTECTED_PATH.to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_timeout_seconds() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Scanning service root (default: http://localhost:8080)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Scanning endpoint path
    #[serde(default = "default_protected_path")]
    pub protected_path: String,
    /// Unscanned comparison endpoint path
    #[serde(default = "default_unprotected_path")]
    pub unprotected_path: String,
    /// Client-side size cap on the protected path (default: 10 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            protected_path: default_protected_path(),
            unprotected_path: default_unprotected_path(),
            max_upload_bytes: default_max_upload_bytes(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl SubmissionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!(
                "submission: base_url '{}' must start with http:// or https://",
                self.base_url
            ));
        }
        for (name, path) in [
            ("protected_path", &self.protected_path),
            ("unprotected_path", &self.unprotected_path),
        ] {
            if !path.starts_with('/') {
                return Err(format!(
                    "submission: {} '{}' does not start with /",
                    name, path
                ));
            }
        }
        if self.max_upload_bytes == 0 {
            return Err("submission: max_upload_bytes must be > 0".to_string());
        }
        if self.timeout_seconds == 0 {
            return Err("submission: timeout_seconds must be > 0".to_string());
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn to_pipeline_options(&self, filename_policy: FilenamePolicy) -> PipelineOptions {
        PipelineOptions {
            endpoints: Endpoints::new(&self.base_url, &self.protected_path, &self.unprotected_path),
            max_upload_bytes: self.max_upload_bytes,
            filename_policy,
        }
    }
}
