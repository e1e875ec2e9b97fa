// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::watermark::export::DEFAULT_EXPORT_FILENAME;
use crate::watermark::{AssetLoaderConfig, ExportEncoder, FilenamePolicy};

pub mod compositor;
pub mod submission;

pub use compositor::CompositorConfig;
pub use submission::SubmissionConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_loader_timeout_seconds() -> u64 {
    30
}

/// Asset loader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Timeout for remote asset fetches in seconds (default: 30)
    #[serde(default = "default_loader_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_loader_timeout_seconds(),
        }
    }
}

impl LoaderConfig {
    pub fn to_loader_config(&self) -> AssetLoaderConfig {
        AssetLoaderConfig {
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }
}

fn default_export_filename() -> String {
    DEFAULT_EXPORT_FILENAME.to_string()
}

/// Export naming settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Name used when the watermark has no original filename
    #[serde(default = "default_export_filename")]
    pub default_filename: String,
    /// How untrusted filenames are used for exports and uploads (default: sanitize)
    #[serde(default)]
    pub filename_policy: FilenamePolicy,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_filename: default_export_filename(),
            filename_policy: FilenamePolicy::default(),
        }
    }
}

impl ExportConfig {
    pub fn to_encoder(&self) -> ExportEncoder {
        ExportEncoder::new(self.filename_policy, self.default_filename.clone())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive; `RUST_LOG` takes precedence (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        // An empty document is a valid, all-defaults configuration
        if substituted.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.compositor.validate()?;
        self.submission.validate()?;

        if self.loader.timeout_seconds == 0 {
            return Err("loader: timeout_seconds must be > 0".to_string());
        }
        if self.export.default_filename.trim().is_empty() {
            return Err("export: default_filename cannot be empty".to_string());
        }
        if self.logging.level.trim().is_empty() {
            return Err("logging: level cannot be empty".to_string());
        }
        Ok(())
    }
}
