//! Watermark error types.
//!
//! Defines errors that can occur while loading, compositing and exporting
//! watermarked images.

use std::fmt;

/// Errors that can occur during watermark processing.
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkError {
    /// Failed to fetch or read an asset from its source URI
    LoadError(String),

    /// Failed to decode an asset into a raster
    DecodeError(String),

    /// Failed to render the composited surface or a text layer
    RenderError(String),

    /// Failed to encode the composited surface for export
    EncodeError(String),

    /// Invalid configuration or parameter value
    ConfigError(String),
}

impl fmt::Display for WatermarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadError(msg) => write!(f, "Failed to load asset: {}", msg),
            Self::DecodeError(msg) => write!(f, "Failed to decode asset: {}", msg),
            Self::RenderError(msg) => write!(f, "Failed to render composition: {}", msg),
            Self::EncodeError(msg) => write!(f, "Failed to encode export: {}", msg),
            Self::ConfigError(msg) => write!(f, "Watermark configuration error: {}", msg),
        }
    }
}

impl std::error::Error for WatermarkError {}
