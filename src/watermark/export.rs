//! Export encoding.
//!
//! The composited surface is always written as PNG, whatever format the
//! watermark or base asset came in. The download name is derived from the
//! uploaded watermark's filename under a [`FilenamePolicy`].

use super::WatermarkError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Name used when no original filename is known.
pub const DEFAULT_EXPORT_FILENAME: &str = "watermarked.png";

pub const EXPORT_EXTENSION: &str = "png";
pub const EXPORT_CONTENT_TYPE: &str = "image/png";

/// How untrusted filenames are turned into output names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenamePolicy {
    /// Keep the name as given, path segments included.
    Preserve,
    /// Keep only a safe final path component.
    #[default]
    Sanitize,
}

/// Derive the export filename from the original watermark filename.
///
/// The final path component is cut at its first `.` and given the `.png`
/// extension. With [`FilenamePolicy::Preserve`] any directory prefix is kept
/// verbatim, so `evil/../../secret.txt` becomes `evil/../../secret.png`.
pub fn derive_filename(original: Option<&str>, policy: FilenamePolicy, default: &str) -> String {
    let Some(original) = original.filter(|name| !name.is_empty()) else {
        return default.to_string();
    };

    let split = original.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let (prefix, last) = original.split_at(split);
    let stem = last.split('.').next().unwrap_or_default();

    match policy {
        FilenamePolicy::Preserve => format!("{}{}.{}", prefix, stem, EXPORT_EXTENSION),
        FilenamePolicy::Sanitize => {
            let cleaned: String = stem.chars().filter(|c| !c.is_control()).collect();
            let cleaned = cleaned.trim().trim_start_matches('.');
            if cleaned.is_empty() {
                default.to_string()
            } else {
                format!("{}.{}", cleaned, EXPORT_EXTENSION)
            }
        }
    }
}

/// Reduce an untrusted filename to a safe final path component.
///
/// Control characters and leading dots are removed. The result may be
/// empty.
pub fn sanitize_filename(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    cleaned.trim().trim_start_matches('.').to_string()
}

/// An encoded export ready to be written or downloaded.
#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

impl ExportedImage {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// PNG encoder for rendered surfaces.
#[derive(Debug, Clone)]
pub struct ExportEncoder {
    policy: FilenamePolicy,
    default_filename: String,
}

impl Default for ExportEncoder {
    fn default() -> Self {
        Self::new(FilenamePolicy::default(), DEFAULT_EXPORT_FILENAME)
    }
}

impl ExportEncoder {
    pub fn new(policy: FilenamePolicy, default_filename: impl Into<String>) -> Self {
        Self {
            policy,
            default_filename: default_filename.into(),
        }
    }

    pub fn policy(&self) -> FilenamePolicy {
        self.policy
    }

    pub fn filename_for(&self, original: Option<&str>) -> String {
        derive_filename(original, self.policy, &self.default_filename)
    }

    /// Encode `surface` as PNG and name it after `original_filename`.
    pub fn encode(
        &self,
        surface: &RgbaImage,
        original_filename: Option<&str>,
    ) -> Result<ExportedImage, WatermarkError> {
        use image::codecs::png::PngEncoder;
        use image::ImageEncoder as _;
        use std::io::Cursor;

        let mut output = Cursor::new(Vec::new());
        PngEncoder::new(&mut output)
            .write_image(
                surface.as_raw(),
                surface.width(),
                surface.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|e| WatermarkError::EncodeError(format!("png: {}", e)))?;

        let exported = ExportedImage {
            bytes: output.into_inner(),
            filename: self.filename_for(original_filename),
            content_type: EXPORT_CONTENT_TYPE,
        };

        info!(
            filename = %exported.filename,
            bytes = exported.size(),
            width = surface.width(),
            height = surface.height(),
            "Exported composition"
        );

        Ok(exported)
    }
}
