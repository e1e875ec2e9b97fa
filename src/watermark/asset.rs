//! Asset loading for base and watermark rasters.
//!
//! An [`AssetSlot`] is the single logical place an asset lives (the base
//! image, or the watermark image). Assigning a URI to a slot returns a
//! [`LoadTicket`] immediately and leaves the slot `Pending`; the decode runs
//! as an awaitable [`AssetLoader::fetch`] and its outcome is committed back
//! through [`AssetSlot::commit`], which drops outcomes for superseded URIs or
//! closed slots.
//!
//! # Supported Sources
//!
//! - `/path/to/image.png` or `file:///path/to/image.png` - local file
//! - `https://example.com/image.png` (or `http://`) - remote URL
//! - `data:image/png;base64,...` - inline upload
//!
//! # Example
//!
//! ```ignore
//! use inkmark::watermark::asset::{AssetLoader, AssetLoaderConfig, AssetSlot};
//!
//! let loader = AssetLoader::new(AssetLoaderConfig::default())?;
//! let mut slot = AssetSlot::new();
//!
//! let ticket = slot.begin("https://cdn.example.com/paper.png");
//! let outcome = loader.fetch(&ticket).await;
//! slot.commit(&ticket, outcome);
//! ```

use super::WatermarkError;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle of an asset assigned to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Pending,
    Ready,
    Failed,
}

/// A raster asset and its decode status.
///
/// Pixel dimensions are zero until the asset is `Ready`.
#[derive(Clone)]
pub struct RasterAsset {
    pub source_uri: String,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub status: AssetStatus,
    raster: Option<Arc<RgbaImage>>,
}

impl std::fmt::Debug for RasterAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterAsset")
            .field("source_uri", &self.source_uri)
            .field("dimensions", &(self.pixel_width, self.pixel_height))
            .field("status", &self.status)
            .finish()
    }
}

impl RasterAsset {
    fn pending(uri: &str) -> Self {
        Self {
            source_uri: uri.to_string(),
            pixel_width: 0,
            pixel_height: 0,
            status: AssetStatus::Pending,
            raster: None,
        }
    }

    /// Create an already-decoded asset.
    pub fn ready(uri: impl Into<String>, raster: RgbaImage) -> Self {
        Self {
            source_uri: uri.into(),
            pixel_width: raster.width(),
            pixel_height: raster.height(),
            status: AssetStatus::Ready,
            raster: Some(Arc::new(raster)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == AssetStatus::Ready
    }

    /// The decoded pixels, only available once `Ready`.
    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_deref()
    }
}

/// Receipt for an in-flight load, compared against the slot on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub uri: String,
}

/// Owner of the asset currently assigned to one logical position.
#[derive(Debug, Default, Clone)]
pub struct AssetSlot {
    asset: Option<RasterAsset>,
    generation: u64,
    closed: bool,
}

impl AssetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a new URI, replacing whatever the slot held.
    ///
    /// The slot becomes `Pending` and any ticket handed out before this call
    /// becomes stale.
    pub fn begin(&mut self, uri: &str) -> LoadTicket {
        self.generation += 1;
        self.asset = Some(RasterAsset::pending(uri));
        tracing::debug!(uri = %uri, generation = self.generation, "Asset load started");
        LoadTicket {
            generation: self.generation,
            uri: uri.to_string(),
        }
    }

    /// Commit the outcome of a load started with `ticket`.
    ///
    /// Returns `false` (and leaves the slot untouched) when the ticket has
    /// been superseded or the slot was closed.
    pub fn commit(
        &mut self,
        ticket: &LoadTicket,
        outcome: Result<RgbaImage, WatermarkError>,
    ) -> bool {
        let current_uri = self.asset.as_ref().map(|a| a.source_uri.as_str());
        let superseded =
            ticket.generation != self.generation || current_uri != Some(ticket.uri.as_str());
        if self.closed || superseded {
            tracing::debug!(
                uri = %ticket.uri,
                ticket_generation = ticket.generation,
                slot_generation = self.generation,
                closed = self.closed,
                "Discarding stale asset load"
            );
            return false;
        }

        match outcome {
            Ok(raster) => {
                tracing::info!(
                    uri = %ticket.uri,
                    width = raster.width(),
                    height = raster.height(),
                    "Asset ready"
                );
                self.asset = Some(RasterAsset::ready(ticket.uri.clone(), raster));
            }
            Err(e) => {
                tracing::warn!(uri = %ticket.uri, error = %e, "Asset load failed");
                if let Some(asset) = self.asset.as_mut() {
                    asset.status = AssetStatus::Failed;
                }
            }
        }
        true
    }

    /// Install a decoded raster directly, bypassing the loader.
    pub fn set_ready(&mut self, uri: &str, raster: RgbaImage) {
        let ticket = self.begin(uri);
        self.commit(&ticket, Ok(raster));
    }

    /// Close the slot: every outstanding ticket becomes stale and no
    /// further commits are accepted.
    pub fn close(&mut self) {
        self.closed = true;
        self.generation += 1;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn asset(&self) -> Option<&RasterAsset> {
        self.asset.as_ref()
    }

    pub fn status(&self) -> Option<AssetStatus> {
        self.asset.as_ref().map(|a| a.status)
    }

    pub fn is_ready(&self) -> bool {
        self.status() == Some(AssetStatus::Ready)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Configuration for the asset loader.
#[derive(Debug, Clone)]
pub struct AssetLoaderConfig {
    /// Timeout for remote fetches.
    pub timeout: Duration,
}

impl Default for AssetLoaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Parsed source location of an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Local filesystem path.
    File(PathBuf),
    /// HTTP(S) URL.
    Http(String),
    /// Inline `data:` URI, already base64-decoded.
    Data { mime: String, bytes: Vec<u8> },
}

impl AssetSource {
    /// Parse a URI into an AssetSource.
    ///
    /// # Errors
    ///
    /// Returns error for unknown schemes and malformed `data:` URIs.
    pub fn parse(uri: &str) -> Result<Self, WatermarkError> {
        if uri.is_empty() {
            return Err(WatermarkError::LoadError("Empty asset URI".to_string()));
        }

        if let Some(rest) = uri.strip_prefix("data:") {
            let (meta, payload) = rest.split_once(',').ok_or_else(|| {
                WatermarkError::LoadError("Malformed data URI: missing ','".to_string())
            })?;
            let mime = meta
                .strip_suffix(";base64")
                .ok_or_else(|| {
                    WatermarkError::LoadError("Only base64 data URIs are supported".to_string())
                })?
                .to_string();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| WatermarkError::LoadError(format!("Invalid base64 payload: {e}")))?;
            Ok(AssetSource::Data { mime, bytes })
        } else if uri.starts_with("https://") || uri.starts_with("http://") {
            Ok(AssetSource::Http(uri.to_string()))
        } else if let Some(path) = uri.strip_prefix("file://") {
            Ok(AssetSource::File(PathBuf::from(path)))
        } else if uri.contains("://") {
            Err(WatermarkError::LoadError(format!(
                "Unsupported source protocol: {uri}. Use file://, http(s):// or data:"
            )))
        } else {
            Ok(AssetSource::File(PathBuf::from(uri)))
        }
    }
}

/// Resolves asset URIs into decoded rasters.
#[derive(Clone)]
pub struct AssetLoader {
    http_client: reqwest::Client,
}

impl AssetLoader {
    /// Create a new loader.
    ///
    /// # Errors
    ///
    /// Returns `WatermarkError::ConfigError` if the HTTP client cannot be created.
    pub fn new(config: AssetLoaderConfig) -> Result<Self, WatermarkError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                WatermarkError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { http_client })
    }

    /// Fetch and decode the asset named by `ticket`.
    ///
    /// This never touches a slot; the caller commits the result.
    pub async fn fetch(&self, ticket: &LoadTicket) -> Result<RgbaImage, WatermarkError> {
        let source = AssetSource::parse(&ticket.uri)?;
        let data = match source {
            AssetSource::File(path) => tokio::fs::read(&path).await.map_err(|e| {
                WatermarkError::LoadError(format!("Failed to read {}: {e}", path.display()))
            })?,
            AssetSource::Http(url) => self.fetch_from_http(&url).await?,
            AssetSource::Data { mime, bytes } => {
                return decode_with_hints(&bytes, &ticket.uri, Some(&mime));
            }
        };

        decode_raster(&data, &ticket.uri)
    }

    async fn fetch_from_http(&self, url: &str) -> Result<Vec<u8>, WatermarkError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| WatermarkError::LoadError(format!("HTTP fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WatermarkError::LoadError(format!(
                "HTTP request failed with status: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WatermarkError::LoadError(format!("Failed to read HTTP body: {e}")))?;

        Ok(bytes.to_vec())
    }
}

/// Decode raw bytes into an RGBA raster, using `uri` as a format hint.
pub fn decode_raster(data: &[u8], uri: &str) -> Result<RgbaImage, WatermarkError> {
    decode_with_hints(data, uri, None)
}

fn decode_with_hints(
    data: &[u8],
    uri: &str,
    mime: Option<&str>,
) -> Result<RgbaImage, WatermarkError> {
    let format = detect_image_format(data, uri, mime)?;
    let image = image::load(Cursor::new(data), format)
        .map_err(|e| WatermarkError::DecodeError(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(WatermarkError::DecodeError(
            "Image has zero width or height".to_string(),
        ));
    }
    Ok(image.to_rgba8())
}

fn is_supported(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP
    )
}

/// Detect image format from bytes, then the declared MIME type, then the
/// URI's extension.
fn detect_image_format(
    data: &[u8],
    uri: &str,
    mime: Option<&str>,
) -> Result<ImageFormat, WatermarkError> {
    if let Ok(format) = image::guess_format(data) {
        return Ok(format);
    }

    if let Some(mime) = mime {
        return ImageFormat::from_mime_type(mime)
            .filter(|format| is_supported(*format))
            .ok_or_else(|| {
                WatermarkError::DecodeError(format!("Unsupported image type: {mime}"))
            });
    }

    let ext = uri
        .rsplit('.')
        .next()
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    ImageFormat::from_extension(&ext)
        .filter(|format| is_supported(*format))
        .ok_or_else(|| WatermarkError::DecodeError(format!("Unsupported image format: {ext}")))
}
