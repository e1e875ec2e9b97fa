//! Composition state: the single source of truth a redraw is computed from.
//!
//! Every mutation bumps [`CompositionState::revision`]; the redraw scheduler
//! compares revisions rather than being called from event handlers.

use super::asset::{AssetSlot, LoadTicket, RasterAsset};
use super::position::Anchor;
use super::WatermarkError;
use image::RgbaImage;

pub const DEFAULT_OPACITY: f32 = 0.5;
pub const DEFAULT_SCALE: f32 = 0.3;

/// Upper bound on scale (watermark width as a multiple of canvas width).
pub const MAX_SCALE: f32 = 4.0;

/// Opacity, scale and anchor of the watermark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementParams {
    /// Global alpha of the watermark layer (0.0 to 1.0)
    pub opacity: f32,
    /// Watermark width as a fraction of canvas width (> 0)
    pub scale: f32,
    /// Normalized center of the watermark
    pub anchor: Anchor,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_OPACITY,
            scale: DEFAULT_SCALE,
            anchor: Anchor::center(),
        }
    }
}

impl PlacementParams {
    /// Build validated parameters.
    ///
    /// Opacity is clamped into `[0,1]`, scale must be finite and positive
    /// and is capped at [`MAX_SCALE`], the anchor is clamped.
    pub fn new(opacity: f32, scale: f32, anchor: Anchor) -> Result<Self, WatermarkError> {
        Ok(Self {
            opacity: validate_opacity(opacity)?,
            scale: validate_scale(scale)?,
            anchor: Anchor::new(anchor.x, anchor.y),
        })
    }
}

fn validate_opacity(opacity: f32) -> Result<f32, WatermarkError> {
    if opacity.is_nan() {
        return Err(WatermarkError::ConfigError(
            "opacity must be a number".to_string(),
        ));
    }
    Ok(opacity.clamp(0.0, 1.0))
}

fn validate_scale(scale: f32) -> Result<f32, WatermarkError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(WatermarkError::ConfigError(format!(
            "scale must be a positive number, got {scale}"
        )));
    }
    Ok(scale.min(MAX_SCALE))
}

/// Which kind of watermark is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkKind {
    Image,
    Text,
}

/// The active watermark.
#[derive(Debug, Clone)]
pub enum WatermarkDescriptor {
    Image { asset: AssetSlot },
    Text { content: String },
}

impl WatermarkDescriptor {
    pub fn kind(&self) -> WatermarkKind {
        match self {
            Self::Image { .. } => WatermarkKind::Image,
            Self::Text { .. } => WatermarkKind::Text,
        }
    }

    fn empty(kind: WatermarkKind) -> Self {
        match kind {
            WatermarkKind::Image => Self::Image {
                asset: AssetSlot::new(),
            },
            WatermarkKind::Text => Self::Text {
                content: String::new(),
            },
        }
    }

    fn close(&mut self) {
        if let Self::Image { asset } = self {
            asset.close();
        }
    }
}

/// Base asset, watermark and placement parameters.
#[derive(Debug, Clone)]
pub struct CompositionState {
    base: AssetSlot,
    watermark: WatermarkDescriptor,
    /// Last-known content of the inactive variant.
    stash: Option<WatermarkDescriptor>,
    params: PlacementParams,
    original_filename: Option<String>,
    revision: u64,
}

impl Default for CompositionState {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionState {
    pub fn new() -> Self {
        Self {
            base: AssetSlot::new(),
            watermark: WatermarkDescriptor::empty(WatermarkKind::Image),
            stash: None,
            params: PlacementParams::default(),
            original_filename: None,
            revision: 0,
        }
    }

    pub fn base(&self) -> &AssetSlot {
        &self.base
    }

    pub fn base_asset(&self) -> Option<&RasterAsset> {
        self.base.asset()
    }

    pub fn watermark(&self) -> &WatermarkDescriptor {
        &self.watermark
    }

    pub fn params(&self) -> &PlacementParams {
        &self.params
    }

    /// Filename of the uploaded watermark file, if any.
    pub fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }

    /// Monotonic counter bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The compositor may only run once the base is ready.
    pub fn is_renderable(&self) -> bool {
        self.base.is_ready()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn begin_base_load(&mut self, uri: &str) -> LoadTicket {
        let ticket = self.base.begin(uri);
        self.touch();
        ticket
    }

    pub fn commit_base(
        &mut self,
        ticket: &LoadTicket,
        outcome: Result<RgbaImage, WatermarkError>,
    ) -> bool {
        let applied = self.base.commit(ticket, outcome);
        if applied {
            self.touch();
        }
        applied
    }

    /// Assign a new watermark image, switching to the image variant.
    pub fn begin_watermark_load(&mut self, uri: &str, filename: Option<&str>) -> LoadTicket {
        self.switch_to(WatermarkKind::Image);
        if let Some(name) = filename {
            self.original_filename = Some(name.to_string());
        }
        let ticket = if let WatermarkDescriptor::Image { asset } = &mut self.watermark {
            asset.begin(uri)
        } else {
            let mut asset = AssetSlot::new();
            let ticket = asset.begin(uri);
            self.watermark = WatermarkDescriptor::Image { asset };
            ticket
        };
        self.touch();
        ticket
    }

    /// Commit a watermark image load.
    ///
    /// The image slot keeps loading while the text variant is active, so
    /// the outcome lands in the stash in that case.
    pub fn commit_watermark(
        &mut self,
        ticket: &LoadTicket,
        outcome: Result<RgbaImage, WatermarkError>,
    ) -> bool {
        let slot = match (&mut self.watermark, &mut self.stash) {
            (WatermarkDescriptor::Image { asset }, _) => asset,
            (_, Some(WatermarkDescriptor::Image { asset })) => asset,
            _ => return false,
        };
        let applied = slot.commit(ticket, outcome);
        if applied {
            self.touch();
        }
        applied
    }

    /// Set text content, switching to the text variant.
    pub fn set_text(&mut self, content: impl Into<String>) {
        self.switch_to(WatermarkKind::Text);
        if let WatermarkDescriptor::Text { content: current } = &mut self.watermark {
            *current = content.into();
        }
        self.touch();
    }

    /// Switch the active variant, restoring the other variant's last content.
    pub fn switch_to(&mut self, kind: WatermarkKind) {
        if self.watermark.kind() == kind {
            return;
        }
        let restored = match self.stash.take() {
            Some(stashed) if stashed.kind() == kind => stashed,
            _ => WatermarkDescriptor::empty(kind),
        };
        let previous = std::mem::replace(&mut self.watermark, restored);
        self.stash = Some(previous);
        self.touch();
    }

    pub fn set_opacity(&mut self, opacity: f32) -> Result<(), WatermarkError> {
        self.params.opacity = validate_opacity(opacity)?;
        self.touch();
        Ok(())
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<(), WatermarkError> {
        self.params.scale = validate_scale(scale)?;
        self.touch();
        Ok(())
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.params.anchor = Anchor::new(anchor.x, anchor.y);
        self.touch();
    }

    pub fn set_params(&mut self, params: PlacementParams) -> Result<(), WatermarkError> {
        self.params = PlacementParams::new(params.opacity, params.scale, params.anchor)?;
        self.touch();
        Ok(())
    }

    /// Restore default opacity, scale and anchor.
    pub fn reset_params(&mut self) {
        self.params = PlacementParams::default();
        self.touch();
    }

    /// Close every asset slot so in-flight loads can no longer commit.
    pub fn close(&mut self) {
        self.base.close();
        self.watermark.close();
        if let Some(stash) = self.stash.as_mut() {
            stash.close();
        }
    }
}
