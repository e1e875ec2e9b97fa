//! Watermark compositor.
//!
//! Renders a [`CompositionState`] into a fresh RGBA surface of the requested
//! canvas size. Rendering is a pure function of its inputs: the same state
//! and canvas size always produce byte-identical output.
//!
//! # Render Steps
//!
//! 1. Start from a cleared (transparent) surface
//! 2. Draw the base asset stretched to fill the canvas
//! 3. Image watermark: scale to `max(16, scale * width)` keeping the native
//!    aspect ratio, center on the anchor, blend at `opacity`
//! 4. Text watermark: render at `max(12, width * scale * 0.05)` px with an
//!    outline, center on the anchor, blend at `opacity`
//!
//! Watermarks are placed at full size but only the part that lands on the
//! canvas is resampled or rasterized, so a redraw costs at most one canvas
//! worth of watermark pixels however large or elongated the watermark is.
//!
//! A watermark image that is not ready, or empty text, leaves the base-only
//! render.
//!
//! # Example
//!
//! ```ignore
//! use inkmark::watermark::{CanvasDimensions, CompositionState, Compositor};
//!
//! let compositor = Compositor::new();
//! if let Some(surface) = compositor.render(&state, CanvasDimensions::new(1200, 800))? {
//!     // present or export surface
//! }
//! ```

use super::position::{
    centered_origin, image_watermark_size, text_font_size, visible_region, CanvasDimensions,
    PlacementPosition, VisibleRegion, WatermarkDimensions,
};
use super::state::{CompositionState, WatermarkDescriptor};
use super::text_renderer::{render_text_region, text_layer_size, GlyphSource, TextStyle};
use super::WatermarkError;
use fast_image_resize::{CropBox, FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::{imageops, Rgba, RgbaImage};
use std::num::NonZeroU32;

/// A rendered watermark layer positioned on the canvas.
///
/// Only the part of the watermark that lands on the canvas is rendered, so
/// `image` is never larger than the canvas.
#[derive(Clone)]
pub struct WatermarkLayer {
    /// The visible part of the watermark (RGBA).
    pub image: RgbaImage,
    /// Top-left corner of `image` on the canvas.
    pub position: PlacementPosition,
    /// Size of the whole watermark before clipping to the canvas.
    pub full_size: WatermarkDimensions,
    /// Opacity to apply (0.0 to 1.0). Applied on top of image's alpha channel.
    pub opacity: f32,
}

impl std::fmt::Debug for WatermarkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkLayer")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("position", &self.position)
            .field("full_size", &self.full_size)
            .field("opacity", &self.opacity)
            .finish()
    }
}

/// What a watermark layer is rendered from.
enum LayerSource<'a> {
    Raster(&'a RgbaImage),
    Text { content: &'a str, font_size: f32 },
}

/// Renders composition state into pixels.
#[derive(Debug, Default)]
pub struct Compositor {
    glyphs: GlyphSource,
    text_style: TextStyle,
}

impl Compositor {
    /// Compositor with the built-in bitmap font and default text style.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_glyphs(glyphs: GlyphSource, text_style: TextStyle) -> Self {
        Self { glyphs, text_style }
    }

    pub fn text_style(&self) -> &TextStyle {
        &self.text_style
    }

    /// Render the composition at `canvas` size.
    ///
    /// Returns `Ok(None)` while the base asset is not ready.
    pub fn render(
        &self,
        state: &CompositionState,
        canvas: CanvasDimensions,
    ) -> Result<Option<RgbaImage>, WatermarkError> {
        let Some(base) = state.base_asset().and_then(|asset| asset.raster()) else {
            return Ok(None);
        };
        if canvas.width == 0 || canvas.height == 0 {
            return Err(WatermarkError::RenderError(format!(
                "Canvas has no area: {}x{}",
                canvas.width, canvas.height
            )));
        }

        // Drawing the base onto a cleared surface replaces every pixel.
        let mut surface = resize_rgba(base, canvas.width, canvas.height)?;

        if let Some(layer) = self.watermark_layer(state, &canvas)? {
            blend_layer(&mut surface, &layer);
        }

        Ok(Some(surface))
    }

    /// Build the positioned watermark layer, if there is anything to draw.
    fn watermark_layer(
        &self,
        state: &CompositionState,
        canvas: &CanvasDimensions,
    ) -> Result<Option<WatermarkLayer>, WatermarkError> {
        let params = state.params();

        let (source, full_size) = match state.watermark() {
            WatermarkDescriptor::Image { asset } => {
                let Some(raster) = asset.asset().and_then(|a| a.raster()) else {
                    return Ok(None);
                };
                let native = WatermarkDimensions {
                    width: raster.width(),
                    height: raster.height(),
                };
                let (w, h) = image_watermark_size(&native, canvas, params.scale);
                // Height follows the rounded width so the pixel aspect stays true.
                let width = (w.round() as u32).max(1);
                let height = ((width as f32 * h / w).round() as u32).max(1);
                (
                    LayerSource::Raster(raster),
                    WatermarkDimensions { width, height },
                )
            }
            WatermarkDescriptor::Text { content } => {
                if content.is_empty() {
                    return Ok(None);
                }
                let font_size = text_font_size(canvas, params.scale);
                let (width, height) =
                    text_layer_size(&self.glyphs, content, font_size, &self.text_style);
                (
                    LayerSource::Text { content, font_size },
                    WatermarkDimensions { width, height },
                )
            }
        };

        let origin = centered_origin(params.anchor, canvas, &full_size);
        let Some(region) = visible_region(&origin, canvas, &full_size) else {
            return Ok(None);
        };

        let image = match source {
            LayerSource::Raster(raster) => resample_region(raster, &full_size, &region)?,
            LayerSource::Text { content, font_size } => render_text_region(
                &self.glyphs,
                content,
                font_size,
                &self.text_style,
                &region,
            )?,
        };

        Ok(Some(WatermarkLayer {
            image,
            position: region.canvas_position(&origin),
            full_size,
            opacity: params.opacity,
        }))
    }
}

/// Source pixels `[src_start, src_end)` and the layer pixels
/// `[dst_start, dst_end)` they resample to, along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisSpan {
    src_start: u32,
    src_end: u32,
    dst_start: u32,
    dst_end: u32,
}

impl AxisSpan {
    /// Smallest whole-pixel source span covering layer pixels
    /// `[offset, offset + len)` of a `src_len` axis scaled to `full_len`.
    ///
    /// The layer span overshoots the requested one by less than one scaled
    /// source pixel on each side.
    fn covering(offset: u32, len: u32, src_len: u32, full_len: u32) -> Self {
        let src_len = src_len.max(1);
        let end = offset.saturating_add(len).min(full_len);
        let ratio = src_len as f64 / full_len.max(1) as f64;

        let src_start = ((offset as f64 * ratio).floor() as u32).min(src_len - 1);
        let src_end = ((end as f64 * ratio).ceil() as u32).clamp(src_start + 1, src_len);
        let dst_start = ((src_start as f64 / ratio).floor() as u32).min(offset);
        let dst_end = ((src_end as f64 / ratio).ceil() as u32).clamp(end, full_len.max(end));

        Self {
            src_start,
            src_end,
            dst_start,
            dst_end,
        }
    }
}

/// Resample `src` scaled to `full` and return only `region` of the result.
///
/// Only the source pixels that feed the region are resampled; the filter
/// still reads their neighbours, so edges match a full-size resample.
fn resample_region(
    src: &RgbaImage,
    full: &WatermarkDimensions,
    region: &VisibleRegion,
) -> Result<RgbaImage, WatermarkError> {
    if src.dimensions() == (full.width, full.height) {
        return Ok(
            imageops::crop_imm(src, region.x, region.y, region.width, region.height).to_image(),
        );
    }

    let x = AxisSpan::covering(region.x, region.width, src.width(), full.width);
    let y = AxisSpan::covering(region.y, region.height, src.height(), full.height);

    let crop = CropBox {
        left: x.src_start,
        top: y.src_start,
        width: non_zero(x.src_end - x.src_start, "Crop width")?,
        height: non_zero(y.src_end - y.src_start, "Crop height")?,
    };
    let resized = resize_rgba_cropped(
        src,
        Some(crop),
        x.dst_end - x.dst_start,
        y.dst_end - y.dst_start,
    )?;

    Ok(imageops::crop_imm(
        &resized,
        region.x - x.dst_start,
        region.y - y.dst_start,
        region.width,
        region.height,
    )
    .to_image())
}

fn non_zero(value: u32, what: &str) -> Result<NonZeroU32, WatermarkError> {
    NonZeroU32::new(value).ok_or_else(|| WatermarkError::RenderError(format!("{} is 0", what)))
}

/// Resize an RGBA raster, returning a copy when the size already matches.
fn resize_rgba(src: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage, WatermarkError> {
    if src.dimensions() == (target_w, target_h) {
        return Ok(src.clone());
    }
    resize_rgba_cropped(src, None, target_w, target_h)
}

/// Resize `src`, or only its `crop` box, to `target_w` x `target_h`.
fn resize_rgba_cropped(
    src: &RgbaImage,
    crop: Option<CropBox>,
    target_w: u32,
    target_h: u32,
) -> Result<RgbaImage, WatermarkError> {
    let src_width = non_zero(src.width(), "Source width")?;
    let src_height = non_zero(src.height(), "Source height")?;
    let dst_width = non_zero(target_w, "Target width")?;
    let dst_height = non_zero(target_h, "Target height")?;

    let src_image = Image::from_vec_u8(src_width, src_height, src.as_raw().clone(), PixelType::U8x4)
        .map_err(|e| {
            WatermarkError::RenderError(format!("Failed to create source image: {:?}", e))
        })?;
    let mut src_view = src_image.view();
    if let Some(crop) = crop {
        src_view
            .set_crop_box(crop)
            .map_err(|e| WatermarkError::RenderError(format!("Invalid crop box: {:?}", e)))?;
    }

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_view, &mut dst_image.view_mut())
        .map_err(|e| WatermarkError::RenderError(format!("Resize operation failed: {:?}", e)))?;

    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| WatermarkError::RenderError("Failed to create output image buffer".to_string()))
}

/// Blend a single watermark layer onto the target image.
fn blend_layer(target: &mut RgbaImage, layer: &WatermarkLayer) {
    if layer.opacity <= 0.0 {
        return;
    }

    let target_width = target.width() as i32;
    let target_height = target.height() as i32;

    let wm_width = layer.image.width() as i32;
    let wm_height = layer.image.height() as i32;

    // Calculate the visible region (clamp to target bounds)
    let x_start = layer.position.x.max(0);
    let y_start = layer.position.y.max(0);
    let x_end = (layer.position.x + wm_width).min(target_width);
    let y_end = (layer.position.y + wm_height).min(target_height);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let wx = (tx - layer.position.x) as u32;
            let wy = (ty - layer.position.y) as u32;

            let wm_pixel = layer.image.get_pixel(wx, wy);
            let target_pixel = target.get_pixel(tx as u32, ty as u32);

            let blended = blend_pixels(*target_pixel, *wm_pixel, layer.opacity);
            target.put_pixel(tx as u32, ty as u32, blended);
        }
    }
}

/// Blend two pixels using alpha compositing with additional opacity.
///
/// Uses the "over" operator: result = foreground + background * (1 - foreground.alpha).
/// A fully transparent foreground leaves the background untouched.
fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    if fg_alpha <= 0.0 {
        return background;
    }
    let bg_alpha = background[3] as f32 / 255.0;

    // Porter-Duff "over" operator
    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}
