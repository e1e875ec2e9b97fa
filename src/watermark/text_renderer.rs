//! Text watermark rendering.
//!
//! Renders a single line of text into a transparent RGBA layer with a light
//! fill over a darker outline, so the text stays readable on any backdrop.
//! The layer is later blended onto the canvas by the compositor.
//!
//! # Glyph Sources
//!
//! - **Outline**: a TrueType/OpenType font loaded through `ab_glyph`
//!   (configured with `compositor.font_path`)
//! - **Bitmap**: the built-in 8x8 font from `font8x8`, scaled to size; used
//!   when no font file is configured
//!
//! # Example
//!
//! ```ignore
//! use inkmark::watermark::text_renderer::{render_text_layer, GlyphSource, TextStyle};
//!
//! let glyphs = GlyphSource::builtin();
//! let layer = render_text_layer(&glyphs, "DRAFT", 24.0, &TextStyle::default())?;
//! ```

use super::position::{VisibleRegion, WatermarkDimensions};
use super::WatermarkError;
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use std::path::Path;

/// RGB color parsed from a hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// White color.
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Black color.
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }

    fn with_alpha(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }
}

/// Parse a hex color string into RGB components.
///
/// Supports both #RGB and #RRGGBB formats.
pub fn parse_hex_color(hex: &str) -> Result<Color, WatermarkError> {
    let hex = hex
        .strip_prefix('#')
        .ok_or_else(|| WatermarkError::ConfigError("Color must start with '#'".to_string()))?;

    if !hex.is_ascii() {
        return Err(WatermarkError::ConfigError(format!(
            "Invalid hex color '#{}'",
            hex
        )));
    }

    let digit = |s: &str| {
        u8::from_str_radix(s, 16)
            .map_err(|_| WatermarkError::ConfigError(format!("Invalid hex digit in '{}'", s)))
    };

    match hex.len() {
        3 => {
            // Double each component: 0xF -> 0xFF, 0xA -> 0xAA
            Ok(Color::new(
                digit(&hex[0..1])? * 17,
                digit(&hex[1..2])? * 17,
                digit(&hex[2..3])? * 17,
            ))
        }
        6 => Ok(Color::new(
            digit(&hex[0..2])?,
            digit(&hex[2..4])?,
            digit(&hex[4..6])?,
        )),
        _ => Err(WatermarkError::ConfigError(format!(
            "Color must be #RGB or #RRGGBB format, got {} characters",
            hex.len()
        ))),
    }
}

/// Fill and outline styling for text watermarks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub fill: Color,
    pub stroke: Color,
    /// Outline width in pixels; half of it falls outside the glyphs.
    pub stroke_width: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            fill: Color::white(),
            stroke: Color::black(),
            stroke_width: 2.0,
        }
    }
}

/// Where glyph shapes come from.
pub enum GlyphSource {
    /// Built-in 8x8 bitmap font, nearest-neighbour scaled.
    Bitmap,
    /// Scalable font file.
    Outline(FontVec),
}

impl std::fmt::Debug for GlyphSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bitmap => f.write_str("GlyphSource::Bitmap"),
            Self::Outline(_) => f.write_str("GlyphSource::Outline"),
        }
    }
}

impl Default for GlyphSource {
    fn default() -> Self {
        Self::builtin()
    }
}

impl GlyphSource {
    pub fn builtin() -> Self {
        Self::Bitmap
    }

    pub fn from_font_bytes(data: Vec<u8>) -> Result<Self, WatermarkError> {
        FontVec::try_from_vec(data)
            .map(Self::Outline)
            .map_err(|e| WatermarkError::ConfigError(format!("Invalid font data: {e}")))
    }

    pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, WatermarkError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            WatermarkError::ConfigError(format!("Failed to read font {}: {e}", path.display()))
        })?;
        Self::from_font_bytes(data)
    }

    /// Calculate the dimensions of rendered text as (width, height).
    ///
    /// Saturates at `u32::MAX` for absurdly long text.
    pub fn measure(&self, text: &str, font_size: f32) -> (u32, u32) {
        match self {
            Self::Bitmap => {
                let cell = bitmap_cell(font_size);
                let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
                (cell.saturating_mul(chars), cell)
            }
            Self::Outline(font) => {
                let scaled_font = font.as_scaled(PxScale::from(font_size));
                let mut width = 0.0f32;
                let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

                for c in text.chars() {
                    let glyph_id = scaled_font.glyph_id(c);
                    if let Some(prev) = prev_glyph {
                        width += scaled_font.kern(prev, glyph_id);
                    }
                    width += scaled_font.h_advance(glyph_id);
                    prev_glyph = Some(glyph_id);
                }

                // Small padding for antialiased edges
                let padding = 2;
                (
                    (width.ceil() as u32).saturating_add(padding),
                    (scaled_font.height().ceil() as u32).saturating_add(padding),
                )
            }
        }
    }

    /// Rasterize `text` into a coverage mask (255 = fully inside a glyph).
    pub fn coverage(&self, text: &str, font_size: f32) -> GrayImage {
        let (width, height) = self.measure(text, font_size);
        let mut mask = GrayImage::new(width.max(1), height.max(1));
        self.draw_coverage(&mut mask, text, font_size, (0, 0));
        mask
    }

    /// Rasterize the part of `text` under `mask`, whose top-left pixel sits
    /// at `origin` in text coordinates. Glyphs outside the mask are skipped.
    fn draw_coverage(&self, mask: &mut GrayImage, text: &str, font_size: f32, origin: (i64, i64)) {
        match self {
            Self::Bitmap => draw_bitmap_glyphs(mask, text, bitmap_cell(font_size), origin),
            Self::Outline(font) => draw_outline_glyphs(mask, font, text, font_size, origin),
        }
    }
}

/// Pixel size of one scaled 8x8 bitmap cell.
fn bitmap_cell(font_size: f32) -> u32 {
    (font_size.round() as u32).max(8)
}

fn draw_bitmap_glyphs(mask: &mut GrayImage, text: &str, cell: u32, origin: (i64, i64)) {
    let (mask_w, mask_h) = (mask.width() as i64, mask.height() as i64);
    let cell = cell as i64;

    let rows = origin.1.max(0)..(origin.1 + mask_h).min(cell);
    if rows.is_empty() {
        return;
    }
    let first = (origin.0.max(0) / cell) as usize;
    let last = ((origin.0 + mask_w + cell - 1) / cell).max(0) as usize;

    for (index, ch) in text.chars().enumerate().take(last).skip(first) {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            continue;
        };
        let cell_x = index as i64 * cell;
        let cols = (origin.0 - cell_x).max(0)..(origin.0 + mask_w - cell_x).min(cell);

        for y in rows.clone() {
            let row_bits = glyph[(y * 8 / cell) as usize];
            for x in cols.clone() {
                let col = x * 8 / cell;
                if (row_bits >> col) & 1 == 1 {
                    let mx = (cell_x + x - origin.0) as u32;
                    let my = (y - origin.1) as u32;
                    mask.put_pixel(mx, my, Luma([255]));
                }
            }
        }
    }
}

fn draw_outline_glyphs(
    mask: &mut GrayImage,
    font: &FontVec,
    text: &str,
    font_size: f32,
    origin: (i64, i64),
) {
    let scale = PxScale::from(font_size);
    let scaled_font = font.as_scaled(scale);
    let (mask_w, mask_h) = (mask.width() as i64, mask.height() as i64);
    let reach = font_size.ceil() as i64;

    // Baseline position (1px top padding)
    let baseline_y = 1.0 + scaled_font.ascent();
    let mut cursor_x = 1.0f32;
    let mut prev_glyph: Option<ab_glyph::GlyphId> = None;

    for c in text.chars() {
        if cursor_x as i64 - origin.0 > mask_w + reach {
            break;
        }
        let glyph_id = scaled_font.glyph_id(c);
        if let Some(prev) = prev_glyph {
            cursor_x += scaled_font.kern(prev, glyph_id);
        }

        let glyph = glyph_id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline_y));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            let left = bounds.min.x as i64 - origin.0;
            let top = bounds.min.y as i64 - origin.1;
            let right = bounds.max.x.ceil() as i64 - origin.0;
            let bottom = bounds.max.y.ceil() as i64 - origin.1;

            if left < mask_w && top < mask_h && right > 0 && bottom > 0 {
                outlined.draw(|px, py, coverage| {
                    let x = left + px as i64;
                    let y = top + py as i64;

                    if x >= 0 && y >= 0 && x < mask_w && y < mask_h {
                        let value = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                        let existing = mask.get_pixel(x as u32, y as u32)[0];
                        mask.put_pixel(x as u32, y as u32, Luma([existing.max(value)]));
                    }
                });
            }
        }

        cursor_x += scaled_font.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }
}

/// Pixels the outline reaches beyond the glyphs on each side.
fn outline_padding(style: &TextStyle) -> u32 {
    (style.stroke_width.max(0.0) / 2.0).ceil() as u32
}

/// Size of the full outlined text layer, padding included.
pub fn text_layer_size(
    glyphs: &GlyphSource,
    text: &str,
    font_size: f32,
    style: &TextStyle,
) -> (u32, u32) {
    let (width, height) = glyphs.measure(text, font_size);
    let padding = outline_padding(style).saturating_mul(2);
    (
        width.max(1).saturating_add(padding),
        height.max(1).saturating_add(padding),
    )
}

fn validate_text(text: &str, font_size: f32) -> Result<(), WatermarkError> {
    if text.is_empty() {
        return Err(WatermarkError::RenderError(
            "Cannot render empty text".to_string(),
        ));
    }
    if !(font_size.is_finite() && font_size > 0.0) {
        return Err(WatermarkError::RenderError(format!(
            "Invalid font size: {font_size}"
        )));
    }
    Ok(())
}

/// Render `text` as an outlined RGBA layer.
///
/// The layer is padded by half the outline width on every side so the
/// outline is never cut off.
pub fn render_text_layer(
    glyphs: &GlyphSource,
    text: &str,
    font_size: f32,
    style: &TextStyle,
) -> Result<RgbaImage, WatermarkError> {
    validate_text(text, font_size)?;
    let (width, height) = text_layer_size(glyphs, text, font_size, style);
    render_text_region(
        glyphs,
        text,
        font_size,
        style,
        &VisibleRegion::full(&WatermarkDimensions { width, height }),
    )
}

/// Render only `region` (in layer pixels) of the outlined text layer.
///
/// Work and memory follow the region size, not the text length. The
/// result matches the same window cut out of [`render_text_layer`].
pub fn render_text_region(
    glyphs: &GlyphSource,
    text: &str,
    font_size: f32,
    style: &TextStyle,
    region: &VisibleRegion,
) -> Result<RgbaImage, WatermarkError> {
    validate_text(text, font_size)?;

    let (layer_w, layer_h) = text_layer_size(glyphs, text, font_size, style);
    let right = region.x.saturating_add(region.width).min(layer_w);
    let bottom = region.y.saturating_add(region.height).min(layer_h);
    if region.x >= right || region.y >= bottom {
        return Err(WatermarkError::RenderError(format!(
            "Region {:?} is outside the {}x{} text layer",
            region, layer_w, layer_h
        )));
    }

    // The fill mask extends past the region by the outline reach so the
    // outline at the region's edges sees the glyphs next to it.
    let radius = outline_padding(style);
    let mask_x = region.x.saturating_sub(radius);
    let mask_y = region.y.saturating_sub(radius);
    let mask_right = right.saturating_add(radius).min(layer_w);
    let mask_bottom = bottom.saturating_add(radius).min(layer_h);

    let mut fill_mask = GrayImage::new(mask_right - mask_x, mask_bottom - mask_y);
    // Text coordinates are layer coordinates minus the outline padding.
    let origin = (
        mask_x as i64 - radius as i64,
        mask_y as i64 - radius as i64,
    );
    glyphs.draw_coverage(&mut fill_mask, text, font_size, origin);
    let stroke_mask = dilate(&fill_mask, style.stroke_width / 2.0);

    let (dx, dy) = (region.x - mask_x, region.y - mask_y);
    Ok(RgbaImage::from_fn(right - region.x, bottom - region.y, |x, y| {
        let stroke = style
            .stroke
            .with_alpha(stroke_mask.get_pixel(x + dx, y + dy)[0]);
        let fill = style.fill.with_alpha(fill_mask.get_pixel(x + dx, y + dy)[0]);
        blend_pixels(stroke, fill)
    }))
}

/// Grow a coverage mask by `radius` pixels using a disc-shaped kernel.
fn dilate(mask: &GrayImage, radius: f32) -> GrayImage {
    if radius <= 0.0 {
        return mask.clone();
    }

    let r = radius.ceil() as i32;
    let r_sq = radius * radius;
    let offsets: Vec<(i32, i32)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| (dx * dx + dy * dy) as f32 <= r_sq)
        .collect();

    let (w, h) = (mask.width() as i32, mask.height() as i32);
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let mut best = 0u8;
        for &(dx, dy) in &offsets {
            let sx = x as i32 + dx;
            let sy = y as i32 + dy;
            if sx >= 0 && sy >= 0 && sx < w && sy < h {
                best = best.max(mask.get_pixel(sx as u32, sy as u32)[0]);
            }
        }
        Luma([best])
    })
}

/// Blend two RGBA pixels using alpha compositing.
fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;

    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}
