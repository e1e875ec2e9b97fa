//! Geometry for watermark placement.
//!
//! Positions are stored normalized to the base canvas (an [`Anchor`] in
//! `[0,1]` on each axis) so a composition renders the same way at preview
//! and at export resolution. This module converts between the normalized
//! form, canvas pixels and on-screen pointer coordinates.
//!
//! # Example
//!
//! ```ignore
//! use inkmark::watermark::position::{centered_origin, Anchor, CanvasDimensions, WatermarkDimensions};
//!
//! let canvas = CanvasDimensions { width: 800, height: 600 };
//! let watermark = WatermarkDimensions { width: 100, height: 50 };
//!
//! let origin = centered_origin(Anchor::new(0.5, 0.5), &canvas, &watermark);
//! assert_eq!((origin.x, origin.y), (350, 275));
//! ```

/// Smallest rendered width of an image watermark, in pixels.
pub const MIN_IMAGE_WATERMARK_WIDTH: f32 = 16.0;

/// Smallest rendered font size of a text watermark, in pixels.
pub const MIN_FONT_SIZE: f32 = 12.0;

/// Font size per unit of scale, relative to canvas width.
pub const TEXT_SCALE_FACTOR: f32 = 0.05;

/// Dimensions of the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasDimensions {
    pub width: u32,
    pub height: u32,
}

impl CanvasDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Dimensions of a rendered watermark layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkDimensions {
    pub width: u32,
    pub height: u32,
}

/// Top-left pixel where a layer is drawn. May be negative or past the
/// canvas edge; drawing clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPosition {
    pub x: i32,
    pub y: i32,
}

impl PlacementPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Normalized position of the watermark's center on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    /// Create an anchor, clamping each axis into `[0,1]`.
    ///
    /// NaN maps to the center of its axis.
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::center()
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// On-screen bounding rectangle of the rendered canvas, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A rectangle at the origin covering `canvas` one-to-one.
    pub fn from_canvas(canvas: &CanvasDimensions) -> Self {
        Self::new(0.0, 0.0, canvas.width as f32, canvas.height as f32)
    }
}

/// Map device coordinates to a clamped, normalized anchor.
///
/// Returns `None` when the rectangle has no area.
pub fn normalize_pointer(client_x: f32, client_y: f32, rect: &CanvasRect) -> Option<Anchor> {
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return None;
    }

    let x = (client_x - rect.left) / rect.width;
    let y = (client_y - rect.top) / rect.height;
    Some(Anchor::new(x, y))
}

/// Rendered size of an image watermark, before rounding to pixels.
///
/// Width is `max(16, scale * canvas width)`; height keeps the asset's
/// native aspect ratio.
pub fn image_watermark_size(
    native: &WatermarkDimensions,
    canvas: &CanvasDimensions,
    scale: f32,
) -> (f32, f32) {
    let width = (scale * canvas.width as f32).max(MIN_IMAGE_WATERMARK_WIDTH);
    let aspect = native.height as f32 / native.width.max(1) as f32;
    (width, width * aspect)
}

/// Font size of a text watermark: `max(12, canvas width * scale * 0.05)`.
pub fn text_font_size(canvas: &CanvasDimensions, scale: f32) -> f32 {
    (canvas.width as f32 * scale * TEXT_SCALE_FACTOR).max(MIN_FONT_SIZE)
}

/// Top-left origin that centers a layer of `watermark` size on the anchor.
pub fn centered_origin(
    anchor: Anchor,
    canvas: &CanvasDimensions,
    watermark: &WatermarkDimensions,
) -> PlacementPosition {
    let cx = anchor.x * canvas.width as f32;
    let cy = anchor.y * canvas.height as f32;
    PlacementPosition::new(
        (cx - watermark.width as f32 / 2.0).round() as i32,
        (cy - watermark.height as f32 / 2.0).round() as i32,
    )
}

/// Part of a layer that lands on the canvas, in layer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl VisibleRegion {
    /// The whole layer.
    pub fn full(watermark: &WatermarkDimensions) -> Self {
        Self {
            x: 0,
            y: 0,
            width: watermark.width,
            height: watermark.height,
        }
    }

    /// Canvas position of the region's top-left pixel for a layer at `pos`.
    pub fn canvas_position(&self, pos: &PlacementPosition) -> PlacementPosition {
        PlacementPosition::new(
            (pos.x as i64 + self.x as i64) as i32,
            (pos.y as i64 + self.y as i64) as i32,
        )
    }
}

/// Intersect a layer placed at `pos` with the canvas.
///
/// Returns `None` when no pixel of the layer is on the canvas. The region
/// is never larger than the canvas, whatever the layer size.
pub fn visible_region(
    pos: &PlacementPosition,
    canvas: &CanvasDimensions,
    watermark: &WatermarkDimensions,
) -> Option<VisibleRegion> {
    let (x, y) = (pos.x as i64, pos.y as i64);
    let left = (-x).max(0);
    let top = (-y).max(0);
    let right = (canvas.width as i64 - x).min(watermark.width as i64);
    let bottom = (canvas.height as i64 - y).min(watermark.height as i64);

    if left >= right || top >= bottom {
        return None;
    }
    Some(VisibleRegion {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}
