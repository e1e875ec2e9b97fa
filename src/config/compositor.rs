//! Compositor configuration: canvas size, frame pacing and text styling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::watermark::scheduler::DEFAULT_FRAME_RATE;
use crate::watermark::text_renderer::{parse_hex_color, GlyphSource, TextStyle};
use crate::watermark::WatermarkError;

fn default_canvas_width() -> u32 {
    1200
}

fn default_canvas_height() -> u32 {
    800
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

fn default_fill_color() -> String {
    "#FFFFFF".to_string()
}

fn default_stroke_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> f32 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositorConfig {
    /// Target canvas width in pixels (default: 1200)
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,
    /// Target canvas height in pixels (default: 800)
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,
    /// Maximum redraws per second (default: 60)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// TrueType/OpenType font for text watermarks. Built-in bitmap font if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<String>,
    #[serde(default = "default_fill_color")]
    pub fill_color: String,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    /// Outline width in pixels (default: 2)
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            frame_rate: default_frame_rate(),
            font_path: None,
            fill_color: default_fill_color(),
            stroke_color: default_stroke_color(),
            stroke_width: default_stroke_width(),
        }
    }
}

impl CompositorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(format!(
                "compositor: canvas dimensions must be > 0, got {}x{}",
                self.canvas_width, self.canvas_height
            ));
        }
        if !(1..=240).contains(&self.frame_rate) {
            return Err(format!(
                "compositor: frame_rate must be between 1 and 240, got {}",
                self.frame_rate
            ));
        }
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(format!(
                "compositor: stroke_width must be >= 0, got {}",
                self.stroke_width
            ));
        }
        self.text_style().map_err(|e| format!("compositor: {}", e))?;
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }

    pub fn text_style(&self) -> Result<TextStyle, WatermarkError> {
        Ok(TextStyle {
            fill: parse_hex_color(&self.fill_color)?,
            stroke: parse_hex_color(&self.stroke_color)?,
            stroke_width: self.stroke_width,
        })
    }

    /// Load the configured font, or the built-in one.
    pub fn glyph_source(&self) -> Result<GlyphSource, WatermarkError> {
        match &self.font_path {
            Some(path) => GlyphSource::from_font_file(path),
            None => Ok(GlyphSource::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::text_renderer::Color;

    #[test]
    fn test_defaults() {
        let config: CompositorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, CompositorConfig::default());
        assert_eq!(config.canvas_width, 1200);
        assert_eq!(config.canvas_height, 800);
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.stroke_width, 2.0);
    }

    #[test]
    fn test_text_style_parses_colors() {
        let config = CompositorConfig {
            fill_color: "#F00".to_string(),
            stroke_color: "#00ff00".to_string(),
            ..CompositorConfig::default()
        };
        let style = config.text_style().unwrap();
        assert_eq!(style.fill, Color::new(255, 0, 0));
        assert_eq!(style.stroke, Color::new(0, 255, 0));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_rate = CompositorConfig {
            frame_rate: 0,
            ..CompositorConfig::default()
        };
        assert!(bad_rate.validate().unwrap_err().contains("frame_rate"));

        let bad_canvas = CompositorConfig {
            canvas_width: 0,
            ..CompositorConfig::default()
        };
        assert!(bad_canvas.validate().unwrap_err().contains("canvas"));

        let bad_color = CompositorConfig {
            fill_color: "white".to_string(),
            ..CompositorConfig::default()
        };
        assert!(bad_color.validate().is_err());
    }

    #[test]
    fn test_missing_font_file_is_error() {
        let config = CompositorConfig {
            font_path: Some("/nonexistent/font.ttf".to_string()),
            ..CompositorConfig::default()
        };
        assert!(config.glyph_source().is_err());
    }
}
