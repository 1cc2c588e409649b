//! Render parameters: canvas size, scale and device origin for a region

use crate::geometry::{BoundingBox, Point};

/// Smallest margin used around a project, in inches
pub const MIN_MARGIN: f64 = 0.001;
/// Default raster density
pub const DEFAULT_DPI: f64 = 72.0;
/// Margin used by autosized exports, in inches
pub const DEFAULT_MARGIN: f64 = 0.05;
/// SVG output counts points rather than pixels
pub const SVG_DPI: f64 = 72.0 * 3.0 / 4.0;
/// Margin used by autosized SVG exports
pub const SVG_MARGIN: f64 = 0.1;

/// Rendering quality requested from the exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderType {
    Gdk,
    GdkXor,
    Cairo,
    #[default]
    CairoHighQuality,
}

pub fn clamp_margin(margin: f64) -> f64 {
    if margin.is_nan() || margin < MIN_MARGIN {
        MIN_MARGIN
    } else {
        margin
    }
}

/// Pixel count for a length. Truncates toward zero and never returns an
/// empty canvas.
pub fn pixels(length: f64, dpi: f64) -> u32 {
    ((length * dpi) as u32).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderInfo {
    pub scale_x: f64,
    pub scale_y: f64,
    /// Image space X mapped to the left edge of the canvas
    pub origin_x: f64,
    /// Image space Y mapped to the bottom edge of the canvas
    pub origin_y: f64,
    pub render_type: RenderType,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl RenderInfo {
    /// Canvas covering `bbox` plus `margin` on every side.
    ///
    /// With `aspect_normalize` the larger of width and height becomes the
    /// height, used when stacking rotated boards.
    pub fn autosized(bbox: &BoundingBox, dpi: f64, margin: f64, aspect_normalize: bool) -> Self {
        let margin = clamp_margin(margin);
        let mut width = bbox.width() + margin * 2.0;
        let mut height = bbox.height() + margin * 2.0;
        if aspect_normalize && width > height {
            std::mem::swap(&mut width, &mut height);
        }

        let (left, top) = if bbox.is_empty() {
            (0.0, 0.0)
        } else {
            (bbox.left, bbox.top)
        };

        Self {
            scale_x: dpi,
            scale_y: dpi,
            origin_x: left - margin,
            origin_y: top - margin,
            render_type: RenderType::default(),
            pixel_width: pixels(width, dpi),
            pixel_height: pixels(height, dpi),
        }
    }

    /// Canvas of a fixed physical size anchored at the image origin
    pub fn fixed_size(width: f64, height: f64, dpi: f64) -> Self {
        Self {
            scale_x: dpi,
            scale_y: dpi,
            origin_x: 0.0,
            origin_y: 0.0,
            render_type: RenderType::default(),
            pixel_width: pixels(width, dpi),
            pixel_height: pixels(height, dpi),
        }
    }

    /// Map an image space point to device space (Y grows downward)
    pub fn to_device(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.origin_x) * self.scale_x,
            self.pixel_height as f64 - (p.y - self.origin_y) * self.scale_y,
        )
    }

    /// Physical canvas size in inches
    pub fn physical_size(&self) -> (f64, f64) {
        (
            self.pixel_width as f64 / self.scale_x,
            self.pixel_height as f64 / self.scale_y,
        )
    }
}
