//! PNG output: every layer is rasterized into a coverage mask which is then
//! composited over the background with the layer colour and alpha

use super::scene::{circle_outline, Geometry, Scene, Shape};
use super::Exporter;
use crate::error::{GerbvError, Result};
use crate::geometry::Point;
use crate::project::Project;
use crate::render::RenderInfo;
use image::{GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use std::path::Path;
use tracing::debug;

const DARK: u8 = 255;
const CLEAR: u8 = 0;

/// Largest RGBA canvas allocated, in bytes (a 32768 x 32768 page)
const MAX_CANVAS_BYTES: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct PngExporter;

impl Exporter for PngExporter {
    fn export(&self, project: &Project, info: &RenderInfo, path: &Path) -> Result<()> {
        check_canvas(info.pixel_width, info.pixel_height)?;
        let scene = Scene::build(project, info);
        let canvas = rasterize(&scene);
        canvas
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| GerbvError::export(format!("cannot write {}: {}", path.display(), e)))
    }
}

/// Reject canvases that cannot be allocated
fn check_canvas(width: u32, height: u32) -> Result<()> {
    let bytes = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .filter(|bytes| *bytes <= MAX_CANVAS_BYTES && usize::try_from(*bytes).is_ok());
    match bytes {
        Some(_) => Ok(()),
        None => Err(GerbvError::export(format!(
            "{}x{} pixel canvas is too large",
            width, height
        ))),
    }
}

/// Callers go through [`check_canvas`] first
pub(crate) fn rasterize(scene: &Scene) -> RgbaImage {
    let (width, height) = (scene.width, scene.height);
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(scene.background.to_rgba8()));

    for layer in &scene.layers {
        let mut mask = GrayImage::new(width, height);
        for shape in &layer.shapes {
            paint(&mut mask, shape);
        }
        if layer.inverted {
            for pixel in mask.pixels_mut() {
                pixel.0[0] = DARK - pixel.0[0];
            }
        }

        let [r, g, b] = layer.color.to_rgb8();
        let alpha = layer.alpha.clamp(0.0, 1.0);
        for (x, y, coverage) in mask.enumerate_pixels() {
            if coverage.0[0] == CLEAR {
                continue;
            }
            let a = alpha * coverage.0[0] as f64 / DARK as f64;
            blend(canvas.get_pixel_mut(x, y), [r, g, b], a);
        }
        debug!("Rasterized layer {} ({} shapes)", layer.name, layer.shapes.len());
    }
    canvas
}

fn blend(dst: &mut Rgba<u8>, src: [u8; 3], a: f64) {
    for (d, s) in dst.0.iter_mut().zip(src) {
        *d = (s as f64 * a + *d as f64 * (1.0 - a)).round() as u8;
    }
    let dst_a = dst.0[3] as f64 / 255.0;
    dst.0[3] = ((a + dst_a * (1.0 - a)) * 255.0).round() as u8;
}

fn paint(mask: &mut GrayImage, shape: &Shape) {
    let value = if shape.clear { CLEAR } else { DARK };
    match &shape.geometry {
        Geometry::Fill(outline) => fill_polygon(mask, outline, value),
        Geometry::Stroke { path, width } => {
            // Thinner than a pixel still leaves a hairline
            let half = (width / 2.0).max(0.5);
            for pair in path.windows(2) {
                if let Some(quad) = segment_quad(pair[0], pair[1], half) {
                    fill_polygon(mask, &quad, value);
                }
            }
            let segments = ((half * 2.0) as usize).clamp(8, 64);
            for p in path {
                fill_polygon(mask, &circle_outline(*p, half, segments), value);
            }
        }
    }
}

fn segment_quad(a: Point, b: Point, half: f64) -> Option<[Point; 4]> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len < 1e-12 {
        return None;
    }
    let (nx, ny) = (-dy / len * half, dx / len * half);
    Some([
        Point::new(a.x + nx, a.y + ny),
        Point::new(b.x + nx, b.y + ny),
        Point::new(b.x - nx, b.y - ny),
        Point::new(a.x - nx, a.y - ny),
    ])
}

/// Scanline fill with the non-zero rule, sampling pixel centres
fn fill_polygon(mask: &mut GrayImage, outline: &[Point], value: u8) {
    if outline.len() < 3 {
        return;
    }
    let (width, height) = mask.dimensions();
    let min_y = outline.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = outline.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    let first_row = ((min_y - 0.5).ceil().max(0.0)) as i64;
    let last_row = ((max_y - 0.5).floor()).min(height as f64 - 1.0) as i64;
    let mut crossings: Vec<(f64, i32)> = Vec::new();

    for row in first_row..=last_row {
        let cy = row as f64 + 0.5;
        crossings.clear();
        for (i, a) in outline.iter().enumerate() {
            let b = outline[(i + 1) % outline.len()];
            if (a.y <= cy) != (b.y <= cy) {
                let t = (cy - a.y) / (b.y - a.y);
                let direction = if b.y > a.y { 1 } else { -1 };
                crossings.push((a.x + t * (b.x - a.x), direction));
            }
        }
        crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

        let mut winding = 0;
        for i in 0..crossings.len() {
            winding += crossings[i].1;
            if winding == 0 || i + 1 >= crossings.len() {
                continue;
            }
            let start = ((crossings[i].0 - 0.5).ceil().max(0.0)) as u32;
            let end = ((crossings[i + 1].0 - 0.5).ceil().min(width as f64)).max(0.0) as u32;
            for x in start..end {
                mask.put_pixel(x, row as u32, Luma([value]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::{ApertureType, Unit};
    use crate::image::Image;
    use crate::layer::Layer;
    use crate::net::{LayerPolarity, LayerState};

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// 0.5 inch square flashed in the middle of a 1 inch page
    fn pad_image() -> Image {
        let mut image = Image::default();
        image
            .define_aperture(10, ApertureType::Rectangle, &[0.5, 0.5], Unit::Inch)
            .unwrap();
        image.append_flash(Point::new(0.5, 0.5), 10).unwrap();
        image
    }

    fn render(image: Image, setup: impl FnOnce(&mut Layer)) -> RgbaImage {
        let mut project = Project::new();
        let index = project.add_layer(Layer::new(image, "pad"));
        setup(project.layer_mut(index).unwrap());
        let info = RenderInfo::fixed_size(1.0, 1.0, 72.0);
        rasterize(&Scene::build(&project, &info))
    }

    #[test]
    fn test_canvas_size_limit() {
        assert!(check_canvas(72, 72).is_ok());
        assert!(check_canvas(32768, 32768).is_ok());
        assert!(matches!(
            check_canvas(32769, 32768),
            Err(GerbvError::Export { .. })
        ));
        assert!(check_canvas(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_oversized_export_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("huge.png");
        let mut project = Project::new();
        project.add_layer(Layer::new(pad_image(), "pad"));

        let info = RenderInfo::fixed_size(1e9, 1e9, 72.0);
        let result = PngExporter.export(&project, &info, &path);

        assert!(matches!(result, Err(GerbvError::Export { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn test_flash_is_painted_over_background() {
        let canvas = render(pad_image(), |_| {});

        assert_eq!(canvas.dimensions(), (72, 72));
        assert_eq!(*canvas.get_pixel(36, 36), BLACK);
        assert_eq!(*canvas.get_pixel(2, 2), WHITE);
        assert_eq!(*canvas.get_pixel(70, 36), WHITE);
    }

    #[test]
    fn test_layer_colour_and_alpha() {
        let canvas = render(pad_image(), |layer| {
            layer.set_color((1.0, 0.0, 0.0));
            layer.set_alpha(0.5);
        });

        let p = canvas.get_pixel(36, 36);
        assert_eq!(p.0[0], 255);
        assert_eq!(p.0[1], 128);
        assert_eq!(p.0[3], 255);
    }

    #[test]
    fn test_clear_level_erases() {
        let mut image = pad_image();
        image
            .define_aperture(11, ApertureType::Circle, &[0.2], Unit::Inch)
            .unwrap();
        image.push_layer_state(LayerState {
            polarity: LayerPolarity::Clear,
            ..LayerState::default()
        });
        image.append_flash(Point::new(0.5, 0.5), 11).unwrap();

        let canvas = render(image, |_| {});
        assert_eq!(*canvas.get_pixel(36, 36), WHITE);
        assert_eq!(*canvas.get_pixel(22, 36), BLACK);
    }

    #[test]
    fn test_inverted_layer_draws_complement() {
        let canvas = render(pad_image(), |layer| layer.set_inverted(true));

        assert_eq!(*canvas.get_pixel(36, 36), WHITE);
        assert_eq!(*canvas.get_pixel(2, 2), BLACK);
    }

    #[test]
    fn test_translated_layer_moves() {
        let canvas = render(pad_image(), |layer| layer.translate(0.5, 0.0));

        assert_eq!(*canvas.get_pixel(30, 36), WHITE);
        assert_eq!(*canvas.get_pixel(60, 36), BLACK);
    }

    #[test]
    fn test_fill_polygon_nonzero() {
        let mut mask = GrayImage::new(10, 10);
        let square = [
            Point::new(2.0, 2.0),
            Point::new(8.0, 2.0),
            Point::new(8.0, 8.0),
            Point::new(2.0, 8.0),
        ];
        fill_polygon(&mut mask, &square, DARK);

        assert_eq!(mask.get_pixel(5, 5).0[0], DARK);
        assert_eq!(mask.get_pixel(2, 2).0[0], DARK);
        assert_eq!(mask.get_pixel(8, 5).0[0], CLEAR);
        assert_eq!(mask.get_pixel(1, 5).0[0], CLEAR);
    }
}
