//! Project: the ordered set of layers rendered together
//!
//! Layers are appended as files load and are drawn in order, later layers on
//! top. The union bounding box is visibility independent: every layer is
//! forced visible while it is computed and restored afterwards.

use crate::color::Color;
use crate::error::{GerbvError, Result};
use crate::export::{ExportFormat, Exporter};
use crate::geometry::BoundingBox;
use crate::layer::Layer;
use crate::loader::{GerberLoader, Loader};
use crate::render::{clamp_margin, RenderInfo, DEFAULT_DPI, MIN_MARGIN, SVG_DPI, SVG_MARGIN};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Project {
    layers: Vec<Layer>,
    background: Color,
    margin: f64,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

/// Forces every layer visible for as long as it lives
struct ForcedVisibility<'a> {
    layers: &'a mut [Layer],
    saved: Vec<bool>,
}

impl<'a> ForcedVisibility<'a> {
    fn new(layers: &'a mut [Layer]) -> Self {
        let saved = layers.iter().map(Layer::is_visible).collect();
        for layer in layers.iter_mut() {
            layer.set_visible(true);
        }
        Self { layers, saved }
    }

    fn layers(&self) -> &[Layer] {
        &*self.layers
    }
}

impl Drop for ForcedVisibility<'_> {
    fn drop(&mut self) {
        for (layer, visible) in self.layers.iter_mut().zip(&self.saved) {
            layer.set_visible(*visible);
        }
    }
}

impl Project {
    /// Empty project with a white background
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            background: Color::new(1.0, 1.0, 1.0, 1.0),
            margin: MIN_MARGIN,
        }
    }

    /// Load a Gerber file as a new top layer
    pub fn open_layer_from_filename(&mut self, path: impl AsRef<Path>) -> Result<&mut Layer> {
        self.open_layer_with(&GerberLoader::default(), path)
    }

    /// Load a file with `loader` as a new top layer. On failure the project
    /// is left unchanged.
    pub fn open_layer_with(
        &mut self,
        loader: &dyn Loader,
        path: impl AsRef<Path>,
    ) -> Result<&mut Layer> {
        let path = path.as_ref();
        let image = match loader.load(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                return Err(e);
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!(
            "Loaded layer {} ({} nets) as layer {}",
            name,
            image.net_count(),
            self.layers.len()
        );

        let index = self.add_layer(Layer::new(image, name).with_path(path));
        Ok(&mut self.layers[index])
    }

    /// Append an already built layer, returning its index
    pub fn add_layer(&mut self, layer: Layer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    pub fn files_loaded(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn layer(&self, index: usize) -> Result<&Layer> {
        let count = self.layers.len();
        self.layers
            .get(index)
            .ok_or(GerbvError::LayerNotFound { index, count })
    }

    pub fn layer_mut(&mut self, index: usize) -> Result<&mut Layer> {
        let count = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or(GerbvError::LayerNotFound { index, count })
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: impl Into<Color>) {
        self.background = color.into();
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn set_margin(&mut self, margin: f64) {
        self.margin = clamp_margin(margin);
    }

    /// Union of every layer's native extents, whatever their visibility
    pub fn bounding_box(&mut self) -> Result<BoundingBox> {
        if self.layers.is_empty() {
            return Err(GerbvError::NoLayersLoaded);
        }

        let forced = ForcedVisibility::new(&mut self.layers);
        let mut bbox = BoundingBox::empty();
        for layer in forced.layers().iter().filter(|l| l.is_visible()) {
            bbox.include_box(&layer.extents());
        }
        drop(forced);

        debug!(
            "Project bounding box: ({}, {}) - ({}, {})",
            bbox.left, bbox.top, bbox.right, bbox.bottom
        );
        Ok(bbox)
    }

    pub fn min_x(&mut self) -> Result<f64> {
        Ok(self.bounding_box()?.left)
    }

    pub fn min_y(&mut self) -> Result<f64> {
        Ok(self.bounding_box()?.top)
    }

    pub fn max_x(&mut self) -> Result<f64> {
        Ok(self.bounding_box()?.right)
    }

    pub fn max_y(&mut self) -> Result<f64> {
        Ok(self.bounding_box()?.bottom)
    }

    pub fn width(&mut self) -> Result<f64> {
        Ok(self.bounding_box()?.width())
    }

    pub fn height(&mut self) -> Result<f64> {
        Ok(self.bounding_box()?.height())
    }

    /// Render parameters covering the whole project plus `margin`
    pub fn render_info(&mut self, dpi: f64, margin: f64, aspect_normalize: bool) -> Result<RenderInfo> {
        let bbox = self.bounding_box()?;
        Ok(RenderInfo::autosized(&bbox, dpi, margin, aspect_normalize))
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        for layer in &mut self.layers {
            layer.translate(x, y);
        }
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        for layer in &mut self.layers {
            layer.scale(x, y);
        }
    }

    /// Rotate every layer by `theta` radians, then shift it up by the
    /// project width measured before the rotation
    pub fn rotate(&mut self, theta: f64) {
        let width = match self.bounding_box() {
            Ok(bbox) if !bbox.is_empty() => bbox.width(),
            _ => 0.0,
        };
        for layer in &mut self.layers {
            layer.rotate(theta);
            layer.translate(0.0, width);
        }
    }

    pub fn mirror(&mut self, around_x: bool, around_y: bool) {
        for layer in &mut self.layers {
            layer.mirror(around_x, around_y);
        }
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        for layer in &mut self.layers {
            layer.set_inverted(inverted);
        }
    }

    /// Run `exporter` over the project. Fails before touching `path` when no
    /// layer is loaded.
    pub fn export_with(&self, exporter: &dyn Exporter, info: &RenderInfo, path: &Path) -> Result<()> {
        if self.layers.is_empty() {
            return Err(GerbvError::NoLayersLoaded);
        }
        info!(
            "Exporting {} layers to {} ({}x{})",
            self.layers.len(),
            path.display(),
            info.pixel_width,
            info.pixel_height
        );
        exporter.export(self, info, path)?;
        debug!("Export of {} finished", path.display());
        Ok(())
    }

    /// Export in `format` with explicit render parameters
    pub fn export(&self, format: ExportFormat, info: &RenderInfo, path: impl AsRef<Path>) -> Result<()> {
        let exporter = format.exporter();
        self.export_with(exporter.as_ref(), info, path.as_ref())
    }

    /// PNG page of `size` inches anchored at the origin
    pub fn export_png(&self, path: impl AsRef<Path>, size: (f64, f64)) -> Result<()> {
        let info = RenderInfo::fixed_size(size.0, size.1, DEFAULT_DPI);
        self.export(ExportFormat::Png, &info, path)
    }

    /// PDF page of `size` inches anchored at the origin
    pub fn export_pdf(&self, path: impl AsRef<Path>, size: (f64, f64)) -> Result<()> {
        let info = RenderInfo::fixed_size(size.0, size.1, DEFAULT_DPI);
        self.export(ExportFormat::Pdf, &info, path)
    }

    /// PNG covering the whole project plus the project margin
    pub fn export_png_autosized(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.export_autosized(ExportFormat::Png, DEFAULT_DPI, self.margin, path)
    }

    /// PDF covering the whole project plus the project margin
    pub fn export_pdf_autosized(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.export_autosized(ExportFormat::Pdf, DEFAULT_DPI, self.margin, path)
    }

    /// SVG covering the whole project, measured in points
    pub fn export_svg_autosized(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.export_autosized(ExportFormat::Svg, SVG_DPI, SVG_MARGIN, path)
    }

    fn export_autosized(
        &mut self,
        format: ExportFormat,
        dpi: f64,
        margin: f64,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let info = self.render_info(dpi, margin, false)?;
        self.export(format, &info, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::ApertureType;
    use crate::geometry::Point;
    use crate::image::Image;

    fn unit_square_layer(offset: f64) -> Layer {
        let mut image = Image::default();
        image
            .append_line(
                Point::new(offset, offset),
                Point::new(offset + 1.0, offset + 1.0),
                0.0,
                ApertureType::Circle,
            )
            .unwrap();
        Layer::new(image, format!("layer{}", offset))
    }

    #[test]
    fn test_new_project_defaults() {
        let project = Project::new();

        assert_eq!(project.files_loaded(), 0);
        assert_eq!(project.margin(), 0.001);
        assert_eq!(project.background().components(), (1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_set_margin_clamps() {
        let mut project = Project::new();
        project.set_margin(0.0);
        assert_eq!(project.margin(), 0.001);
        project.set_margin(0.25);
        assert_eq!(project.margin(), 0.25);
    }

    #[test]
    fn test_bounding_box_requires_layers() {
        let mut project = Project::new();
        assert!(matches!(project.bounding_box(), Err(GerbvError::NoLayersLoaded)));
        assert!(matches!(
            project.render_info(72.0, 0.05, false),
            Err(GerbvError::NoLayersLoaded)
        ));
    }

    #[test]
    fn test_bounding_box_ignores_and_restores_visibility() {
        let mut project = Project::new();
        project.add_layer(unit_square_layer(0.0));
        project.add_layer(unit_square_layer(2.0));
        project.layer_mut(1).unwrap().set_visible(false);

        let first = project.bounding_box().unwrap();
        let second = project.bounding_box().unwrap();

        assert_eq!(first, second);
        assert_eq!((first.left, first.top, first.right, first.bottom), (0.0, 0.0, 3.0, 3.0));
        assert!(project.layer(0).unwrap().is_visible());
        assert!(!project.layer(1).unwrap().is_visible());
    }

    #[test]
    fn test_render_info_for_unit_square() {
        let mut project = Project::new();
        project.add_layer(unit_square_layer(0.0));

        let info = project.render_info(72.0, 0.05, false).unwrap();
        assert_eq!((info.pixel_width, info.pixel_height), (79, 79));
        assert!((info.origin_x + 0.05).abs() < 1e-12);
        assert!((info.origin_y + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_layer_lookup_out_of_range() {
        let project = Project::new();
        assert!(matches!(
            project.layer(3),
            Err(GerbvError::LayerNotFound { index: 3, count: 0 })
        ));
    }

    #[test]
    fn test_project_transforms_forward_to_layers() {
        let mut project = Project::new();
        project.add_layer(unit_square_layer(0.0));
        project.add_layer(unit_square_layer(0.0));

        project.translate(1.0, 2.0);
        project.scale(2.0, 3.0);
        project.rotate(0.5);

        for layer in project.layers() {
            let t = layer.transform();
            assert_eq!(t.translate_x, 1.0);
            // width before rotation is 1.0
            assert_eq!(t.translate_y, 3.0);
            assert_eq!((t.scale_x, t.scale_y), (2.0, 3.0));
            assert_eq!(t.rotation, 0.5);
        }
    }

    #[test]
    fn test_export_without_layers_creates_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.png");
        let mut project = Project::new();

        assert!(matches!(
            project.export_png(&path, (1.0, 1.0)),
            Err(GerbvError::NoLayersLoaded)
        ));
        assert!(matches!(
            project.export_svg_autosized(&path),
            Err(GerbvError::NoLayersLoaded)
        ));
        assert!(!path.exists());
    }
}
