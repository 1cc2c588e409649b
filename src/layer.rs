//! One loaded source file mapped to one image, with display settings and a
//! user transform

use crate::color::{channel_to_u16, Color};
use crate::error::Result;
use crate::geometry::{BoundingBox, Point, UserTransform};
use crate::image::Image;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Layer {
    image: Image,
    color: Color,
    alpha: f64,
    alpha_raw: u16,
    is_visible: bool,
    transform: UserTransform,
    /// File name shown to users
    pub name: String,
    pub full_path: Option<PathBuf>,
}

impl Layer {
    /// Wrap an image: colour `(0, 0, 0, 0)`, alpha 1, visible, identity transform
    pub fn new(image: Image, name: impl Into<String>) -> Self {
        Self {
            image,
            color: Color::default(),
            alpha: 1.0,
            alpha_raw: u16::MAX,
            is_visible: true,
            transform: UserTransform::identity(),
            name: name.into(),
            full_path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.full_path = Some(path.into());
        self
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    /// Swap in a new image, returning the previous one
    pub fn replace_image(&mut self, image: Image) -> Image {
        std::mem::replace(&mut self.image, image)
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: impl Into<Color>) {
        self.color = color.into();
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Alpha as handed to the renderer
    pub fn alpha_raw(&self) -> u16 {
        self.alpha_raw
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
        self.alpha_raw = channel_to_u16(alpha);
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.is_visible = visible;
    }

    pub fn transform(&self) -> &UserTransform {
        &self.transform
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.transform.translate(x, y);
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        self.transform.scale(x, y);
    }

    pub fn rotate(&mut self, theta: f64) {
        self.transform.rotate(theta);
    }

    pub fn mirror(&mut self, around_x: bool, around_y: bool) {
        self.transform.mirror(around_x, around_y);
    }

    pub fn inverted(&self) -> bool {
        self.transform.inverted
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.transform.set_inverted(inverted);
    }

    /// Extents of the image in native coordinates, ignoring the user transform
    pub fn extents(&self) -> BoundingBox {
        self.image.extents()
    }

    pub fn min_x(&self) -> f64 {
        self.image.info.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.image.info.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.image.info.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.image.info.max_y
    }

    /// Replace this layer's image with a panel of copies at `positions`
    pub fn panelize(&mut self, positions: &[Point], rotation: f64, translate: Point) -> Result<()> {
        let panel = self.image.panelize(positions, rotation, translate)?;
        debug!("Layer {} replaced by a {} copy panel", self.name, positions.len());
        self.image = panel;
        Ok(())
    }
}
