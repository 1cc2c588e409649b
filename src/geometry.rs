//! Geometric primitives shared by the image model
//!
//! All lengths are inches. Angles of circular segments are degrees, the
//! rotation of a [`UserTransform`] is radians.

use std::f64::consts::PI;

/// A point in image space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub(crate) fn rotated(self, theta: f64) -> Self {
        if theta == 0.0 {
            return self;
        }
        let (sin, cos) = theta.sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis aligned extent. `top` holds the minimum Y and `bottom` the maximum Y,
/// following the render-size convention of the rendering engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// A box containing nothing; any include grows it
    pub const fn empty() -> Self {
        Self {
            left: f64::INFINITY,
            right: f64::NEG_INFINITY,
            top: f64::INFINITY,
            bottom: f64::NEG_INFINITY,
        }
    }

    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.left <= self.right && self.top <= self.bottom)
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.right - self.left
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.bottom - self.top
        }
    }

    pub fn include_point(&mut self, p: Point) {
        self.left = self.left.min(p.x);
        self.right = self.right.max(p.x);
        self.top = self.top.min(p.y);
        self.bottom = self.bottom.max(p.y);
    }

    pub fn include_box(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.left = self.left.min(other.left);
        self.right = self.right.max(other.right);
        self.top = self.top.min(other.top);
        self.bottom = self.bottom.max(other.bottom);
    }

    /// Grow outward by half extents, e.g. half an aperture width
    pub fn expanded(&self, dx: f64, dy: f64) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self {
            left: self.left - dx,
            right: self.right + dx,
            top: self.top - dy,
            bottom: self.bottom + dy,
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left, self.top),
            Point::new(self.right, self.top),
            Point::new(self.right, self.bottom),
            Point::new(self.left, self.bottom),
        ]
    }
}

/// Circular segment of an arc net
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleSegment {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    /// Start angle in degrees
    pub angle1: f64,
    /// End angle in degrees
    pub angle2: f64,
}

impl CircleSegment {
    pub fn radius(&self) -> f64 {
        self.width / 2.0
    }

    pub fn point_at(&self, degrees: f64) -> Point {
        let rad = degrees.to_radians();
        Point::new(
            self.center.x + self.radius() * rad.cos(),
            self.center.y + self.radius() * rad.sin(),
        )
    }

    /// Exact extent of the swept arc
    pub fn bounds(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        let (lo, hi) = if self.angle1 <= self.angle2 {
            (self.angle1, self.angle2)
        } else {
            (self.angle2, self.angle1)
        };
        bbox.include_point(self.point_at(lo));
        bbox.include_point(self.point_at(hi));

        if hi - lo >= 360.0 {
            let r = self.radius();
            bbox.include_point(Point::new(self.center.x - r, self.center.y - r));
            bbox.include_point(Point::new(self.center.x + r, self.center.y + r));
            return bbox;
        }

        let mut quadrant = (lo / 90.0).ceil() * 90.0;
        while quadrant <= hi {
            bbox.include_point(self.point_at(quadrant));
            quadrant += 90.0;
        }
        bbox
    }

    /// Polyline approximation with at most `step` degrees per segment
    pub fn flatten(&self, step: f64) -> Vec<Point> {
        let sweep = self.angle2 - self.angle1;
        let count = ((sweep.abs() / step).ceil() as usize).max(1);
        (0..=count)
            .map(|i| self.point_at(self.angle1 + sweep * i as f64 / count as f64))
            .collect()
    }
}

/// Per layer user transformation.
///
/// Applied as scale, rotate, mirror, then translate. Inversion is a polarity
/// flip of the composited layer and does not move geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Radians, counter clockwise
    pub rotation: f64,
    pub mirror_around_x: bool,
    pub mirror_around_y: bool,
    pub inverted: bool,
}

impl Default for UserTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl UserTransform {
    pub const fn identity() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            mirror_around_x: false,
            mirror_around_y: false,
            inverted: false,
        }
    }

    /// Pure offset plus rotation, as used when copying an image onto a panel
    pub fn placement(translate_x: f64, translate_y: f64, rotation: f64) -> Self {
        Self {
            translate_x,
            translate_y,
            rotation,
            ..Self::identity()
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.translate_x += dx;
        self.translate_y += dy;
    }

    pub fn scale(&mut self, kx: f64, ky: f64) {
        self.scale_x *= kx;
        self.scale_y *= ky;
    }

    pub fn rotate(&mut self, dtheta: f64) {
        self.rotation += dtheta;
    }

    pub fn mirror(&mut self, around_x: bool, around_y: bool) {
        self.mirror_around_x = around_x;
        self.mirror_around_y = around_y;
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    pub fn apply(&self, p: Point) -> Point {
        let scaled = Point::new(p.x * self.scale_x, p.y * self.scale_y);
        let mut q = scaled.rotated(self.rotation);
        if self.mirror_around_x {
            q.y = -q.y;
        }
        if self.mirror_around_y {
            q.x = -q.x;
        }
        Point::new(q.x + self.translate_x, q.y + self.translate_y)
    }

    /// Transform a circular segment. Exact for uniform scale.
    pub fn apply_segment(&self, seg: &CircleSegment) -> CircleSegment {
        let (mut a1, mut a2) = (seg.angle1, seg.angle2);
        if self.scale_x < 0.0 {
            (a1, a2) = (180.0 - a1, 180.0 - a2);
        }
        if self.scale_y < 0.0 {
            (a1, a2) = (-a1, -a2);
        }
        a1 += self.rotation.to_degrees();
        a2 += self.rotation.to_degrees();
        if self.mirror_around_x {
            (a1, a2) = (-a1, -a2);
        }
        if self.mirror_around_y {
            (a1, a2) = (180.0 - a1, 180.0 - a2);
        }
        CircleSegment {
            center: self.apply(seg.center),
            width: seg.width * self.scale_x.abs(),
            height: seg.height * self.scale_y.abs(),
            angle1: a1,
            angle2: a2,
        }
    }

    /// Whether the transform reverses orientation (clockwise becomes counter clockwise)
    pub fn flips_orientation(&self) -> bool {
        let mut flips = (self.scale_x < 0.0) != (self.scale_y < 0.0);
        flips ^= self.mirror_around_x;
        flips ^= self.mirror_around_y;
        flips
    }

    /// Rotation reduced to a whole number of quarter turns, if it is one
    pub fn quarter_turns(&self) -> Option<i64> {
        let turns = self.rotation / (PI / 2.0);
        let rounded = turns.round();
        ((turns - rounded).abs() < 1e-9).then_some(rounded as i64)
    }
}
