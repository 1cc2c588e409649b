//! Nets (single draw/flash instructions) and the layer/netstate chains that
//! modulate how they composite

use crate::aperture::{Aperture, Unit};
use crate::geometry::{BoundingBox, CircleSegment, Point};
use tracing::warn;

/// Most copies a step-and-repeat block expands to
pub const MAX_REPEATS: u32 = 1 << 16;

/// Exposure of the aperture during a net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApertureState {
    /// Pen up, the net only moves the current point
    #[default]
    Off,
    /// Pen down, the aperture is dragged from start to stop
    On,
    /// Single stamp of the aperture at the stop point
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    #[default]
    LinearX1,
    LinearX10,
    LinearX01,
    LinearX001,
    ClockwiseCircular,
    CounterClockwiseCircular,
    /// Opens a filled region, following nets up to `RegionEnd` form its boundary
    RegionStart,
    RegionEnd,
    Deleted,
}

impl Interpolation {
    pub fn is_circular(&self) -> bool {
        matches!(
            self,
            Interpolation::ClockwiseCircular | Interpolation::CounterClockwiseCircular
        )
    }

    /// Opposite arc sense, other modes unchanged
    pub fn reversed(&self) -> Self {
        match self {
            Interpolation::ClockwiseCircular => Interpolation::CounterClockwiseCircular,
            Interpolation::CounterClockwiseCircular => Interpolation::ClockwiseCircular,
            other => *other,
        }
    }
}

/// Polarity of a level (layer-state) inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerPolarity {
    /// Adds material
    #[default]
    Dark,
    /// Removes material
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepAndRepeat {
    pub x: u32,
    pub y: u32,
    pub dist_x: f64,
    pub dist_y: f64,
}

impl StepAndRepeat {
    fn counts(&self) -> (u32, u32) {
        (self.x.max(1), self.y.max(1))
    }

    /// Number of copies, `None` when it overflows or exceeds [`MAX_REPEATS`]
    pub fn copies(&self) -> Option<u32> {
        let (nx, ny) = self.counts();
        nx.checked_mul(ny).filter(|n| *n <= MAX_REPEATS)
    }

    /// Offsets of every repeated copy, `(0, 0)` first. Grids larger than
    /// [`MAX_REPEATS`] are cut down to their first copies.
    pub fn offsets(&self) -> Vec<Point> {
        let (mut nx, mut ny) = self.counts();
        if self.copies().is_none() {
            warn!(
                "Step and repeat {}x{} exceeds {} copies, truncating",
                nx, ny, MAX_REPEATS
            );
            nx = nx.min(MAX_REPEATS);
            ny = ny.min(MAX_REPEATS / nx);
        }

        let mut offsets = Vec::with_capacity((nx * ny) as usize);
        for iy in 0..ny {
            for ix in 0..nx {
                offsets.push(Point::new(
                    ix as f64 * self.dist_x,
                    iy as f64 * self.dist_y,
                ));
            }
        }
        offsets
    }

    /// First and last copy; together they span the block's extent
    pub fn corners(&self) -> [Point; 2] {
        let (nx, ny) = self.counts();
        [
            Point::new(0.0, 0.0),
            Point::new(
                (nx - 1) as f64 * self.dist_x,
                (ny - 1) as f64 * self.dist_y,
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KnockoutType {
    #[default]
    NoKnockout,
    /// A fixed rectangle
    Fixed,
    /// The extent of the level's nets grown by `border`
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Knockout {
    pub first_instance: bool,
    pub kind: KnockoutType,
    pub polarity: LayerPolarity,
    pub lower_left: Point,
    pub width: f64,
    pub height: f64,
    pub border: f64,
}

/// One entry of the image's level chain
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerState {
    pub step_and_repeat: StepAndRepeat,
    pub knockout: Knockout,
    /// Degrees
    pub rotation: f64,
    pub polarity: LayerPolarity,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AxisSelect {
    #[default]
    NoSelect,
    SwapAB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MirrorState {
    #[default]
    NoMirror,
    FlipA,
    FlipB,
    FlipAB,
}

/// One entry of the image's netstate chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetState {
    pub axis_select: AxisSelect,
    pub mirror_state: MirrorState,
    pub unit: Unit,
    pub offset_a: f64,
    pub offset_b: f64,
    pub scale_a: f64,
    pub scale_b: f64,
}

impl Default for NetState {
    fn default() -> Self {
        Self {
            axis_select: AxisSelect::NoSelect,
            mirror_state: MirrorState::NoMirror,
            unit: Unit::Inch,
            offset_a: 0.0,
            offset_b: 0.0,
            scale_a: 1.0,
            scale_b: 1.0,
        }
    }
}

/// A single draw or flash instruction.
///
/// `aperture` is a D-code into the owning image's aperture table; `layer` and
/// `state` index the image's level and netstate chains.
#[derive(Debug, Clone, PartialEq)]
pub struct Net {
    pub start: Point,
    pub stop: Point,
    pub bounding_box: BoundingBox,
    pub aperture: i32,
    pub aperture_state: ApertureState,
    pub interpolation: Interpolation,
    pub cirseg: Option<CircleSegment>,
    pub label: Option<String>,
    pub layer: usize,
    pub state: usize,
}

impl Net {
    pub fn new(
        start: Point,
        stop: Point,
        aperture: i32,
        aperture_state: ApertureState,
        interpolation: Interpolation,
    ) -> Self {
        Self {
            start,
            stop,
            bounding_box: BoundingBox::empty(),
            aperture,
            aperture_state,
            interpolation,
            cirseg: None,
            label: None,
            layer: 0,
            state: 0,
        }
    }

    pub fn is_region_marker(&self) -> bool {
        matches!(
            self.interpolation,
            Interpolation::RegionStart | Interpolation::RegionEnd | Interpolation::Deleted
        )
    }

    /// Whether the net leaves a mark on its own (outside of any region)
    pub fn is_drawn(&self) -> bool {
        !self.is_region_marker() && self.aperture_state != ApertureState::Off
    }

    /// Extent of the geometry this net paints, grown by the aperture shape.
    /// Pen-up moves and region markers paint nothing; region boundary edges
    /// (`inside_region`) are not grown by the aperture.
    pub fn compute_bounds(&self, aperture: Option<&Aperture>, inside_region: bool) -> BoundingBox {
        if self.is_region_marker() || (!inside_region && self.aperture_state == ApertureState::Off) {
            return BoundingBox::empty();
        }

        let mut bbox = BoundingBox::empty();
        match (self.aperture_state, self.cirseg) {
            // A move inside a region only opens the next contour
            (ApertureState::Flash | ApertureState::Off, _) => bbox.include_point(self.stop),
            (_, Some(seg)) if self.interpolation.is_circular() => {
                bbox.include_box(&seg.bounds());
            }
            _ => {
                bbox.include_point(self.start);
                bbox.include_point(self.stop);
            }
        }

        if inside_region {
            return bbox;
        }
        let (hx, hy) = match (self.aperture_state, aperture) {
            (ApertureState::Flash, Some(ap)) => ap.half_extents(),
            (_, Some(ap)) => {
                let (hx, hy) = ap.half_extents();
                if self.interpolation.is_circular() {
                    let r = hx.max(hy);
                    (r, r)
                } else {
                    (hx, hy)
                }
            }
            (_, None) => (0.0, 0.0),
        };
        bbox.expanded(hx, hy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_bounds_grow_by_aperture() {
        let net = Net::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            10,
            ApertureState::On,
            Interpolation::LinearX1,
        );
        let bbox = net.compute_bounds(Some(&Aperture::circle(0.1)), false);

        assert!((bbox.left + 0.05).abs() < 1e-12);
        assert!((bbox.right - 1.05).abs() < 1e-12);
        assert!((bbox.top + 0.05).abs() < 1e-12);
        assert!((bbox.bottom - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_flash_bounds_use_stop_point() {
        let net = Net::new(
            Point::new(5.0, 5.0),
            Point::new(1.0, 1.0),
            10,
            ApertureState::Flash,
            Interpolation::LinearX1,
        );
        let bbox = net.compute_bounds(Some(&Aperture::rectangle(0.2, 0.4)), false);

        assert!((bbox.left - 0.9).abs() < 1e-12);
        assert!((bbox.top - 0.8).abs() < 1e-12);
        assert!((bbox.right - 1.1).abs() < 1e-12);
        assert!((bbox.bottom - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_moves_paint_nothing() {
        let net = Net::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            10,
            ApertureState::Off,
            Interpolation::LinearX1,
        );
        assert!(net
            .compute_bounds(Some(&Aperture::circle(0.1)), false)
            .is_empty());
    }

    #[test]
    fn test_step_and_repeat_offsets() {
        let sr = StepAndRepeat {
            x: 2,
            y: 2,
            dist_x: 1.0,
            dist_y: 0.5,
        };
        let offsets = sr.offsets();

        assert_eq!(offsets.len(), 4);
        assert_eq!(offsets[0], Point::new(0.0, 0.0));
        assert_eq!(offsets[3], Point::new(1.0, 0.5));
        assert_eq!(StepAndRepeat::default().offsets(), vec![Point::new(0.0, 0.0)]);
        assert_eq!(sr.corners(), [Point::new(0.0, 0.0), Point::new(1.0, 0.5)]);
    }

    #[test]
    fn test_huge_step_and_repeat_is_bounded() {
        let sr = StepAndRepeat {
            x: u32::MAX,
            y: u32::MAX,
            dist_x: 1.0,
            dist_y: 1.0,
        };

        assert_eq!(sr.copies(), None);
        assert!(sr.offsets().len() <= MAX_REPEATS as usize);
        let far = (u32::MAX - 1) as f64;
        assert_eq!(sr.corners()[1], Point::new(far, far));

        let wide = StepAndRepeat {
            x: 70_000,
            y: 1,
            dist_x: 0.1,
            dist_y: 0.0,
        };
        assert_eq!(wide.copies(), None);
        assert_eq!(wide.offsets().len(), MAX_REPEATS as usize);
    }
}
