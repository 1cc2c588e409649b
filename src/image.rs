//! Image model: aperture table, ordered net sequence and derived extents
//!
//! Net order is drawing order. Extents grow monotonically as nets are
//! appended and are only recomputed from scratch by [`Image::rescan_extents`].

use crate::aperture::{Aperture, ApertureTable, ApertureType, Unit, APERTURE_MAX, APERTURE_MIN};
use crate::error::{GerbvError, Result};
use crate::geometry::{BoundingBox, CircleSegment, Point, UserTransform};
use crate::net::{ApertureState, Interpolation, LayerState, Net, NetState};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Image wide polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImagePolarity {
    #[default]
    Positive,
    Negative,
}

/// Image level metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub name: Option<String>,
    pub polarity: ImagePolarity,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub offset_a: f64,
    pub offset_b: f64,
    /// Degrees
    pub image_rotation: f64,
}

impl Default for ImageInfo {
    fn default() -> Self {
        let empty = BoundingBox::empty();
        Self {
            name: None,
            polarity: ImagePolarity::Positive,
            min_x: empty.left,
            min_y: empty.top,
            max_x: empty.right,
            max_y: empty.bottom,
            offset_a: 0.0,
            offset_b: 0.0,
            image_rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub info: ImageInfo,
    apertures: ApertureTable,
    layers: Vec<LayerState>,
    states: Vec<NetState>,
    nets: Vec<Net>,
    in_region: bool,
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

impl Image {
    /// Create an empty image with one default level and netstate
    pub fn new() -> Self {
        Self {
            info: ImageInfo::default(),
            apertures: ApertureTable::new(),
            layers: vec![LayerState::default()],
            states: vec![NetState::default()],
            nets: Vec::new(),
            in_region: false,
        }
    }

    pub fn apertures(&self) -> &ApertureTable {
        &self.apertures
    }

    pub fn lookup_aperture(&self, id: i32) -> Result<&Aperture> {
        self.apertures.lookup(id)
    }

    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn layers(&self) -> &[LayerState] {
        &self.layers
    }

    pub fn states(&self) -> &[NetState] {
        &self.states
    }

    /// Current extents; empty when nothing has been drawn
    pub fn extents(&self) -> BoundingBox {
        BoundingBox::new(
            self.info.min_x,
            self.info.min_y,
            self.info.max_x,
            self.info.max_y,
        )
    }

    pub fn width(&self) -> f64 {
        self.extents().width()
    }

    pub fn height(&self) -> f64 {
        self.extents().height()
    }

    /// Start a new level; nets appended afterwards belong to it
    pub fn push_layer_state(&mut self, layer: LayerState) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// Start a new netstate; nets appended afterwards belong to it
    pub fn push_net_state(&mut self, state: NetState) -> usize {
        self.states.push(state);
        self.states.len() - 1
    }

    /// Define or replace a user visible aperture.
    ///
    /// Replacing changes the rendering of every net referencing `id`.
    pub fn define_aperture(
        &mut self,
        id: i32,
        aperture_type: ApertureType,
        parameters: &[f64],
        unit: Unit,
    ) -> Result<&Aperture> {
        self.apertures.define(id, aperture_type, parameters, unit)
    }

    /// Replace (or add) the definition behind `id`
    pub fn set_aperture(&mut self, id: i32, aperture: Aperture) -> Result<()> {
        if !(APERTURE_MIN..=APERTURE_MAX).contains(&id) {
            return Err(GerbvError::InvalidId {
                id,
                min: APERTURE_MIN,
                max: APERTURE_MAX,
            });
        }
        self.apertures.insert(id, aperture);
        Ok(())
    }

    /// Circle aperture from a millimeter diameter, reusing an equal one.
    /// Returns its id.
    pub fn create_circle_aperture_mm(&mut self, diameter_mm: f64) -> Result<i32> {
        let diameter = Aperture::circle_mm(diameter_mm).parameter(0);
        self.find_or_create_aperture(ApertureType::Circle, diameter)
    }

    /// Replace several definitions at once
    pub fn set_apertures<I>(&mut self, apertures: I) -> Result<()>
    where
        I: IntoIterator<Item = (i32, Aperture)>,
    {
        for (id, aperture) in apertures {
            self.set_aperture(id, aperture)?;
        }
        Ok(())
    }

    /// Remove an aperture that no net references
    pub fn remove_aperture(&mut self, id: i32) -> Result<Aperture> {
        let nets = self.nets.iter().filter(|n| n.aperture == id).count();
        if nets > 0 {
            return Err(GerbvError::ApertureInUse { id, nets });
        }
        self.apertures
            .remove(id)
            .ok_or(GerbvError::ApertureNotFound { id })
    }

    /// Distinct user visible apertures referenced by nets, ordered by id
    pub fn apertures_in_use(&self) -> Vec<(i32, &Aperture)> {
        let ids: BTreeSet<i32> = self
            .nets
            .iter()
            .map(|n| n.aperture)
            .filter(|id| *id >= APERTURE_MIN)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.apertures.get(id).map(|ap| (id, ap)))
            .collect()
    }

    /// Append a pen-down line drawn with a standard aperture of the given
    /// type and width, reusing an equal aperture when one exists.
    pub fn append_line(
        &mut self,
        start: Point,
        end: Point,
        width: f64,
        aperture_type: ApertureType,
    ) -> Result<&Net> {
        let aperture = self.find_or_create_aperture(aperture_type, width)?;
        let net = Net::new(
            start,
            end,
            aperture,
            ApertureState::On,
            Interpolation::LinearX1,
        );
        Ok(self.push_net(net))
    }

    /// Append a pen-down arc. Angles are degrees; a counter clockwise arc needs
    /// `angle2 > angle1`, a clockwise one `angle2 < angle1`.
    #[allow(clippy::too_many_arguments)]
    pub fn append_arc(
        &mut self,
        center: Point,
        radius: f64,
        angle1: f64,
        angle2: f64,
        width: f64,
        aperture_type: ApertureType,
        interpolation: Interpolation,
    ) -> Result<&Net> {
        let consistent = match interpolation {
            Interpolation::CounterClockwiseCircular => angle2 > angle1,
            Interpolation::ClockwiseCircular => angle2 < angle1,
            other => {
                return Err(GerbvError::geometry(format!(
                    "{:?} is not a circular interpolation",
                    other
                )))
            }
        };
        if !consistent {
            return Err(GerbvError::geometry(format!(
                "arc from {} to {} degrees does not match {:?}",
                angle1, angle2, interpolation
            )));
        }
        if !(radius > 0.0) {
            return Err(GerbvError::geometry(format!(
                "arc radius must be positive, got {}",
                radius
            )));
        }

        let aperture = self.find_or_create_aperture(aperture_type, width)?;
        let seg = CircleSegment {
            center,
            width: radius * 2.0,
            height: radius * 2.0,
            angle1,
            angle2,
        };
        let mut net = Net::new(
            seg.point_at(angle1),
            seg.point_at(angle2),
            aperture,
            ApertureState::On,
            interpolation,
        );
        net.cirseg = Some(seg);
        Ok(self.push_net(net))
    }

    /// Append a flash of an already defined aperture
    pub fn append_flash(&mut self, position: Point, aperture: i32) -> Result<&Net> {
        self.apertures.lookup(aperture)?;
        let net = Net::new(
            position,
            position,
            aperture,
            ApertureState::Flash,
            Interpolation::LinearX1,
        );
        Ok(self.push_net(net))
    }

    /// Append a filled polygonal region with the given outline
    pub fn append_region(&mut self, outline: &[Point]) -> Result<()> {
        if outline.len() < 3 {
            return Err(GerbvError::geometry(format!(
                "region needs at least 3 vertices, got {}",
                outline.len()
            )));
        }

        let first = outline[0];
        self.push_net(Net::new(
            first,
            first,
            0,
            ApertureState::On,
            Interpolation::RegionStart,
        ));
        self.push_net(Net::new(
            first,
            first,
            0,
            ApertureState::Off,
            Interpolation::LinearX1,
        ));
        let closing = outline.iter().skip(1).chain(std::iter::once(&first));
        let mut previous = first;
        for point in closing {
            self.push_net(Net::new(
                previous,
                *point,
                0,
                ApertureState::On,
                Interpolation::LinearX1,
            ));
            previous = *point;
        }
        self.push_net(Net::new(
            first,
            first,
            0,
            ApertureState::Off,
            Interpolation::RegionEnd,
        ));
        Ok(())
    }

    /// Append a net on the current (last) level and netstate
    pub fn push_net(&mut self, mut net: Net) -> &Net {
        net.layer = self.layers.len() - 1;
        net.state = self.states.len() - 1;
        self.push_indexed(net)
    }

    /// Append a net keeping its level and netstate indices, which must be
    /// valid for this image
    fn push_indexed(&mut self, mut net: Net) -> &Net {
        match net.interpolation {
            Interpolation::RegionStart => self.in_region = true,
            Interpolation::RegionEnd => self.in_region = false,
            _ => {}
        }
        net.bounding_box = net.compute_bounds(self.apertures.get(net.aperture), self.in_region);
        self.grow_extents(&net);

        self.nets.push(net);
        &self.nets[self.nets.len() - 1]
    }

    fn grow_extents(&mut self, net: &Net) {
        if net.bounding_box.is_empty() {
            return;
        }
        let corners = self.layers[net.layer].step_and_repeat.corners();
        for offset in corners {
            let b = &net.bounding_box;
            self.info.min_x = self.info.min_x.min(b.left + offset.x);
            self.info.max_x = self.info.max_x.max(b.right + offset.x);
            self.info.min_y = self.info.min_y.min(b.top + offset.y);
            self.info.max_y = self.info.max_y.max(b.bottom + offset.y);
        }
    }

    /// Recompute every net's bounding box and the image extents from scratch
    pub fn rescan_extents(&mut self) {
        let empty = BoundingBox::empty();
        self.info.min_x = empty.left;
        self.info.max_x = empty.right;
        self.info.min_y = empty.top;
        self.info.max_y = empty.bottom;

        let mut in_region = false;
        let mut nets = std::mem::take(&mut self.nets);
        for net in nets.iter_mut() {
            match net.interpolation {
                Interpolation::RegionStart => in_region = true,
                Interpolation::RegionEnd => in_region = false,
                _ => {}
            }
            net.bounding_box = net.compute_bounds(self.apertures.get(net.aperture), in_region);
            self.grow_extents(net);
        }
        self.nets = nets;
        self.in_region = in_region;
        debug!("Rescanned extents of {} nets", self.nets.len());
    }

    fn find_or_create_aperture(&mut self, aperture_type: ApertureType, width: f64) -> Result<i32> {
        let parameters = match aperture_type {
            ApertureType::Circle => vec![width],
            ApertureType::Rectangle | ApertureType::Oval => vec![width, width],
            ApertureType::Polygon => vec![width, 4.0],
            other => {
                return Err(GerbvError::geometry(format!(
                    "{:?} cannot be created implicitly",
                    other
                )))
            }
        };
        let aperture = Aperture::new(aperture_type, &parameters, Unit::Inch)?;
        if let Some(id) = self.apertures.find(&aperture) {
            return Ok(id);
        }

        let id = self.apertures.next_free_id().ok_or(GerbvError::InvalidId {
            id: APERTURE_MAX + 1,
            min: APERTURE_MIN,
            max: APERTURE_MAX,
        })?;
        debug!("Created aperture D{} ({:?}, {})", id, aperture_type, width);
        self.apertures.insert(id, aperture);
        Ok(id)
    }

    /// Append a transformed copy of every net of `self` to `target`.
    ///
    /// Apertures are merged by value into the target's table and nets are
    /// remapped to the resulting ids. Levels and netstates are appended.
    pub fn copy_into(&self, target: &mut Image, transform: &UserTransform) -> Result<()> {
        let odd_quarter_turn = transform.quarter_turns().map(|t| t.rem_euclid(2) == 1);

        // Resolve every id before touching the target so a full table leaves
        // it unchanged
        let mut remap: HashMap<i32, i32> = HashMap::new();
        let mut planned: Vec<(i32, Aperture)> = Vec::new();
        let mut next_candidate = APERTURE_MIN;

        for (id, aperture) in self.apertures.iter() {
            let mut copied = aperture.clone();
            if odd_quarter_turn == Some(true) {
                copied = copied.quarter_turned();
            }
            if id < APERTURE_MIN {
                // Internal ids keep their number
                planned.push((id, copied));
                remap.insert(id, id);
                continue;
            }

            let existing = target.apertures.find(&copied).or_else(|| {
                planned
                    .iter()
                    .find(|(planned_id, ap)| *planned_id >= APERTURE_MIN && *ap == copied)
                    .map(|(planned_id, _)| *planned_id)
            });
            let new_id = match existing {
                Some(existing) => existing,
                None => {
                    let free = (next_candidate..=APERTURE_MAX)
                        .find(|candidate| target.apertures.get(*candidate).is_none())
                        .ok_or(GerbvError::InvalidId {
                            id: APERTURE_MAX + 1,
                            min: APERTURE_MIN,
                            max: APERTURE_MAX,
                        })?;
                    next_candidate = free + 1;
                    planned.push((free, copied));
                    free
                }
            };
            remap.insert(id, new_id);
        }

        for (id, aperture) in planned {
            target.apertures.insert(id, aperture);
        }

        let layer_offset = target.layers.len();
        target.layers.extend(self.layers.iter().cloned());
        let state_offset = target.states.len();
        target.states.extend(self.states.iter().copied());

        let flips = transform.flips_orientation();
        for net in &self.nets {
            let mut copied = net.clone();
            copied.start = transform.apply(net.start);
            copied.stop = transform.apply(net.stop);
            copied.cirseg = net.cirseg.map(|seg| transform.apply_segment(&seg));
            if flips {
                copied.interpolation = net.interpolation.reversed();
            }
            copied.aperture = remap.get(&net.aperture).copied().unwrap_or(net.aperture);
            copied.layer = net.layer + layer_offset;
            copied.state = net.state + state_offset;
            target.push_indexed(copied);
        }

        debug!(
            "Copied {} nets into image ({} nets total)",
            self.nets.len(),
            target.nets.len()
        );
        Ok(())
    }

    /// A new image holding a transformed copy of this one
    pub fn duplicate(&self, transform: &UserTransform) -> Result<Image> {
        let mut image = Image::new();
        image.info.name = self.info.name.clone();
        image.info.polarity = self.info.polarity;
        self.copy_into(&mut image, transform)?;
        Ok(image)
    }

    /// Compose a new image holding one copy of this image per position,
    /// each translated by `position + translate` and rotated by `rotation`
    /// radians. `self` is left untouched.
    pub fn panelize(&self, positions: &[Point], rotation: f64, translate: Point) -> Result<Image> {
        let mut panel = Image::new();
        panel.info.name = self.info.name.clone();
        panel.info.polarity = self.info.polarity;

        for position in positions {
            let transform = UserTransform::placement(
                position.x + translate.x,
                position.y + translate.y,
                rotation,
            );
            self.copy_into(&mut panel, &transform)?;
        }
        panel.rescan_extents();

        info!(
            "Panelized {} nets into {} copies ({} nets)",
            self.nets.len(),
            positions.len(),
            panel.nets.len()
        );
        Ok(panel)
    }

    /// Write the image as RS-274X, transformed by `transform` when given
    pub fn export_rs274x(&self, path: &Path, transform: Option<&UserTransform>) -> Result<()> {
        crate::export::write_rs274x(self, path, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::LayerPolarity;
    use std::f64::consts::PI;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn square_image() -> Image {
        let mut image = Image::default();
        let pts = [(0.0, 0.0), (0.5, 0.0), (0.5, 0.5), (0.0, 0.5), (0.0, 0.0)];
        for w in pts.windows(2) {
            image
                .append_line(w[0].into(), w[1].into(), 0.0, ApertureType::Circle)
                .unwrap();
        }
        image
    }

    #[test]
    fn test_circle_aperture_from_mm() {
        let mut image = Image::default();
        let id = image.create_circle_aperture_mm(25.4).unwrap();
        let again = image.create_circle_aperture_mm(25.4).unwrap();

        assert_eq!(id, again);
        assert!(id >= APERTURE_MIN);
        assert!(close(image.lookup_aperture(id).unwrap().parameter(0), 1.0));
    }

    #[test]
    fn test_new_image_is_empty() {
        let image = Image::default();
        assert!(image.extents().is_empty());
        assert_eq!(image.net_count(), 0);
        assert_eq!(image.layers().len(), 1);
        assert_eq!(image.states().len(), 1);
    }

    #[test]
    fn test_append_line_reuses_apertures() {
        let mut image = Image::default();
        image
            .append_line(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.01, ApertureType::Circle)
            .unwrap();
        image
            .append_line(Point::new(0.0, 1.0), Point::new(1.0, 1.0), 0.01, ApertureType::Circle)
            .unwrap();
        image
            .append_line(Point::new(0.0, 2.0), Point::new(1.0, 2.0), 0.02, ApertureType::Circle)
            .unwrap();

        let in_use = image.apertures_in_use();
        assert_eq!(in_use.len(), 2);
        assert_eq!(in_use[0].0, 10);
        assert_eq!(in_use[1].0, 11);
        assert_eq!(image.nets()[0].aperture, image.nets()[1].aperture);
    }

    #[test]
    fn test_extents_are_monotonic() {
        let mut image = Image::default();
        image
            .append_line(Point::new(0.0, 0.0), Point::new(2.0, 1.0), 0.0, ApertureType::Circle)
            .unwrap();
        image
            .append_line(Point::new(0.5, 0.5), Point::new(1.0, 0.5), 0.0, ApertureType::Circle)
            .unwrap();

        assert_eq!(image.extents(), BoundingBox::new(0.0, 0.0, 2.0, 1.0));

        image
            .append_line(Point::new(-1.0, 0.0), Point::new(0.0, 3.0), 0.0, ApertureType::Circle)
            .unwrap();
        assert_eq!(image.extents(), BoundingBox::new(-1.0, 0.0, 2.0, 3.0));
    }

    #[test]
    fn test_arc_direction_must_match_interpolation() {
        let mut image = Image::default();
        let center = Point::new(0.0, 0.0);

        assert!(image
            .append_arc(center, 1.0, 0.0, 90.0, 0.01, ApertureType::Circle, Interpolation::CounterClockwiseCircular)
            .is_ok());
        assert!(image
            .append_arc(center, 1.0, 90.0, 0.0, 0.01, ApertureType::Circle, Interpolation::ClockwiseCircular)
            .is_ok());

        let wrong = image.append_arc(
            center,
            1.0,
            0.0,
            90.0,
            0.01,
            ApertureType::Circle,
            Interpolation::ClockwiseCircular,
        );
        assert!(matches!(wrong, Err(GerbvError::InvalidGeometry { .. })));

        let same = image.append_arc(
            center,
            1.0,
            45.0,
            45.0,
            0.01,
            ApertureType::Circle,
            Interpolation::CounterClockwiseCircular,
        );
        assert!(matches!(same, Err(GerbvError::InvalidGeometry { .. })));

        let linear = image.append_arc(
            center,
            1.0,
            0.0,
            90.0,
            0.01,
            ApertureType::Circle,
            Interpolation::LinearX1,
        );
        assert!(matches!(linear, Err(GerbvError::InvalidGeometry { .. })));
        assert_eq!(image.net_count(), 2);
    }

    #[test]
    fn test_arc_extents() {
        let mut image = Image::default();
        image
            .append_arc(
                Point::new(0.0, 0.0),
                1.0,
                0.0,
                180.0,
                0.0,
                ApertureType::Circle,
                Interpolation::CounterClockwiseCircular,
            )
            .unwrap();

        let ext = image.extents();
        assert!(close(ext.left, -1.0));
        assert!(close(ext.right, 1.0));
        assert!(close(ext.bottom, 1.0));
        assert!(close(ext.top, 0.0));
    }

    #[test]
    fn test_flash_requires_defined_aperture() {
        let mut image = Image::default();
        assert!(matches!(
            image.append_flash(Point::new(0.0, 0.0), 12),
            Err(GerbvError::ApertureNotFound { id: 12 })
        ));

        image
            .define_aperture(12, ApertureType::Rectangle, &[0.2, 0.1], Unit::Inch)
            .unwrap();
        image.append_flash(Point::new(1.0, 1.0), 12).unwrap();
        let ext = image.extents();
        assert!(close(ext.left, 0.9));
        assert!(close(ext.top, 0.95));
        assert!(close(ext.right, 1.1));
        assert!(close(ext.bottom, 1.05));
    }

    #[test]
    fn test_referenced_aperture_cannot_be_removed() {
        let mut image = Image::default();
        image
            .append_line(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.01, ApertureType::Circle)
            .unwrap();

        assert!(matches!(
            image.remove_aperture(10),
            Err(GerbvError::ApertureInUse { id: 10, nets: 1 })
        ));

        image
            .define_aperture(20, ApertureType::Circle, &[0.5], Unit::Inch)
            .unwrap();
        assert!(image.remove_aperture(20).is_ok());
    }

    #[test]
    fn test_replacing_aperture_changes_referencing_nets() {
        let mut image = Image::default();
        image
            .append_line(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.0, ApertureType::Circle)
            .unwrap();
        let id = image.nets()[0].aperture;

        image.set_aperture(id, Aperture::circle(0.2)).unwrap();
        image.rescan_extents();

        assert_eq!(image.lookup_aperture(id).unwrap().parameter(0), 0.2);
        assert!(close(image.extents().left, -0.1));
        assert!(close(image.extents().right, 1.1));
    }

    #[test]
    fn test_region_extents_ignore_aperture() {
        let mut image = Image::default();
        image
            .append_region(&[
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
            ])
            .unwrap();

        assert_eq!(image.extents(), BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert!(image.append_region(&[Point::new(0.0, 0.0)]).is_err());
    }

    #[test]
    fn test_step_and_repeat_grows_extents() {
        let mut image = Image::default();
        let mut level = LayerState::default();
        level.step_and_repeat.x = 3;
        level.step_and_repeat.dist_x = 1.0;
        image.push_layer_state(level);
        image
            .append_line(Point::new(0.0, 0.0), Point::new(0.5, 0.0), 0.0, ApertureType::Circle)
            .unwrap();

        assert!(close(image.extents().right, 2.5));
    }

    #[test]
    fn test_panelize_side_by_side() {
        let base = square_image();
        let panel = base
            .panelize(
                &[Point::new(0.0, 0.0), Point::new(1.0, 0.0)],
                0.0,
                Point::new(0.0, 0.0),
            )
            .unwrap();

        assert_eq!(panel.net_count(), base.net_count() * 2);
        assert!(close(panel.width(), base.width() + 1.0));
        assert!(close(panel.height(), base.height()));
        // base untouched
        assert_eq!(base.net_count(), 4);
        assert_eq!(base.extents(), BoundingBox::new(0.0, 0.0, 0.5, 0.5));
    }

    #[test]
    fn test_panelize_preserves_aperture_parameters() {
        let mut base = Image::default();
        base.define_aperture(15, ApertureType::Rectangle, &[0.123456789, 0.0625], Unit::Inch)
            .unwrap();
        base.append_flash(Point::new(0.0, 0.0), 15).unwrap();

        let panel = base
            .panelize(&[Point::new(0.0, 0.0), Point::new(2.0, 0.0)], 0.0, Point::new(1.0, 1.0))
            .unwrap();

        let in_use = panel.apertures_in_use();
        assert_eq!(in_use.len(), 1);
        assert_eq!(in_use[0].1.parameters(), &[0.123456789, 0.0625]);
        assert_eq!(panel.nets()[0].stop, Point::new(1.0, 1.0));
        assert_eq!(panel.nets()[1].stop, Point::new(3.0, 1.0));
    }

    #[test]
    fn test_quarter_turn_copy_swaps_rectangles() {
        let mut base = Image::default();
        base.define_aperture(10, ApertureType::Rectangle, &[0.4, 0.1], Unit::Inch)
            .unwrap();
        base.append_flash(Point::new(1.0, 0.0), 10).unwrap();

        let rotated = base
            .duplicate(&UserTransform::placement(0.0, 0.0, PI / 2.0))
            .unwrap();

        let net = &rotated.nets()[0];
        assert!(close(net.stop.x, 0.0));
        assert!(close(net.stop.y, 1.0));
        assert_eq!(
            rotated.lookup_aperture(net.aperture).unwrap().parameters(),
            &[0.1, 0.4]
        );
    }

    #[test]
    fn test_copy_keeps_level_polarity() {
        let mut base = Image::default();
        base.push_layer_state(LayerState {
            polarity: LayerPolarity::Clear,
            ..LayerState::default()
        });
        base.append_line(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.01, ApertureType::Circle)
            .unwrap();

        let copy = base.duplicate(&UserTransform::identity()).unwrap();
        let net = &copy.nets()[0];
        assert_eq!(copy.layers()[net.layer].polarity, LayerPolarity::Clear);
    }

    #[test]
    fn test_full_table_copy_leaves_target_unchanged() {
        let mut target = Image::default();
        for id in APERTURE_MIN..APERTURE_MAX {
            target
                .define_aperture(id, ApertureType::Circle, &[1.0 + id as f64 * 1e-3], Unit::Inch)
                .unwrap();
        }
        target
            .append_flash(Point::new(0.0, 0.0), APERTURE_MIN)
            .unwrap();

        // Two new shapes but only one free id left
        let mut source = Image::default();
        source
            .append_line(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.5, ApertureType::Circle)
            .unwrap();
        source
            .append_line(Point::new(0.0, 1.0), Point::new(1.0, 1.0), 0.6, ApertureType::Circle)
            .unwrap();

        let apertures = target.apertures().len();
        let layers = target.layers().len();
        let result = source.copy_into(&mut target, &UserTransform::identity());

        assert!(matches!(result, Err(GerbvError::InvalidId { .. })));
        assert_eq!(target.apertures().len(), apertures);
        assert!(target.lookup_aperture(APERTURE_MAX).is_err());
        assert_eq!(target.layers().len(), layers);
        assert_eq!(target.net_count(), 1);
    }

    #[test]
    fn test_copy_merges_equal_source_apertures() {
        let mut source = Image::default();
        source
            .define_aperture(20, ApertureType::Circle, &[0.3], Unit::Inch)
            .unwrap();
        source
            .define_aperture(21, ApertureType::Circle, &[0.3], Unit::Inch)
            .unwrap();
        source.append_flash(Point::new(0.0, 0.0), 20).unwrap();
        source.append_flash(Point::new(1.0, 0.0), 21).unwrap();

        let mut target = Image::default();
        target
            .append_line(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.01, ApertureType::Circle)
            .unwrap();
        source.copy_into(&mut target, &UserTransform::identity()).unwrap();

        assert_eq!(target.apertures().len(), 2);
        assert_eq!(target.nets()[1].aperture, 11);
        assert_eq!(target.nets()[2].aperture, 11);
    }

    #[test]
    fn test_huge_step_and_repeat_extents() {
        let mut image = Image::default();
        let mut level = LayerState::default();
        level.step_and_repeat.x = u32::MAX;
        level.step_and_repeat.y = u32::MAX;
        level.step_and_repeat.dist_x = 1e-6;
        image.push_layer_state(level);
        image
            .append_line(Point::new(0.0, 0.0), Point::new(0.5, 0.0), 0.0, ApertureType::Circle)
            .unwrap();

        let far = (u32::MAX - 1) as f64 * 1e-6;
        assert!(close(image.extents().right, far + 0.5));
        assert!(close(image.extents().left, 0.0));
    }
}
