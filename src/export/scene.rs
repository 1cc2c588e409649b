//! Flattening of a project into device space shapes
//!
//! Every exporter except RS-274X draws from the same [`Scene`]: visible
//! layers in project order, each a list of filled outlines and stroked paths
//! in paint order with their polarity.

use crate::aperture::{Aperture, ApertureType};
use crate::color::Color;
use crate::geometry::{BoundingBox, Point};
use crate::image::{Image, ImagePolarity};
use crate::layer::Layer;
use crate::net::{ApertureState, Interpolation, KnockoutType, LayerPolarity, LayerState, Net};
use crate::project::Project;
use crate::render::RenderInfo;
use std::f64::consts::PI;
use tracing::debug;

/// Maximum sweep of one segment when flattening arcs, in degrees
const ARC_STEP: f64 = 3.0;
/// Segments used for a full circle
const CIRCLE_SEGMENTS: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Geometry {
    /// Closed outline filled with the non-zero rule
    Fill(Vec<Point>),
    /// Open path stroked with round caps and joins
    Stroke { path: Vec<Point>, width: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Shape {
    pub geometry: Geometry,
    /// Erases instead of adding
    pub clear: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SceneLayer {
    pub name: String,
    pub color: Color,
    pub alpha: f64,
    /// Draw the complement of the shapes within the canvas
    pub inverted: bool,
    pub shapes: Vec<Shape>,
}

#[derive(Debug, Clone)]
pub(crate) struct Scene {
    pub width: u32,
    pub height: u32,
    /// Device units per inch
    pub scale: f64,
    pub background: Color,
    pub layers: Vec<SceneLayer>,
}

impl Scene {
    pub fn build(project: &Project, info: &RenderInfo) -> Self {
        let layers: Vec<SceneLayer> = project
            .layers()
            .iter()
            .filter(|layer| layer.is_visible())
            .map(|layer| SceneLayer::build(layer, info))
            .collect();

        debug!(
            "Scene of {} visible layers, {} shapes",
            layers.len(),
            layers.iter().map(|l| l.shapes.len()).sum::<usize>()
        );

        Self {
            width: info.pixel_width,
            height: info.pixel_height,
            scale: info.scale_x,
            background: project.background(),
            layers,
        }
    }
}

/// Image space shape tagged with the level it belongs to
struct Pending {
    geometry: Geometry,
    clear: bool,
    level: usize,
}

impl SceneLayer {
    fn build(layer: &Layer, info: &RenderInfo) -> Self {
        let image = layer.image();
        let transform = *layer.transform();
        let pending = collect_shapes(image);

        let stroke_scale = info.scale_x * (transform.scale_x * transform.scale_y).abs().sqrt();
        let map = |p: Point| info.to_device(transform.apply(p));

        let mut shapes = Vec::with_capacity(pending.len());
        for shape in pending {
            let offsets = image
                .layers()
                .get(shape.level)
                .map(|level| level.step_and_repeat.offsets())
                .unwrap_or_else(|| vec![Point::default()]);

            for offset in offsets {
                let shifted = |p: &Point| map(Point::new(p.x + offset.x, p.y + offset.y));
                let geometry = match &shape.geometry {
                    Geometry::Fill(outline) => Geometry::Fill(outline.iter().map(shifted).collect()),
                    Geometry::Stroke { path, width } => Geometry::Stroke {
                        path: path.iter().map(shifted).collect(),
                        width: width * stroke_scale,
                    },
                };
                shapes.push(Shape {
                    geometry,
                    clear: shape.clear,
                });
            }
        }

        let negative = image.info.polarity == ImagePolarity::Negative;
        Self {
            name: layer.name.clone(),
            color: layer.color(),
            alpha: layer.alpha(),
            inverted: layer.inverted() != negative,
            shapes,
        }
    }
}

/// Walk the nets of `image` in order and turn them into image space shapes
fn collect_shapes(image: &Image) -> Vec<Pending> {
    let mut out = Vec::new();
    let mut contours: Vec<Vec<Point>> = Vec::new();
    let mut in_region = false;
    let mut current_level = None;

    for net in image.nets() {
        let level = image.layers().get(net.layer);
        let clear = level.map(|l| l.polarity == LayerPolarity::Clear).unwrap_or(false);

        if current_level != Some(net.layer) {
            current_level = Some(net.layer);
            if let Some((outline, clear)) = level.and_then(|l| knockout_outline(image, net.layer, l)) {
                out.push(Pending {
                    geometry: Geometry::Fill(outline),
                    clear,
                    level: net.layer,
                });
            }
        }

        match net.interpolation {
            Interpolation::RegionStart => {
                in_region = true;
                contours.clear();
                continue;
            }
            Interpolation::RegionEnd => {
                in_region = false;
                for contour in contours.drain(..).filter(|c| c.len() >= 3) {
                    out.push(Pending {
                        geometry: Geometry::Fill(contour),
                        clear,
                        level: net.layer,
                    });
                }
                continue;
            }
            Interpolation::Deleted => continue,
            _ => {}
        }

        if in_region {
            extend_contour(&mut contours, net);
            continue;
        }

        let aperture = image.apertures().get(net.aperture);
        let geometry = match net.aperture_state {
            ApertureState::Off => None,
            ApertureState::Flash => aperture.and_then(|ap| flash_outline(ap, net.stop)).map(Geometry::Fill),
            ApertureState::On => Some(draw_geometry(net, aperture)),
        };
        if let Some(geometry) = geometry {
            out.push(Pending {
                geometry,
                clear,
                level: net.layer,
            });
        }
    }

    // An unterminated region still paints what it collected
    let level = current_level.unwrap_or(0);
    let clear = image
        .layers()
        .get(level)
        .map(|l| l.polarity == LayerPolarity::Clear)
        .unwrap_or(false);
    for contour in contours.into_iter().filter(|c| c.len() >= 3) {
        out.push(Pending {
            geometry: Geometry::Fill(contour),
            clear,
            level,
        });
    }
    out
}

fn extend_contour(contours: &mut Vec<Vec<Point>>, net: &Net) {
    match net.aperture_state {
        ApertureState::Off => contours.push(vec![net.stop]),
        ApertureState::On => {
            if contours.is_empty() {
                contours.push(Vec::new());
            }
            let Some(contour) = contours.last_mut() else {
                return;
            };
            if contour.is_empty() {
                contour.push(net.start);
            }
            match net.cirseg {
                Some(seg) if net.interpolation.is_circular() => {
                    contour.extend(seg.flatten(ARC_STEP).into_iter().skip(1));
                }
                _ => contour.push(net.stop),
            }
        }
        ApertureState::Flash => {}
    }
}

fn draw_geometry(net: &Net, aperture: Option<&Aperture>) -> Geometry {
    let path = match net.cirseg {
        Some(seg) if net.interpolation.is_circular() => seg.flatten(ARC_STEP),
        _ => vec![net.start, net.stop],
    };

    // A rectangle dragged along a straight line sweeps the hull of its two end positions
    if let Some(ap) = aperture {
        if ap.aperture_type == ApertureType::Rectangle && path.len() == 2 {
            let (hx, hy) = ap.half_extents();
            let corners = [(-hx, -hy), (hx, -hy), (hx, hy), (-hx, hy)];
            let points: Vec<Point> = path
                .iter()
                .flat_map(|p| corners.iter().map(move |(dx, dy)| Point::new(p.x + dx, p.y + dy)))
                .collect();
            return Geometry::Fill(convex_hull(points));
        }
    }

    Geometry::Stroke {
        path,
        width: aperture.map(Aperture::stroke_width).unwrap_or(0.0),
    }
}

/// Outline of `aperture` flashed at `at`, `None` for shapes that are not evaluated
pub(crate) fn flash_outline(aperture: &Aperture, at: Point) -> Option<Vec<Point>> {
    let shifted = |points: Vec<Point>| -> Vec<Point> {
        points
            .into_iter()
            .map(|p| Point::new(p.x + at.x, p.y + at.y))
            .collect()
    };

    match aperture.aperture_type {
        ApertureType::Circle => {
            let r = aperture.parameter(0) / 2.0;
            (r > 0.0).then(|| circle_outline(at, r, CIRCLE_SEGMENTS))
        }
        ApertureType::Rectangle => {
            let (hx, hy) = aperture.half_extents();
            Some(shifted(vec![
                Point::new(-hx, -hy),
                Point::new(hx, -hy),
                Point::new(hx, hy),
                Point::new(-hx, hy),
            ]))
        }
        ApertureType::Oval => {
            let (hx, hy) = aperture.half_extents();
            Some(shifted(oval_outline(hx, hy)))
        }
        ApertureType::Polygon => {
            let r = aperture.parameter(0) / 2.0;
            let vertices = (aperture.parameter(1) as usize).max(3);
            let rotation = aperture.parameter(2).to_radians();
            let points = (0..vertices)
                .map(|i| {
                    let angle = rotation + 2.0 * PI * i as f64 / vertices as f64;
                    Point::new(r * angle.cos(), r * angle.sin())
                })
                .collect();
            Some(shifted(points))
        }
        _ => {
            debug!("Aperture {:?} is not rendered", aperture.aperture_type);
            None
        }
    }
}

pub(crate) fn circle_outline(center: Point, radius: f64, segments: usize) -> Vec<Point> {
    (0..segments)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / segments as f64;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

/// Stadium centred on the origin
fn oval_outline(hx: f64, hy: f64) -> Vec<Point> {
    let half = CIRCLE_SEGMENTS / 2;
    let mut points = Vec::with_capacity(CIRCLE_SEGMENTS + 2);
    // Semicircle ends on the long axis
    let (r, ends, start) = if hx >= hy {
        (hy, [Point::new(hx - hy, 0.0), Point::new(-(hx - hy), 0.0)], -PI / 2.0)
    } else {
        (hx, [Point::new(0.0, hy - hx), Point::new(0.0, -(hy - hx))], 0.0)
    };
    for (k, center) in ends.iter().enumerate() {
        let base = start + PI * k as f64;
        for i in 0..=half {
            let angle = base + PI * i as f64 / half as f64;
            points.push(Point::new(center.x + r * angle.cos(), center.y + r * angle.sin()));
        }
    }
    points
}

/// Rectangle cleared or exposed ahead of a level's nets
fn knockout_outline(
    image: &Image,
    level: usize,
    state: &LayerState,
) -> Option<(Vec<Point>, bool)> {
    let knockout = &state.knockout;
    let bbox = match knockout.kind {
        KnockoutType::NoKnockout => return None,
        KnockoutType::Fixed => BoundingBox::new(
            knockout.lower_left.x,
            knockout.lower_left.y,
            knockout.lower_left.x + knockout.width,
            knockout.lower_left.y + knockout.height,
        ),
        KnockoutType::Border => {
            let mut bbox = BoundingBox::empty();
            for net in image.nets().iter().filter(|n| n.layer == level) {
                bbox.include_box(&net.bounding_box);
            }
            if bbox.is_empty() {
                return None;
            }
            bbox.expanded(knockout.border, knockout.border)
        }
    };
    Some((
        bbox.corners().to_vec(),
        knockout.polarity == LayerPolarity::Clear,
    ))
}

/// Monotone chain hull, counter clockwise
fn convex_hull(mut points: Vec<Point>) -> Vec<Point> {
    points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let cross = |o: Point, a: Point, b: Point| (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x);
    let mut hull: Vec<Point> = Vec::with_capacity(points.len() * 2);
    for pass in 0..2 {
        let start = hull.len();
        let iter: Box<dyn Iterator<Item = &Point>> = if pass == 0 {
            Box::new(points.iter())
        } else {
            Box::new(points.iter().rev())
        };
        for &p in iter {
            while hull.len() >= start + 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    hull
}
