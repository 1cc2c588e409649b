//! Loading source files into images
//!
//! Parsing is delegated: [`GerberLoader`] walks the command stream produced by
//! `gerber_parser` and builds the image model from it. Other parsers can be
//! plugged into a project through the [`Loader`] trait.

use crate::aperture::{Aperture, ApertureType, Unit};
use crate::error::{GerbvError, Result};
use crate::geometry::{CircleSegment, Point};
use crate::image::{Image, ImagePolarity};
use crate::net::{ApertureState, Interpolation, LayerPolarity, LayerState, Net, StepAndRepeat};
use gerber_parser::gerber_types as gt;
use gerber_parser::parse;
use std::fs;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tracing::{debug, info, warn};

const MM_PER_INCH: f64 = 25.4;

/// Slack in degrees when checking that a G74 arc stays within one quadrant
const QUADRANT_TOLERANCE: f64 = 1e-6;

/// Produces an image from a source file
pub trait Loader {
    /// Parse `path`; any failure is reported as [`GerbvError::Format`]
    fn load(&self, path: &Path) -> Result<Image>;
}

/// RS-274X loader backed by `gerber_parser`
#[derive(Debug, Clone)]
pub struct GerberLoader {
    /// Accept documents the parser only partially understood
    accept_partial: bool,
    /// Maximum file size accepted (bytes)
    max_file_size: u64,
}

impl Default for GerberLoader {
    fn default() -> Self {
        Self {
            accept_partial: true,
            max_file_size: 200_000_000, // 200MB
        }
    }
}

impl GerberLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether partially parsed documents are accepted
    pub fn with_accept_partial(mut self, accept: bool) -> Self {
        self.accept_partial = accept;
        self
    }

    /// Configure the maximum file size
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Build an image from Gerber source text
    pub fn parse_str(&self, content: &str, name: &str) -> Result<Image> {
        if content.trim_start().starts_with("M48") {
            return Err(GerbvError::format(format!(
                "{} looks like an Excellon drill file",
                name
            )));
        }

        let reader = BufReader::new(Cursor::new(content));
        let doc = match parse(reader) {
            Ok(doc) => doc,
            Err((partial, err)) => {
                if !self.accept_partial || partial.commands().is_empty() {
                    return Err(GerbvError::format(format!("{}: {}", name, err)));
                }
                warn!("{} parsed partially: {}", name, err);
                partial
            }
        };

        if doc.commands().is_empty() {
            return Err(GerbvError::format(format!("{} contains no Gerber commands", name)));
        }

        let mut builder = ImageBuilder::new(doc.units.unwrap_or(gt::Unit::Inches));
        builder.image.info.name = Some(name.to_string());

        for (code, aperture) in doc.apertures.iter() {
            builder.define_aperture(*code, aperture)?;
        }
        for command in doc.commands() {
            builder.apply(command);
        }

        let image = builder.finish();
        debug!(
            "Built image {} with {} nets and {} apertures",
            name,
            image.net_count(),
            image.apertures().len()
        );
        Ok(image)
    }
}

impl Loader for GerberLoader {
    fn load(&self, path: &Path) -> Result<Image> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();

        let size = fs::metadata(path)
            .map_err(|e| GerbvError::format(format!("{}: {}", path.display(), e)))?
            .len();
        if size > self.max_file_size {
            return Err(GerbvError::format(format!(
                "{} is too large ({} bytes)",
                path.display(),
                size
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| GerbvError::format(format!("{}: {}", path.display(), e)))?;

        info!("Loading Gerber file {}", path.display());
        self.parse_str(&content, &name)
    }
}

/// Tracks the plotter state while walking the command stream
struct ImageBuilder {
    image: Image,
    units: gt::Unit,
    position: Point,
    aperture: i32,
    interpolation: gt::InterpolationMode,
    /// G74 until a G75 is seen
    quadrant: gt::QuadrantMode,
}

impl ImageBuilder {
    fn new(units: gt::Unit) -> Self {
        Self {
            image: Image::new(),
            units,
            position: Point::default(),
            aperture: 0,
            interpolation: gt::InterpolationMode::Linear,
            quadrant: gt::QuadrantMode::Single,
        }
    }

    fn to_inch(&self, value: f64) -> f64 {
        match self.units {
            gt::Unit::Inches => value,
            gt::Unit::Millimeters => value / MM_PER_INCH,
        }
    }

    fn unit(&self) -> Unit {
        match self.units {
            gt::Unit::Inches => Unit::Inch,
            gt::Unit::Millimeters => Unit::Millimeter,
        }
    }

    fn define_aperture(&mut self, code: i32, aperture: &gt::Aperture) -> Result<()> {
        let (aperture_type, parameters) = match aperture {
            gt::Aperture::Circle(c) => {
                let mut params = vec![self.to_inch(c.diameter)];
                if let Some(hole) = c.hole_diameter {
                    params.push(self.to_inch(hole));
                }
                (ApertureType::Circle, params)
            }
            gt::Aperture::Rectangle(r) | gt::Aperture::Obround(r) => {
                let mut params = vec![self.to_inch(r.x), self.to_inch(r.y)];
                if let Some(hole) = r.hole_diameter {
                    params.push(self.to_inch(hole));
                }
                let kind = if matches!(aperture, gt::Aperture::Obround(_)) {
                    ApertureType::Oval
                } else {
                    ApertureType::Rectangle
                };
                (kind, params)
            }
            gt::Aperture::Polygon(p) => {
                let mut params = vec![
                    self.to_inch(p.diameter),
                    p.vertices as f64,
                    p.rotation.unwrap_or(0.0),
                ];
                if let Some(hole) = p.hole_diameter {
                    params.push(self.to_inch(hole));
                }
                (ApertureType::Polygon, params)
            }
            gt::Aperture::Macro(name, args) => {
                let params: Vec<f64> = args
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|arg| match arg {
                        gt::MacroDecimal::Value(v) => Some(*v),
                        _ => None,
                    })
                    .collect();
                let aperture = Aperture::new(ApertureType::Macro, &params, self.unit())
                    .map_err(|e| GerbvError::format(format!("D{}: {}", code, e)))?
                    .with_macro_name(name.clone());
                return self.store(code, aperture);
            }
            #[allow(unreachable_patterns)]
            _ => {
                warn!("Skipping unsupported aperture D{}", code);
                return Ok(());
            }
        };

        let aperture = Aperture::new(aperture_type, &parameters, self.unit())
            .map_err(|e| GerbvError::format(format!("D{}: {}", code, e)))?;
        self.store(code, aperture)
    }

    fn store(&mut self, code: i32, aperture: Aperture) -> Result<()> {
        self.image
            .set_aperture(code, aperture)
            .map_err(|e| GerbvError::format(format!("aperture definition rejected: {}", e)))
    }

    fn target(&self, coords: &Option<gt::Coordinates>) -> Point {
        let mut next = self.position;
        if let Some(coords) = coords {
            if let Some(x) = coords.x {
                let value: f64 = x.into();
                next.x = self.to_inch(value);
            }
            if let Some(y) = coords.y {
                let value: f64 = y.into();
                next.y = self.to_inch(value);
            }
        }
        next
    }

    /// Level the next nets would be appended to
    fn current_level(&self) -> LayerState {
        self.image.layers().last().cloned().unwrap_or_default()
    }

    fn apply(&mut self, command: &gt::Command) {
        match command {
            gt::Command::ExtendedCode(gt::ExtendedCode::Unit(u)) => self.units = *u,
            gt::Command::ExtendedCode(gt::ExtendedCode::LoadPolarity(p)) => {
                let polarity = match p {
                    gt::Polarity::Clear => LayerPolarity::Clear,
                    gt::Polarity::Dark => LayerPolarity::Dark,
                };
                self.image.push_layer_state(LayerState {
                    polarity,
                    ..self.current_level()
                });
            }
            gt::Command::ExtendedCode(gt::ExtendedCode::StepAndRepeat(sr)) => {
                let step_and_repeat = match sr {
                    gt::StepAndRepeat::Open {
                        repeat_x,
                        repeat_y,
                        distance_x,
                        distance_y,
                    } => StepAndRepeat {
                        x: *repeat_x,
                        y: *repeat_y,
                        dist_x: self.to_inch(*distance_x),
                        dist_y: self.to_inch(*distance_y),
                    },
                    gt::StepAndRepeat::Close => StepAndRepeat::default(),
                };
                debug!("Step and repeat {:?}", step_and_repeat);
                self.image.push_layer_state(LayerState {
                    step_and_repeat,
                    ..self.current_level()
                });
            }
            gt::Command::ExtendedCode(gt::ExtendedCode::ImagePolarity(p)) => {
                self.image.info.polarity = match p {
                    gt::ImagePolarity::Positive => ImagePolarity::Positive,
                    gt::ImagePolarity::Negative => ImagePolarity::Negative,
                };
            }
            gt::Command::FunctionCode(gt::FunctionCode::GCode(g)) => match g {
                gt::GCode::InterpolationMode(m) => self.interpolation = *m,
                gt::GCode::QuadrantMode(q) => self.quadrant = *q,
                gt::GCode::RegionMode(on) => {
                    let interpolation = if *on {
                        Interpolation::RegionStart
                    } else {
                        Interpolation::RegionEnd
                    };
                    self.image.push_net(Net::new(
                        self.position,
                        self.position,
                        0,
                        ApertureState::On,
                        interpolation,
                    ));
                }
                _ => {}
            },
            gt::Command::FunctionCode(gt::FunctionCode::DCode(d)) => match d {
                gt::DCode::SelectAperture(code) => self.aperture = *code,
                gt::DCode::Operation(op) => match op {
                    gt::Operation::Move(coords) => {
                        let next = self.target(coords);
                        self.image.push_net(Net::new(
                            self.position,
                            next,
                            self.aperture,
                            ApertureState::Off,
                            Interpolation::LinearX1,
                        ));
                        self.position = next;
                    }
                    gt::Operation::Interpolate(coords, offset) => {
                        let next = self.target(coords);
                        let net = self.interpolate(next, offset);
                        self.image.push_net(net);
                        self.position = next;
                    }
                    gt::Operation::Flash(coords) => {
                        let next = self.target(coords);
                        self.image.push_net(Net::new(
                            next,
                            next,
                            self.aperture,
                            ApertureState::Flash,
                            Interpolation::LinearX1,
                        ));
                        self.position = next;
                    }
                },
            },
            _ => {}
        }
    }

    fn interpolate(&self, next: Point, offset: &Option<gt::CoordinateOffset>) -> Net {
        let clockwise = match self.interpolation {
            gt::InterpolationMode::Linear => None,
            gt::InterpolationMode::ClockwiseCircular => Some(true),
            gt::InterpolationMode::CounterclockwiseCircular => Some(false),
        };

        let (Some(clockwise), Some(offset)) = (clockwise, offset) else {
            return Net::new(
                self.position,
                next,
                self.aperture,
                ApertureState::On,
                Interpolation::LinearX1,
            );
        };

        let i: f64 = offset.x.map(|v| v.into()).unwrap_or(0.0);
        let j: f64 = offset.y.map(|v| v.into()).unwrap_or(0.0);
        let center = self.arc_center(next, self.to_inch(i), self.to_inch(j), clockwise);
        let radius = distance(self.position, center);
        let (angle1, angle2) = arc_angles(self.position, next, center, clockwise);

        let interpolation = if clockwise {
            Interpolation::ClockwiseCircular
        } else {
            Interpolation::CounterClockwiseCircular
        };
        let mut net = Net::new(
            self.position,
            next,
            self.aperture,
            ApertureState::On,
            interpolation,
        );
        net.cirseg = Some(CircleSegment {
            center,
            width: radius * 2.0,
            height: radius * 2.0,
            angle1,
            angle2,
        });
        net
    }

    /// Center of the arc from the current point to `next`.
    ///
    /// Under G75 the offsets are signed. Under G74 they are unsigned and the
    /// center is the sign combination whose sweep is at most a quarter turn,
    /// preferring the one where both endpoints lie closest to the same radius.
    fn arc_center(&self, next: Point, i: f64, j: f64, clockwise: bool) -> Point {
        let start = self.position;
        if matches!(self.quadrant, gt::QuadrantMode::Multi) {
            return Point::new(start.x + i, start.y + j);
        }

        let mut best: Option<(f64, Point)> = None;
        for (sx, sy) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
            let center = Point::new(start.x + sx * i.abs(), start.y + sy * j.abs());
            let (angle1, angle2) = arc_angles(start, next, center, clockwise);
            if (angle2 - angle1).abs() > 90.0 + QUADRANT_TOLERANCE {
                continue;
            }
            let mismatch = (distance(start, center) - distance(next, center)).abs();
            if best.map_or(true, |(m, _)| mismatch < m) {
                best = Some((mismatch, center));
            }
        }

        match best {
            Some((_, center)) => center,
            None => {
                warn!(
                    "Single quadrant arc to ({}, {}) spans more than 90 degrees, using signed offsets",
                    next.x, next.y
                );
                Point::new(start.x + i, start.y + j)
            }
        }
    }

    fn finish(self) -> Image {
        self.image
    }
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Start and stop angles in degrees, with the stop unwrapped so that the
/// sweep runs in the arc's direction
fn arc_angles(start: Point, stop: Point, center: Point, clockwise: bool) -> (f64, f64) {
    let angle1 = (start.y - center.y).atan2(start.x - center.x).to_degrees();
    let mut angle2 = (stop.y - center.y).atan2(stop.x - center.x).to_degrees();
    if clockwise {
        if angle2 >= angle1 {
            angle2 -= 360.0;
        }
    } else if angle2 <= angle1 {
        angle2 += 360.0;
    }
    (angle1, angle2)
}
