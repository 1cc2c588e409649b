//! RS-274X writer
//!
//! Coordinates are written in inches with six decimals. Macro apertures
//! cannot be reconstructed from their evaluated parameters and are left out
//! together with the nets that use them.

use super::{write_output, Exporter};
use crate::aperture::{Aperture, ApertureType, APERTURE_MIN};
use crate::error::Result;
use crate::geometry::{Point, UserTransform};
use crate::image::{Image, ImagePolarity};
use crate::net::{ApertureState, Interpolation, LayerPolarity, LayerState, Net, StepAndRepeat};
use crate::project::Project;
use crate::render::RenderInfo;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

const COORDINATE_SCALE: f64 = 1_000_000.0;

/// Writes every visible layer, with its transform applied, into one Gerber
/// file. The render info is not used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rs274xExporter;

impl Exporter for Rs274xExporter {
    fn export(&self, project: &Project, _info: &RenderInfo, path: &Path) -> Result<()> {
        let mut merged = Image::new();
        for layer in project.layers().iter().filter(|l| l.is_visible()) {
            layer.image().copy_into(&mut merged, layer.transform())?;
        }
        write_rs274x(&merged, path, None)
    }
}

/// Write `image` to `path`, optionally transformed first
pub fn write_rs274x(image: &Image, path: &Path, transform: Option<&UserTransform>) -> Result<()> {
    let image = match transform {
        Some(t) if !t.is_identity() => Cow::Owned(image.duplicate(t)?),
        _ => Cow::Borrowed(image),
    };
    let text = render_rs274x(&image);
    write_output(path, text.as_bytes())?;
    info!("Wrote {} nets to {}", image.net_count(), path.display());
    Ok(())
}

pub(crate) fn render_rs274x(image: &Image) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "G04 gerbkit {} export, {}*\n",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    if let Some(name) = &image.info.name {
        out.push_str(&format!("G04 source {}*\n", name.replace('*', "")));
    }
    out.push_str("%FSLAX36Y36*%\n%MOIN*%\n");
    if image.info.polarity == ImagePolarity::Negative {
        out.push_str("%IPNEG*%\n");
    }

    let mut written = BTreeSet::new();
    for (id, aperture) in image.apertures().iter() {
        if id < APERTURE_MIN {
            continue;
        }
        match aperture_definition(aperture) {
            Some(body) => {
                out.push_str(&format!("%ADD{}{}*%\n", id, body));
                written.insert(id);
            }
            None => warn!("D{} ({:?}) has no RS-274X template, skipped", id, aperture.aperture_type),
        }
    }

    let mut body = BodyWriter::new(&written);
    for net in image.nets() {
        body.net(image, net);
    }
    out.push_str(&body.finish());
    out.push_str("M02*\n");
    out
}

fn aperture_definition(aperture: &Aperture) -> Option<String> {
    let code = aperture.aperture_type.template_code()?;
    let p = aperture.parameters();
    let modifiers: Vec<f64> = match aperture.aperture_type {
        // Polygons keep their vertex count and rotation verbatim
        ApertureType::Polygon if p.len() == 3 && p[2] == 0.0 => p[..2].to_vec(),
        _ => p.to_vec(),
    };
    let joined: Vec<String> = modifiers.iter().map(|v| decimal(*v)).collect();
    Some(format!("{},{}", code, joined.join("X")))
}

fn decimal(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn coordinate(value: f64) -> i64 {
    (value * COORDINATE_SCALE).round() as i64
}

/// Tracks the modal state of the output so only changes are written
struct BodyWriter<'a> {
    defined: &'a BTreeSet<i32>,
    out: String,
    level: Option<usize>,
    polarity: LayerPolarity,
    step_and_repeat: StepAndRepeat,
    aperture: Option<i32>,
    mode: Option<&'static str>,
    multi_quadrant: bool,
    in_region: bool,
    position: Option<Point>,
    skipped: usize,
}

impl<'a> BodyWriter<'a> {
    fn new(defined: &'a BTreeSet<i32>) -> Self {
        Self {
            defined,
            out: String::new(),
            level: None,
            polarity: LayerPolarity::Dark,
            step_and_repeat: StepAndRepeat::default(),
            aperture: None,
            mode: None,
            multi_quadrant: false,
            in_region: false,
            position: None,
            skipped: 0,
        }
    }

    fn finish(mut self) -> String {
        if self.step_and_repeat != StepAndRepeat::default() {
            self.out.push_str("%SR*%\n");
        }
        if self.skipped > 0 {
            warn!("{} nets use apertures without a definition and were left out", self.skipped);
        }
        self.out
    }

    fn net(&mut self, image: &Image, net: &Net) {
        if let Some(level) = image.layers().get(net.layer) {
            self.level(net.layer, level);
        }

        match net.interpolation {
            Interpolation::RegionStart => {
                self.out.push_str("G36*\n");
                self.in_region = true;
                return;
            }
            Interpolation::RegionEnd => {
                self.out.push_str("G37*\n");
                self.in_region = false;
                return;
            }
            Interpolation::Deleted => return,
            _ => {}
        }

        // Region outlines are drawn without an aperture
        if net.aperture_state != ApertureState::Off
            && !self.in_region
            && !self.select(net.aperture)
        {
            self.skipped += 1;
            return;
        }

        match net.aperture_state {
            ApertureState::Off => self.move_to(net.stop),
            ApertureState::Flash => {
                self.out.push_str(&format!("{}D03*\n", xy(net.stop)));
                self.position = Some(net.stop);
            }
            ApertureState::On => {
                if self.position != Some(net.start) {
                    self.move_to(net.start);
                }
                self.draw(net);
            }
        }
    }

    fn level(&mut self, index: usize, level: &LayerState) {
        if self.level == Some(index) {
            return;
        }
        self.level = Some(index);

        if level.step_and_repeat != self.step_and_repeat {
            let sr = level.step_and_repeat;
            if sr == StepAndRepeat::default() {
                self.out.push_str("%SR*%\n");
            } else {
                self.out.push_str(&format!(
                    "%SRX{}Y{}I{}J{}*%\n",
                    sr.x.max(1),
                    sr.y.max(1),
                    decimal(sr.dist_x),
                    decimal(sr.dist_y)
                ));
            }
            self.step_and_repeat = sr;
        }
        if level.polarity != self.polarity {
            self.out.push_str(match level.polarity {
                LayerPolarity::Dark => "%LPD*%\n",
                LayerPolarity::Clear => "%LPC*%\n",
            });
            self.polarity = level.polarity;
        }
    }

    fn select(&mut self, aperture: i32) -> bool {
        if !self.defined.contains(&aperture) {
            return false;
        }
        if self.aperture != Some(aperture) {
            self.out.push_str(&format!("D{}*\n", aperture));
            self.aperture = Some(aperture);
        }
        true
    }

    fn set_mode(&mut self, mode: &'static str) {
        if self.mode != Some(mode) {
            self.out.push_str(&format!("{}*\n", mode));
            self.mode = Some(mode);
        }
    }

    fn move_to(&mut self, p: Point) {
        self.out.push_str(&format!("{}D02*\n", xy(p)));
        self.position = Some(p);
    }

    fn draw(&mut self, net: &Net) {
        match (net.interpolation, net.cirseg) {
            (Interpolation::ClockwiseCircular, Some(seg))
            | (Interpolation::CounterClockwiseCircular, Some(seg)) => {
                if !self.multi_quadrant {
                    self.out.push_str("G75*\n");
                    self.multi_quadrant = true;
                }
                let mode = if net.interpolation == Interpolation::ClockwiseCircular {
                    "G02"
                } else {
                    "G03"
                };
                self.set_mode(mode);
                self.out.push_str(&format!(
                    "{}I{}J{}D01*\n",
                    xy(net.stop),
                    coordinate(seg.center.x - net.start.x),
                    coordinate(seg.center.y - net.start.y)
                ));
            }
            _ => {
                self.set_mode("G01");
                self.out.push_str(&format!("{}D01*\n", xy(net.stop)));
            }
        }
        self.position = Some(net.stop);
    }
}

fn xy(p: Point) -> String {
    format!("X{}Y{}", coordinate(p.x), coordinate(p.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::Unit;
    use crate::loader::{GerberLoader, Loader};

    fn square() -> Image {
        let mut image = Image::default();
        image
            .define_aperture(10, ApertureType::Circle, &[0.01], Unit::Inch)
            .unwrap();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)];
        let mut net = Net::new(
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            10,
            ApertureState::Off,
            Interpolation::LinearX1,
        );
        image.push_net(net.clone());
        for pair in corners.windows(2) {
            net.start = Point::new(pair[0].0, pair[0].1);
            net.stop = Point::new(pair[1].0, pair[1].1);
            net.aperture_state = ApertureState::On;
            image.push_net(net.clone());
        }
        image
    }

    #[test]
    fn test_header_and_apertures() {
        let text = render_rs274x(&square());

        assert!(text.starts_with("G04 gerbkit"));
        assert!(text.contains("%FSLAX36Y36*%"));
        assert!(text.contains("%MOIN*%"));
        assert!(!text.contains("%IPNEG*%"));
        assert!(text.contains("%ADD10C,0.01*%"));
        assert!(text.contains("D10*\n"));
        assert!(text.contains("X1000000Y0D01*"));
        assert!(text.trim_end().ends_with("M02*"));
    }

    #[test]
    fn test_modal_state_written_once() {
        let text = render_rs274x(&square());
        assert_eq!(text.matches("G01*").count(), 1);
        assert_eq!(text.matches("D10*").count(), 1);
    }

    #[test]
    fn test_clear_level_and_arc() {
        let mut image = square();
        image.push_layer_state(LayerState {
            polarity: LayerPolarity::Clear,
            ..LayerState::default()
        });
        image
            .append_arc(
                Point::new(0.5, 0.5),
                0.25,
                0.0,
                180.0,
                0.01,
                ApertureType::Circle,
                Interpolation::CounterClockwiseCircular,
            )
            .unwrap();

        let text = render_rs274x(&image);
        assert!(text.contains("%LPC*%"));
        assert!(text.contains("G75*"));
        assert!(text.contains("G03*"));
        assert!(text.contains("I-250000J0D01*"));
    }

    #[test]
    fn test_written_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("square.gbr");
        write_rs274x(&square(), &path, None).unwrap();

        let image = GerberLoader::default().load(&path).unwrap();
        let extents = image.extents();
        let drawn = image
            .nets()
            .iter()
            .filter(|n| n.aperture_state == ApertureState::On)
            .count();
        assert_eq!(drawn, 4);
        assert!((extents.right - 1.005).abs() < 1e-6);
        assert!((extents.left + 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_transform_applied_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moved.gbr");
        let mut transform = UserTransform::default();
        transform.translate(2.0, 0.0);
        write_rs274x(&square(), &path, Some(&transform)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("X3000000Y0D01*"));
    }
}
