//! SVG output
//!
//! Each layer becomes a rectangle in the layer colour seen through a mask
//! holding the layer geometry, so clear polarity and inversion erase only
//! within their own layer.

use super::scene::{Geometry, Scene, SceneLayer};
use super::{num, write_output, Exporter};
use crate::error::Result;
use crate::geometry::Point;
use crate::project::Project;
use crate::render::RenderInfo;
use std::path::Path;
use xmlwriter::{Indent, Options, XmlWriter};

#[derive(Debug, Clone, Copy, Default)]
pub struct SvgExporter;

impl Exporter for SvgExporter {
    fn export(&self, project: &Project, info: &RenderInfo, path: &Path) -> Result<()> {
        let scene = Scene::build(project, info);
        write_output(path, build_svg(&scene).as_bytes())
    }
}

pub(crate) fn build_svg(scene: &Scene) -> String {
    let (w, h) = (scene.width.to_string(), scene.height.to_string());
    let mut writer = create_writer();

    writer.start_element("svg");
    writer.write_attribute("xmlns", "http://www.w3.org/2000/svg");
    writer.write_attribute("version", "1.1");
    writer.write_attribute("width", &w);
    writer.write_attribute("height", &h);
    writer.write_attribute("viewBox", &format!("0 0 {} {}", w, h));

    let (_, _, _, bg_alpha) = scene.background.components();
    canvas_rect(&mut writer, scene);
    writer.write_attribute("fill", &scene.background.to_hex());
    writer.write_attribute("fill-opacity", &num(bg_alpha));
    writer.end_element();

    for (index, layer) in scene.layers.iter().enumerate() {
        let mask_id = format!("layer{}", index);
        write_mask(&mut writer, scene, layer, &mask_id);

        writer.start_element("g");
        writer.write_attribute("data-layer", &layer.name);
        canvas_rect(&mut writer, scene);
        writer.write_attribute("fill", &layer.color.to_hex());
        writer.write_attribute("fill-opacity", &num(layer.alpha));
        writer.write_attribute("mask", &format!("url(#{})", mask_id));
        writer.end_element();
        writer.end_element();
    }

    writer.end_document()
}

fn write_mask(writer: &mut XmlWriter, scene: &Scene, layer: &SceneLayer, id: &str) {
    let (base, dark, clear) = if layer.inverted {
        ("white", "black", "white")
    } else {
        ("black", "white", "black")
    };

    writer.start_element("defs");
    writer.start_element("mask");
    writer.write_attribute("id", id);
    writer.write_attribute("maskUnits", "userSpaceOnUse");
    writer.write_attribute("x", "0");
    writer.write_attribute("y", "0");
    writer.write_attribute("width", &scene.width);
    writer.write_attribute("height", &scene.height);

    canvas_rect(writer, scene);
    writer.write_attribute("fill", base);
    writer.end_element();

    for shape in &layer.shapes {
        let paint = if shape.clear { clear } else { dark };
        writer.start_element("path");
        match &shape.geometry {
            Geometry::Fill(outline) => {
                writer.write_attribute("d", &path_data(outline, true));
                writer.write_attribute("fill", paint);
            }
            Geometry::Stroke { path, width } => {
                writer.write_attribute("d", &path_data(path, false));
                writer.write_attribute("fill", "none");
                writer.write_attribute("stroke", paint);
                writer.write_attribute("stroke-width", &num(width.max(1.0)));
                writer.write_attribute("stroke-linecap", "round");
                writer.write_attribute("stroke-linejoin", "round");
            }
        }
        writer.end_element();
    }

    writer.end_element();
    writer.end_element();
}

/// Opens a `rect` covering the canvas; the caller adds paint and closes it
fn canvas_rect(writer: &mut XmlWriter, scene: &Scene) {
    writer.start_element("rect");
    writer.write_attribute("x", "0");
    writer.write_attribute("y", "0");
    writer.write_attribute("width", &scene.width);
    writer.write_attribute("height", &scene.height);
}

fn path_data(points: &[Point], closed: bool) -> String {
    let mut d = String::new();
    for (i, p) in points.iter().enumerate() {
        let cmd = if i == 0 { 'M' } else { 'L' };
        d.push_str(&format!("{}{} {} ", cmd, num(p.x), num(p.y)));
    }
    if closed {
        d.push('Z');
    }
    d.trim_end().to_string()
}

fn create_writer() -> XmlWriter {
    XmlWriter::new(Options {
        use_single_quote: false,
        indent: Indent::Spaces(2),
        attributes_indent: Indent::Spaces(2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::ApertureType;
    use crate::image::Image;
    use crate::layer::Layer;

    fn scene(inverted: bool) -> Scene {
        let mut image = Image::default();
        image
            .append_line(Point::new(0.0, 0.0), Point::new(1.0, 0.0), 0.1, ApertureType::Circle)
            .unwrap();
        let mut project = Project::new();
        let index = project.add_layer(Layer::new(image, "top.gbr"));
        let layer = project.layer_mut(index).unwrap();
        layer.set_color((0.0, 0.5, 1.0));
        layer.set_inverted(inverted);

        let info = project.render_info(54.0, 0.1, false).unwrap();
        Scene::build(&project, &info)
    }

    #[test]
    fn test_svg_document_structure() {
        let svg = build_svg(&scene(false));

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.contains("<mask"));
        assert!(svg.contains("id=\"layer0\""));
        assert!(svg.contains("mask=\"url(#layer0)\""));
        assert!(svg.contains("fill=\"#007FFF\""));
        assert!(svg.contains("data-layer=\"top.gbr\""));
        assert!(svg.contains("stroke-linecap=\"round\""));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_inverted_layer_swaps_mask_paint() {
        let normal = build_svg(&scene(false));
        let inverted = build_svg(&scene(true));

        assert!(normal.contains("stroke=\"white\""));
        assert!(inverted.contains("stroke=\"black\""));
    }

    #[test]
    fn test_path_data() {
        let d = path_data(&[Point::new(0.0, 0.0), Point::new(1.5, 2.0)], true);
        assert_eq!(d, "M0 0 L1.5 2 Z");
    }
}
