//! PDF output, one page sized to the render canvas
//!
//! Layers are painted in order with their alpha set through an extended
//! graphics state. Clear polarity paints the background colour, and an
//! inverted layer fills the page with its colour first and then paints its
//! geometry in the background colour.

use super::scene::{Geometry, Scene};
use super::{write_output, Exporter};
use crate::color::Color;
use crate::error::Result;
use crate::geometry::Point;
use crate::project::Project;
use crate::render::RenderInfo;
use pdf_writer::types::{LineCapStyle, LineJoinStyle};
use pdf_writer::{Content, Name, Pdf, Rect, Ref};
use std::path::Path;

/// PDF user space units per inch
const POINTS_PER_INCH: f64 = 72.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExporter;

impl Exporter for PdfExporter {
    fn export(&self, project: &Project, info: &RenderInfo, path: &Path) -> Result<()> {
        let scene = Scene::build(project, info);
        write_output(path, &build_pdf(&scene))
    }
}

pub(crate) fn build_pdf(scene: &Scene) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let content_id = Ref::new(4);
    let first_state = 5;

    // Device units to points
    let k = POINTS_PER_INCH / scene.scale;
    let page_w = (scene.width as f64 * k) as f32;
    let page_h = (scene.height as f64 * k) as f32;
    let state_names: Vec<String> = (0..scene.layers.len()).map(|i| format!("L{}", i)).collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, page_w, page_h));
    page.parent(tree_id);
    page.contents(content_id);
    {
        let mut resources = page.resources();
        let mut states = resources.ext_g_states();
        for (i, name) in state_names.iter().enumerate() {
            states.pair(Name(name.as_bytes()), Ref::new(first_state + i as i32));
        }
    }
    drop(page);

    let mut content = Content::new();
    // Device space has Y growing downward
    content.transform([k as f32, 0.0, 0.0, -k as f32, 0.0, page_h]);

    set_fill(&mut content, scene.background);
    content.rect(0.0, 0.0, scene.width as f32, scene.height as f32);
    content.fill_nonzero();

    for (layer, name) in scene.layers.iter().zip(&state_names) {
        content.save_state();
        content.set_parameters(Name(name.as_bytes()));

        let (mut paint, mut erase) = (layer.color, scene.background);
        if layer.inverted {
            set_fill(&mut content, paint);
            content.rect(0.0, 0.0, scene.width as f32, scene.height as f32);
            content.fill_nonzero();
            std::mem::swap(&mut paint, &mut erase);
        }

        for shape in &layer.shapes {
            let color = if shape.clear { erase } else { paint };
            match &shape.geometry {
                Geometry::Fill(outline) => {
                    set_fill(&mut content, color);
                    trace(&mut content, outline);
                    content.close_path();
                    content.fill_nonzero();
                }
                Geometry::Stroke { path, width } => {
                    let [r, g, b] = rgb(color);
                    content.set_stroke_rgb(r, g, b);
                    content.set_line_width(width.max(1.0) as f32);
                    content.set_line_cap(LineCapStyle::RoundCap);
                    content.set_line_join(LineJoinStyle::RoundJoin);
                    trace(&mut content, path);
                    content.stroke();
                }
            }
        }
        content.restore_state();
    }

    pdf.stream(content_id, &content.finish());
    for (i, layer) in scene.layers.iter().enumerate() {
        let alpha = layer.alpha.clamp(0.0, 1.0) as f32;
        pdf.ext_graphics(Ref::new(first_state + i as i32))
            .non_stroking_alpha(alpha)
            .stroking_alpha(alpha);
    }
    pdf.finish()
}

fn rgb(color: Color) -> [f32; 3] {
    let (r, g, b, _) = color.components();
    [r as f32, g as f32, b as f32].map(|c| c.clamp(0.0, 1.0))
}

fn set_fill(content: &mut Content, color: Color) {
    let [r, g, b] = rgb(color);
    content.set_fill_rgb(r, g, b);
}

fn trace(content: &mut Content, points: &[Point]) {
    for (i, p) in points.iter().enumerate() {
        if i == 0 {
            content.move_to(p.x as f32, p.y as f32);
        } else {
            content.line_to(p.x as f32, p.y as f32);
        }
    }
}
