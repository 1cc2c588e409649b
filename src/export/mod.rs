//! Project exporters
//!
//! Raster (PNG), vector (SVG, PDF) and Gerber (RS-274X) output. Every
//! exporter sits behind [`Exporter`] so another rendering engine can be
//! plugged into [`Project::export_with`].

use crate::error::{GerbvError, Result};
use crate::project::Project;
use crate::render::RenderInfo;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

mod pdf;
mod png;
pub mod rs274x;
pub(crate) mod scene;
mod svg;

pub use pdf::PdfExporter;
pub use png::PngExporter;
pub use rs274x::{write_rs274x, Rs274xExporter};
pub use svg::SvgExporter;

/// Writes a project to a file
pub trait Exporter {
    /// Render the visible layers of `project` with `info` into `path`.
    /// Renderer failures are reported as [`GerbvError::Export`].
    fn export(&self, project: &Project, info: &RenderInfo, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Png,
    Pdf,
    Svg,
    Rs274x,
}

impl ExportFormat {
    /// Format implied by the extension of `path`
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(ExportFormat::Png),
            "pdf" => Some(ExportFormat::Pdf),
            "svg" => Some(ExportFormat::Svg),
            "gbr" | "ger" | "gbx" => Some(ExportFormat::Rs274x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Svg => "svg",
            ExportFormat::Rs274x => "rs274x",
        }
    }

    pub fn exporter(&self) -> Box<dyn Exporter> {
        match self {
            ExportFormat::Png => Box::new(PngExporter),
            ExportFormat::Pdf => Box::new(PdfExporter),
            ExportFormat::Svg => Box::new(SvgExporter),
            ExportFormat::Rs274x => Box::new(Rs274xExporter),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = GerbvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "pdf" => Ok(ExportFormat::Pdf),
            "svg" => Ok(ExportFormat::Svg),
            "rs274x" | "gerber" => Ok(ExportFormat::Rs274x),
            other => Err(GerbvError::export(format!("unknown export format '{}'", other))),
        }
    }
}

/// Write `bytes` to `path`, reporting IO failures as export errors
pub(crate) fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)
        .map_err(|e| GerbvError::export(format!("cannot write {}: {}", path.display(), e)))
}

/// Compact decimal for vector output
pub(crate) fn num(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a/b.PNG")), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::from_path(Path::new("board.svg")), Some(ExportFormat::Svg));
        assert_eq!(ExportFormat::from_path(Path::new("top.gbr")), Some(ExportFormat::Rs274x));
        assert_eq!(ExportFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert!(matches!(
            "bmp".parse::<ExportFormat>(),
            Err(GerbvError::Export { .. })
        ));
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(1.5), "1.5");
        assert_eq!(num(2.0), "2");
        assert_eq!(num(-0.0001), "0");
        assert_eq!(num(0.1234), "0.123");
    }
}
