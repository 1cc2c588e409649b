//! Configuration management for gerbkit
//!
//! This module handles CLI argument parsing and logging setup.

use crate::color::Color;
use crate::error::{exit_code, GerbvError};
use crate::export::ExportFormat;
use crate::geometry::Point;
use crate::render::{clamp_margin, DEFAULT_DPI, DEFAULT_MARGIN};
use anyhow::{anyhow, Context, Result};
use clap::builder::styling;
use clap::{value_parser, Arg, ArgAction, ArgMatches, ColorChoice, Command};
use std::path::PathBuf;
use tracing::info;

/// Build the CLI command
pub fn build_cli() -> Command {
    let styles = styling::Styles::styled()
        .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Blue.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default());

    Command::new("gerbkit")
        .about("gerbkit - Compose Gerber layers and export them as PNG, PDF, SVG or RS-274X")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .help("Gerber file to load, repeat for more layers")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Output file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .help("Output format, inferred from the output extension when omitted")
                .value_parser(["png", "pdf", "svg", "rs274x"]),
        )
        .arg(
            Arg::new("dpi")
                .short('d')
                .long("dpi")
                .help("Resolution in dots per inch")
                .value_parser(parse_positive)
                .default_value("72"),
        )
        .arg(
            Arg::new("margin")
                .short('m')
                .long("margin")
                .help("Margin around the board in inches")
                .value_parser(value_parser!(f64))
                .default_value("0.05"),
        )
        .arg(
            Arg::new("background")
                .short('b')
                .long("background")
                .help("Background colour as R,G,B[,A] in 0..1")
                .value_name("R,G,B[,A]")
                .value_parser(parse_color)
                .default_value("1,1,1,1"),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .help("Layer colour as R,G,B[,A], applied to layers in order")
                .value_name("R,G,B[,A]")
                .value_parser(parse_color)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("size")
                .long("size")
                .help("Page size in inches, the page starts at the image origin")
                .value_name("W,H")
                .value_parser(parse_pair),
        )
        .arg(
            Arg::new("panelize")
                .long("panelize")
                .help("Panelize the first layer, one copy per position")
                .value_name("X,Y")
                .value_parser(parse_pair)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("panel_rotation")
                .long("panel-rotation")
                .help("Rotation of every panel copy in radians")
                .value_name("RAD")
                .value_parser(value_parser!(f64))
                .default_value("0")
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("panel_offset")
                .long("panel-offset")
                .help("Offset added to every panel position")
                .value_name("X,Y")
                .value_parser(parse_pair)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("translate")
                .long("translate")
                .help("Translate every layer")
                .value_name("X,Y")
                .value_parser(parse_pair)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("scale")
                .long("scale")
                .help("Scale every layer")
                .value_name("X,Y")
                .allow_hyphen_values(true)
                .value_parser(parse_pair),
        )
        .arg(
            Arg::new("rotate")
                .long("rotate")
                .help("Rotate the whole project in radians")
                .value_name("RAD")
                .value_parser(value_parser!(f64))
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("mirror_x")
                .long("mirror-x")
                .help("Mirror every layer around the X axis")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mirror_y")
                .long("mirror-y")
                .help("Mirror every layer around the Y axis")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("invert")
                .long("invert")
                .help("Invert the polarity of every layer")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("portrait")
                .long("portrait")
                .help("Make the larger board dimension the page height")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_progress")
                .long("no-progress")
                .help("Disable progress indicators")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Gerber files, loaded in order
    pub inputs: Vec<PathBuf>,

    pub output: PathBuf,

    pub format: ExportFormat,

    pub dpi: f64,

    /// Inches, already clamped
    pub margin: f64,

    pub background: Color,

    /// Layer colours in layer order
    pub colors: Vec<Color>,

    /// Explicit page size in inches
    pub size: Option<(f64, f64)>,

    pub panelize: Vec<Point>,
    pub panel_rotation: f64,
    pub panel_offset: Point,

    pub translate: Option<(f64, f64)>,
    pub scale: Option<(f64, f64)>,
    pub rotate: Option<f64>,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub invert: bool,
    pub portrait: bool,

    pub verbose: bool,

    pub no_progress: bool,
}

impl Config {
    /// Parse arguments and apply initial configuration
    /// Parse the process arguments. `--help` and `--version` print and exit
    /// with success; any other usage error becomes [`GerbvError::InvalidArgument`].
    pub fn from_args() -> Result<Self> {
        let matches = match build_cli().try_get_matches() {
            Ok(matches) => matches,
            Err(e) if !e.use_stderr() => {
                let _ = e.print();
                std::process::exit(exit_code::SUCCESS);
            }
            Err(e) => return Err(usage_error(&e).into()),
        };
        let config = Self::from_matches(&matches)?;

        // RUST_LOG takes precedence over the verbose flag
        let default_filter = if config.verbose { "info" } else { "off" };
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

        tracing_subscriber::fmt().with_env_filter(env_filter).init();

        if config.verbose {
            info!("Configuration: {:?}", config);
        }

        Ok(config)
    }

    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let inputs: Vec<PathBuf> = matches
            .get_many::<PathBuf>("input")
            .ok_or_else(|| anyhow!("At least one input file is required"))?
            .cloned()
            .collect();

        let output = matches
            .get_one::<PathBuf>("output")
            .cloned()
            .ok_or_else(|| anyhow!("Output path is required"))?;

        let format = match matches.get_one::<String>("format") {
            Some(name) => name
                .parse::<ExportFormat>()
                .map_err(|e| GerbvError::invalid_argument(e.to_string()))?,
            None => ExportFormat::from_path(&output).unwrap_or(ExportFormat::Png),
        };

        let pairs = |id: &str| -> Vec<(f64, f64)> {
            matches
                .get_many::<(f64, f64)>(id)
                .map(|values| values.copied().collect())
                .unwrap_or_default()
        };

        Ok(Config {
            inputs,
            output,
            format,
            dpi: matches.get_one::<f64>("dpi").copied().unwrap_or(DEFAULT_DPI),
            margin: clamp_margin(
                matches
                    .get_one::<f64>("margin")
                    .copied()
                    .unwrap_or(DEFAULT_MARGIN),
            ),
            background: matches
                .get_one::<Color>("background")
                .copied()
                .unwrap_or(Color::new(1.0, 1.0, 1.0, 1.0)),
            colors: matches
                .get_many::<Color>("color")
                .map(|values| values.copied().collect())
                .unwrap_or_default(),
            size: matches.get_one::<(f64, f64)>("size").copied(),
            panelize: pairs("panelize").into_iter().map(Point::from).collect(),
            panel_rotation: matches
                .get_one::<f64>("panel_rotation")
                .copied()
                .unwrap_or(0.0),
            panel_offset: matches
                .get_one::<(f64, f64)>("panel_offset")
                .copied()
                .map(Point::from)
                .unwrap_or_default(),
            translate: matches.get_one::<(f64, f64)>("translate").copied(),
            scale: matches.get_one::<(f64, f64)>("scale").copied(),
            rotate: matches.get_one::<f64>("rotate").copied(),
            mirror_x: matches.get_flag("mirror_x"),
            mirror_y: matches.get_flag("mirror_y"),
            invert: matches.get_flag("invert"),
            portrait: matches.get_flag("portrait"),
            verbose: matches.get_flag("verbose"),
            no_progress: matches.get_flag("no_progress"),
        })
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        for input in &self.inputs {
            if !input.is_file() {
                return Err(GerbvError::invalid_argument(format!(
                    "Input file does not exist: {}",
                    input.display()
                ))
                .into());
            }
        }

        if let Some(dir) = self.output.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.exists() {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create output directory: {}", dir.display())
                })?;
                info!("Created output directory: {}", dir.display());
            }
        }

        info!("Configuration validation completed successfully");
        Ok(())
    }
}

/// First line of clap's rendered message, without its `error: ` prefix
fn usage_error(err: &clap::Error) -> GerbvError {
    let rendered = err.render().to_string();
    let reason = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string();
    GerbvError::invalid_argument(reason)
}

fn parse_numbers(value: &str) -> Result<Vec<f64>, String> {
    value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect()
}

/// `X,Y` pair of numbers
pub fn parse_pair(value: &str) -> Result<(f64, f64), String> {
    match parse_numbers(value)?.as_slice() {
        [x, y] => Ok((*x, *y)),
        _ => Err(format!("expected X,Y but got '{}'", value)),
    }
}

/// `R,G,B` or `R,G,B,A` with every channel in 0..1
pub fn parse_color(value: &str) -> Result<Color, String> {
    let channels = parse_numbers(value)?;
    if channels.iter().any(|c| !(0.0..=1.0).contains(c)) {
        return Err(format!("colour channels must be within 0..1: '{}'", value));
    }
    match channels.as_slice() {
        [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
        [r, g, b, a] => Ok(Color::new(*r, *g, *b, *a)),
        _ => Err(format!("expected R,G,B[,A] but got '{}'", value)),
    }
}

fn parse_positive(value: &str) -> Result<f64, String> {
    match value.trim().parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => Ok(v),
        _ => Err(format!("expected a positive number but got '{}'", value)),
    }
}
