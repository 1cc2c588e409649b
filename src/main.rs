//! gerbkit - Compose Gerber layers and export them
//!
//! Loads one or more Gerber files as project layers, applies colours,
//! panelization and transforms, and writes a PNG, PDF, SVG or RS-274X file.

use anyhow::Result;
use gerbkit::config::Config;
use gerbkit::error::{exit_code_for, GerbvError, ResultExt};
use gerbkit::progress::ProgressTracker;
use gerbkit::project::Project;
use gerbkit::render::RenderInfo;
use tracing::{error, info, warn};

fn main() {
    // Parse configuration and initialize logging
    let config = Config::from_args().unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(exit_code_for(&e));
    });

    info!("Starting gerbkit...");

    match run(&config) {
        Ok(()) => {
            info!("Export completed successfully");
            println!("Wrote {}", config.output.display());
        }
        Err(e) => {
            error!("gerbkit failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

fn run(config: &Config) -> Result<()> {
    config.validate()?;

    let tracker = ProgressTracker::new(!config.no_progress);
    let mut project = Project::new();
    project.set_background(config.background);
    project.set_margin(config.margin);

    load_layers(&mut project, config, &tracker)?;
    arrange(&mut project, config)?;

    let info = match config.size {
        Some((width, height)) => RenderInfo::fixed_size(width, height, config.dpi),
        None => project
            .render_info(config.dpi, config.margin, config.portrait)
            .with_export_context(config.format.as_str())?,
    };

    let spinner = tracker.create_export_spinner(config.format.as_str());
    match project.export(config.format, &info, &config.output) {
        Ok(()) => {
            ProgressTracker::finish_progress(spinner, "Export finished");
            Ok(())
        }
        Err(e) => {
            ProgressTracker::finish_with_error(spinner, "Export failed");
            Err(e).with_path_context("export", &config.output)
        }
    }
}

/// Load every input as a layer. A file that fails to parse is skipped; the
/// run only fails when nothing could be loaded.
fn load_layers(project: &mut Project, config: &Config, tracker: &ProgressTracker) -> Result<()> {
    let pb = tracker.create_load_progress(config.inputs.len());
    let mut last_error = None;

    for input in &config.inputs {
        let name = input.display().to_string();
        let index = project.files_loaded();
        match project.open_layer_from_filename(input) {
            Ok(layer) => {
                if let Some(color) = config.colors.get(index) {
                    layer.set_color(*color);
                }
            }
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                last_error = Some(e);
            }
        }
        ProgressTracker::layer_done(&pb, &name);
    }

    if project.files_loaded() == 0 {
        ProgressTracker::finish_with_error(pb, "No layers loaded");
        return match last_error {
            Some(e) => Err(e).with_path_context("load", &config.inputs[config.inputs.len() - 1]),
            None => Err(GerbvError::NoLayersLoaded.into()),
        };
    }

    ProgressTracker::finish_progress(
        pb,
        &format!("Loaded {} of {} layers", project.files_loaded(), config.inputs.len()),
    );
    Ok(())
}

fn arrange(project: &mut Project, config: &Config) -> Result<()> {
    if !config.panelize.is_empty() {
        project
            .layer_mut(0)
            .and_then(|layer| {
                layer.panelize(&config.panelize, config.panel_rotation, config.panel_offset)
            })
            .with_layer_context(0)?;
    }

    if let Some((x, y)) = config.scale {
        project.scale(x, y);
    }
    if let Some(theta) = config.rotate {
        project.rotate(theta);
    }
    if let Some((x, y)) = config.translate {
        project.translate(x, y);
    }
    if config.mirror_x || config.mirror_y {
        project.mirror(config.mirror_x, config.mirror_y);
    }
    if config.invert {
        project.set_inverted(true);
    }
    Ok(())
}
