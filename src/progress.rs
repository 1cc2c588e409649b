//! Progress display for the command line using indicatif

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::info;

const LOAD_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} layers {msg}";
const EXPORT_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";

/// Progress bars for layer loading and export. A disabled tracker hands out
/// no bars and every helper accepts `None`.
pub struct ProgressTracker {
    enabled: bool,
}

impl ProgressTracker {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Bar counting input files, one tick per layer attempted
    pub fn create_load_progress(&self, total: usize) -> Option<ProgressBar> {
        if !self.enabled || total == 0 {
            return None;
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(LOAD_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        pb.enable_steady_tick(Duration::from_millis(100));

        info!("Loading {} layer(s)", total);
        Some(pb)
    }

    /// Spinner shown while the output file is rendered and written
    pub fn create_export_spinner(&self, format: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template(EXPORT_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Exporting {}...", format));
        pb.enable_steady_tick(Duration::from_millis(80));

        Some(pb)
    }

    /// Count one layer as processed and show its name
    pub fn layer_done(pb: &Option<ProgressBar>, name: &str) {
        if let Some(progress) = pb {
            progress.inc(1);
            progress.set_message(name.to_string());
        }
    }

    pub fn finish_progress(pb: Option<ProgressBar>, success_message: &str) {
        if let Some(progress) = pb {
            progress.finish_with_message(success_message.to_string());
            info!("{}", success_message);
        }
    }

    pub fn finish_with_error(pb: Option<ProgressBar>, error_message: &str) {
        if let Some(progress) = pb {
            progress.abandon_with_message(format!("❌ {}", error_message));
        }
    }
}
