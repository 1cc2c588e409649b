//! Error handling for gerbkit
//!
//! Library operations return the typed [`GerbvError`]. The command line layer
//! wraps them in anyhow for context and maps them back to stable exit codes.

use anyhow::Context;
use std::path::Path;

/// Result type used by the library modules
pub type Result<T, E = GerbvError> = std::result::Result<T, E>;

/// Process exit codes reported by the `gerbkit` binary
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const FORMAT_ERROR: i32 = 2;
    pub const EXPORT_ERROR: i32 = 3;
    pub const NO_LAYERS: i32 = 4;
    pub const INVALID_ARGUMENT: i32 = 5;
}

/// Specific error types for gerbkit operations
#[derive(Debug, thiserror::Error)]
pub enum GerbvError {
    #[error("Invalid Gerber file format: {reason}")]
    Format { reason: String },

    #[error("No layers loaded in project")]
    NoLayersLoaded,

    #[error("Export failed: {reason}")]
    Export { reason: String },

    #[error("Too many aperture parameters: {count} (maximum {max})")]
    InvalidParameterCount { count: usize, max: usize },

    #[error("Aperture id {id} outside of valid range {min}..={max}")]
    InvalidId { id: i32, min: i32, max: i32 },

    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("Aperture D{id} is not defined")]
    ApertureNotFound { id: i32 },

    #[error("Aperture D{id} is still referenced by {nets} net(s)")]
    ApertureInUse { id: i32, nets: usize },

    #[error("Layer index {index} out of range ({count} layers loaded)")]
    LayerNotFound { index: usize, count: usize },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl GerbvError {
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    pub fn export(reason: impl Into<String>) -> Self {
        Self::Export {
            reason: reason.into(),
        }
    }

    pub fn geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Exit code a command line wrapper reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GerbvError::Format { .. } => exit_code::FORMAT_ERROR,
            GerbvError::Export { .. } => exit_code::EXPORT_ERROR,
            GerbvError::NoLayersLoaded => exit_code::NO_LAYERS,
            GerbvError::InvalidParameterCount { .. }
            | GerbvError::InvalidId { .. }
            | GerbvError::InvalidGeometry { .. }
            | GerbvError::ApertureNotFound { .. }
            | GerbvError::ApertureInUse { .. }
            | GerbvError::LayerNotFound { .. }
            | GerbvError::InvalidArgument { .. } => exit_code::INVALID_ARGUMENT,
        }
    }
}

/// Find the first [`GerbvError`] in an anyhow chain and map it to an exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<GerbvError>())
        .map(GerbvError::exit_code)
        .unwrap_or(exit_code::FAILURE)
}

/// Extension trait for Results to add context in the application layer
pub trait ResultExt<T> {
    /// Add context with file path information
    fn with_path_context<P: AsRef<Path>>(self, operation: &str, path: P) -> anyhow::Result<T>;

    /// Add context naming the layer being worked on
    fn with_layer_context(self, index: usize) -> anyhow::Result<T>;

    /// Add context with the export format
    fn with_export_context(self, format: &str) -> anyhow::Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error> + Send + Sync + 'static,
{
    fn with_path_context<P: AsRef<Path>>(self, operation: &str, path: P) -> anyhow::Result<T> {
        self.map_err(|e| e.into())
            .with_context(|| format!("Failed to {} file: {}", operation, path.as_ref().display()))
    }

    fn with_layer_context(self, index: usize) -> anyhow::Result<T> {
        self.map_err(|e| e.into())
            .with_context(|| format!("Error processing layer {}", index))
    }

    fn with_export_context(self, format: &str) -> anyhow::Result<T> {
        self.map_err(|e| e.into())
            .with_context(|| format!("Error exporting {}", format))
    }
}
