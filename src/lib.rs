// SPDX-FileCopyrightText: 2025 HalfSweet
// SPDX-License-Identifier: Apache-2.0

//! gerbkit - Gerber image model, layer composition and export
//!
//! A [`Project`] holds an ordered list of [`Layer`]s, each wrapping a parsed
//! [`Image`] together with its colour, visibility and user transform. Images
//! are loaded through the [`Loader`] seam and written out through
//! [`Exporter`]s for PNG, PDF, SVG and RS-274X.

pub mod aperture;
pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod image;
pub mod layer;
pub mod loader;
pub mod net;
pub mod progress;
pub mod project;
pub mod render;

pub use aperture::{Aperture, ApertureType, Unit};
pub use color::Color;
pub use error::{GerbvError, Result};
pub use export::{ExportFormat, Exporter};
pub use geometry::{BoundingBox, Point, UserTransform};
pub use image::Image;
pub use layer::Layer;
pub use loader::{GerberLoader, Loader};
pub use project::Project;
pub use render::RenderInfo;
