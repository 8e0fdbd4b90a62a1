//! Batch plotting of Atomic Force Microscopy scans.
//!
//! This crate provides tools for:
//! - Reading channels from Gwyddion `.gwy` files
//! - Scaling channel data to display units
//! - Rendering channels as PNG images with colorbar and scale bar
//! - Plotting every file of a folder in parallel
//!
//! # Example
//!
//! ```no_run
//! use afm_plot::{processors::batch::{plot_folder, BatchOptions}, PlotConfig};
//! use std::path::Path;
//!
//! let config = PlotConfig::default();
//! let report = plot_folder(
//!     Path::new("."),
//!     Path::new("processed_images"),
//!     &config,
//!     &BatchOptions::default(),
//! )
//! .unwrap();
//! println!("{} images written", report.images.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ChannelStyle, PlotConfig};
pub use crate::core::loaders::{Channel, DataField};
pub use visualization::colormap::Colormap;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
