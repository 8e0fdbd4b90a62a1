//! Data writers for batch run outputs.
//!
//! Images themselves are written by [`crate::visualization`]; this module
//! writes the CSV manifest describing them, one row per rendered image.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// One rendered (or, in a dry run, planned) image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Data file the channel came from
    pub source: PathBuf,
    /// Channel title
    pub channel: String,
    /// PNG path
    pub output: PathBuf,
    /// Colorbar minimum, in plotted units
    pub min: f64,
    /// Colorbar maximum, in plotted units
    pub max: f64,
    /// Colorbar label
    pub label: String,
    /// Scan width in meters
    pub xreal: f64,
    /// Scan height in meters
    pub yreal: f64,
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write the image manifest as CSV.
///
/// Columns: `source,channel,output,min,max,label,xreal,yreal`.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `images` - Records to write, in order
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use afm_plot::core::writers::write_manifest_csv;
/// use std::path::Path;
///
/// write_manifest_csv(Path::new("manifest.csv"), &[]).unwrap();
/// ```
pub fn write_manifest_csv(path: &Path, images: &[ImageRecord]) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();
    let csv_err = |e: csv::Error| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    csv_writer
        .write_record([
            "source", "channel", "output", "min", "max", "label", "xreal", "yreal",
        ])
        .map_err(csv_err)?;

    for image in images {
        csv_writer
            .write_record(&[
                image.source.display().to_string(),
                image.channel.clone(),
                image.output.display().to_string(),
                format!("{:.6e}", image.min),
                format!("{:.6e}", image.max),
                image.label.clone(),
                format!("{:.6e}", image.xreal),
                format!("{:.6e}", image.yreal),
            ])
            .map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    Ok(())
}
