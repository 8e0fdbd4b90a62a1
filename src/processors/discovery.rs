//! Finding data files in a folder.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// True if `path` has extension `extension` (ASCII case-insensitive, a
/// leading dot in `extension` is ignored).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// List data files directly inside `dir`.
///
/// Regular files whose extension matches are returned, including symlinks
/// to regular files; sub-folders (including the output folder) are not
/// searched. Paths are sorted.
///
/// # Errors
///
/// Returns an error if `dir` cannot be read.
pub fn find_data_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| has_extension(path, extension))
        .filter(|path| fs::metadata(path).map(|m| m.is_file()).unwrap_or(false))
        .collect();

    files.sort();
    Ok(files)
}
