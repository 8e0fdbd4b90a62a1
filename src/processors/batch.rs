//! Batch plotting of a folder of AFM scans.
//!
//! Every data file in the input folder is loaded, each channel that has a
//! configured style is rendered to `<output>/<file stem>.<channel>.png`.
//! Files that cannot be read are reported and skipped; a failing channel
//! does not stop the other channels of its file. Files sharing a stem (such
//! as `scan.gwy` and `scan.GWY`) would write the same images, so only the
//! first of them is plotted and the others are reported.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use thiserror::Error;

use super::discovery::find_data_files;
use crate::config::{ChannelStyle, PlotConfig};
use crate::core::loaders::{load_channels, Channel, LoaderError};
use crate::core::transforms::{prepare_channel, value_range};
use crate::core::writers::ImageRecord;
use crate::visualization::plot_channel;

/// Errors for a single channel of an otherwise readable file.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel has no finite values")]
    NoFiniteValues,

    #[error(transparent)]
    Render(#[from] crate::visualization::VisualizationError),
}

/// Options of a batch run that do not belong in the config file.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Only report what would be written
    pub dry_run: bool,
    /// Restrict plotting to these channel titles
    pub channels: Option<Vec<String>>,
}

/// A data file that could not be loaded.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// A channel that could not be rendered.
#[derive(Debug, Clone)]
pub struct ChannelFailure {
    pub source: PathBuf,
    pub channel: String,
    pub error: String,
}

/// Outcome of [`plot_folder`].
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Number of data files matching the extension
    pub files_found: usize,
    pub files_failed: Vec<FileFailure>,
    pub channel_failures: Vec<ChannelFailure>,
    /// Images written (or planned, in a dry run), sorted by output path
    pub images: Vec<ImageRecord>,
    /// Channels without a style, or excluded by the channel filter
    pub skipped_channels: usize,
}

/// Channel overview for a single file.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub id: u32,
    pub title: String,
    pub xres: usize,
    pub yres: usize,
    pub xreal: f64,
    pub yreal: f64,
    pub unit_z: String,
    /// Raw value range, if any value is finite
    pub range: Option<(f64, f64)>,
}

impl BatchReport {
    /// One line per failed file or channel, in report order.
    pub fn failure_messages(&self) -> Vec<String> {
        let files = self
            .files_failed
            .iter()
            .map(|f| format!("Error loading {}: {}", f.path.display(), f.error));
        let channels = self.channel_failures.iter().map(|f| {
            format!(
                "Error plotting {} [{}]: {}",
                f.source.display(),
                f.channel,
                f.error
            )
        });
        files.chain(channels).collect()
    }
}

#[derive(Debug, Default)]
struct FileOutcome {
    images: Vec<ImageRecord>,
    failures: Vec<ChannelFailure>,
    skipped: usize,
}

/// Output image path for a channel of `source`.
///
/// Path separators in the channel title are replaced by `_` so the image
/// always lands directly in `output_dir`.
pub fn output_path_for(output_dir: &Path, source: &Path, channel_title: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title: String = channel_title
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    output_dir.join(format!("{}.{}.png", stem, title))
}

fn render_channel(
    path: &Path,
    channel: &Channel,
    style: &ChannelStyle,
    output_dir: &Path,
    config: &PlotConfig,
    dry_run: bool,
) -> std::result::Result<ImageRecord, ChannelError> {
    let prepared = prepare_channel(&channel.field, style).ok_or(ChannelError::NoFiniteValues)?;
    let output = output_path_for(output_dir, path, &channel.title);

    if !dry_run {
        plot_channel(&output, &prepared, style, config)?;
        debug!("Wrote {}", output.display());
    }

    Ok(ImageRecord {
        source: path.to_path_buf(),
        channel: channel.title.clone(),
        output,
        min: prepared.min,
        max: prepared.max,
        label: style.label.clone(),
        xreal: prepared.xreal,
        yreal: prepared.yreal,
    })
}

/// Render one channel, or `None` if it is filtered out or has no style.
fn plot_one_channel(
    path: &Path,
    channel: &Channel,
    output_dir: &Path,
    config: &PlotConfig,
    options: &BatchOptions,
) -> Option<std::result::Result<ImageRecord, ChannelError>> {
    if let Some(wanted) = &options.channels {
        if !wanted.iter().any(|w| w == &channel.title) {
            return None;
        }
    }
    let style = config.style_for(&channel.title, &channel.field.unit_z)?;

    Some(render_channel(
        path,
        channel,
        &style,
        output_dir,
        config,
        options.dry_run,
    ))
}

fn plot_file(
    path: &Path,
    output_dir: &Path,
    config: &PlotConfig,
    options: &BatchOptions,
) -> std::result::Result<FileOutcome, LoaderError> {
    let channels = load_channels(path)?;
    let mut outcome = FileOutcome::default();

    for channel in &channels {
        match plot_one_channel(path, channel, output_dir, config, options) {
            None => {
                debug!("{}: skipping channel '{}'", path.display(), channel.title);
                outcome.skipped += 1;
            }
            Some(Ok(record)) => outcome.images.push(record),
            Some(Err(e)) => {
                debug!(
                    "{}: failed to plot channel '{}': {}",
                    path.display(),
                    channel.title,
                    e
                );
                outcome.failures.push(ChannelFailure {
                    source: path.to_path_buf(),
                    channel: channel.title.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}

/// Split `files` into those with a unique stem and failures for the rest.
///
/// `files` must be sorted; the first file of each stem is kept.
fn split_colliding_stems(files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<FileFailure>) {
    let mut first_by_stem: HashMap<String, PathBuf> = HashMap::new();
    let mut unique = Vec::with_capacity(files.len());
    let mut colliding = Vec::new();

    for path in files {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match first_by_stem.get(&stem) {
            Some(first) => {
                debug!(
                    "Skipping {}: output names collide with {}",
                    path.display(),
                    first.display()
                );
                colliding.push(FileFailure {
                    error: format!("output names collide with {}", first.display()),
                    path,
                });
            }
            None => {
                first_by_stem.insert(stem, path.clone());
                unique.push(path);
            }
        }
    }

    (unique, colliding)
}

/// Plot every data file in `input_dir` into `output_dir`.
///
/// # Arguments
///
/// * `input_dir` - Folder searched (non-recursively) for data files
/// * `output_dir` - Folder receiving the PNG images
/// * `config` - Extension, channel styles and figure settings
/// * `options` - Dry run flag and channel filter
///
/// # Returns
///
/// A report of written images and failures. When no data files are found
/// the report is empty and `output_dir` is not created.
///
/// # Errors
///
/// Returns an error only if `input_dir` cannot be read or `output_dir`
/// cannot be created. Per-file problems, including files whose stem is
/// already taken by another file, end up in the report.
pub fn plot_folder(
    input_dir: &Path,
    output_dir: &Path,
    config: &PlotConfig,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let files = find_data_files(input_dir, &config.input.extension)?;

    let mut report = BatchReport {
        files_found: files.len(),
        ..Default::default()
    };

    if files.is_empty() {
        return Ok(report);
    }

    let (files, colliding) = split_colliding_stems(files);
    report.files_failed = colliding;

    if !options.dry_run {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output folder: {}", output_dir.display())
        })?;
    }

    info!(
        "Plotting {} file(s) from {} into {}",
        files.len(),
        input_dir.display(),
        output_dir.display()
    );

    let outcomes: Vec<(PathBuf, std::result::Result<FileOutcome, LoaderError>)> = files
        .par_iter()
        .map(|path| (path.clone(), plot_file(path, output_dir, config, options)))
        .collect();

    for (path, outcome) in outcomes {
        match outcome {
            Ok(outcome) => {
                report.images.extend(outcome.images);
                report.channel_failures.extend(outcome.failures);
                report.skipped_channels += outcome.skipped;
            }
            Err(e) => {
                debug!("Error loading {}: {}", path.display(), e);
                report.files_failed.push(FileFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    report.files_failed.sort_by(|a, b| a.path.cmp(&b.path));
    report.images.sort_by(|a, b| a.output.cmp(&b.output));
    Ok(report)
}

/// List the channels of one data file.
pub fn inspect_file(path: &Path) -> Result<Vec<ChannelSummary>> {
    let channels = load_channels(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    Ok(channels
        .into_iter()
        .map(|c| ChannelSummary {
            id: c.id,
            range: value_range(&c.field.data),
            xres: c.field.xres,
            yres: c.field.yres,
            xreal: c.field.xreal,
            yreal: c.field.yreal,
            unit_z: c.field.unit_z,
            title: c.title,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{container, datafield, encode_file, write_scan};
    use tempfile::TempDir;

    fn fast_config() -> PlotConfig {
        let mut config = PlotConfig::default();
        config.figure.map_size = 48;
        config.figure.dpi = 72.0;
        config.figure.annotations = false;
        config
    }

    #[test]
    fn test_output_path_for() {
        let out = Path::new("/data/processed_images");
        assert_eq!(
            output_path_for(out, Path::new("/data/sample_01.gwy"), "ZSensor"),
            PathBuf::from("/data/processed_images/sample_01.ZSensor.png")
        );
        assert_eq!(
            output_path_for(out, Path::new("scan.v2.gwy"), "Peak Force Error"),
            PathBuf::from("/data/processed_images/scan.v2.Peak Force Error.png")
        );
        assert_eq!(
            output_path_for(out, Path::new("a.gwy"), "Height/Retrace"),
            PathBuf::from("/data/processed_images/a.Height_Retrace.png")
        );
    }

    #[test]
    fn test_plot_folder_renders_configured_channels() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "a.gwy");
        write_scan(temp_dir.path(), "b.gwy");
        fs::write(temp_dir.path().join("broken.gwy"), b"not a gwy file").unwrap();
        fs::write(temp_dir.path().join("readme.txt"), b"ignored").unwrap();

        let output_dir = temp_dir.path().join("processed_images");
        let report = plot_folder(
            temp_dir.path(),
            &output_dir,
            &fast_config(),
            &BatchOptions::default(),
        )
        .unwrap();

        assert_eq!(report.files_found, 3);
        assert_eq!(report.files_failed.len(), 1);
        assert!(report.files_failed[0].path.ends_with("broken.gwy"));
        assert!(report.channel_failures.is_empty());
        // Amplitude has no style in the default config
        assert_eq!(report.skipped_channels, 2);
        assert_eq!(report.images.len(), 4);

        for name in [
            "a.ZSensor.png",
            "a.Peak Force Error.png",
            "b.ZSensor.png",
            "b.Peak Force Error.png",
        ] {
            assert!(output_dir.join(name).exists(), "missing {}", name);
        }
        assert!(!output_dir.join("a.Amplitude.png").exists());

        // sorted by output path
        assert!(report.images[0].output.ends_with("a.Peak Force Error.png"));
    }

    #[test]
    fn test_height_channel_is_zeroed_and_scaled() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "a.gwy");

        let report = plot_folder(
            temp_dir.path(),
            &temp_dir.path().join("out"),
            &fast_config(),
            &BatchOptions {
                dry_run: true,
                channels: Some(vec!["ZSensor".to_string()]),
            },
        )
        .unwrap();

        assert_eq!(report.images.len(), 1);
        let height = &report.images[0];
        assert_eq!(height.channel, "ZSensor");
        assert_eq!(height.label, "Height [nm]");
        // ramp 0..127 * 1e-10 m shown in nm
        assert!(height.min.abs() < 1e-9);
        assert!((height.max - 12.7).abs() < 1e-6);
    }

    #[test]
    fn test_plot_folder_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("processed_images");

        let report = plot_folder(
            temp_dir.path(),
            &output_dir,
            &fast_config(),
            &BatchOptions::default(),
        )
        .unwrap();

        assert_eq!(report.files_found, 0);
        assert!(report.images.is_empty());
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_plot_folder_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "a.gwy");
        let output_dir = temp_dir.path().join("processed_images");

        let report = plot_folder(
            temp_dir.path(),
            &output_dir,
            &fast_config(),
            &BatchOptions {
                dry_run: true,
                channels: None,
            },
        )
        .unwrap();

        assert_eq!(report.images.len(), 2);
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_channel_filter() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "a.gwy");
        let output_dir = temp_dir.path().join("out");

        let options = BatchOptions {
            dry_run: false,
            channels: Some(vec!["ZSensor".to_string()]),
        };
        let report = plot_folder(temp_dir.path(), &output_dir, &fast_config(), &options).unwrap();

        assert_eq!(report.images.len(), 1);
        assert_eq!(report.skipped_channels, 2);
        assert!(output_dir.join("a.ZSensor.png").exists());
    }

    #[test]
    fn test_render_unconfigured_channels() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "a.gwy");
        let output_dir = temp_dir.path().join("out");

        let mut config = fast_config();
        config.input.render_unconfigured = true;
        let report =
            plot_folder(temp_dir.path(), &output_dir, &config, &BatchOptions::default()).unwrap();

        assert_eq!(report.images.len(), 3);
        assert_eq!(report.skipped_channels, 0);
        let amplitude = report
            .images
            .iter()
            .find(|r| r.channel == "Amplitude")
            .unwrap();
        assert_eq!(amplitude.label, "[V]");
        assert!(output_dir.join("a.Amplitude.png").exists());
    }

    #[test]
    fn test_channel_without_finite_values_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let root = container(&[
            ("ZSensor", datafield(2, 2, 1e-6, 1e-6, "m", vec![f64::NAN; 4])),
            ("Potential", datafield(2, 2, 1e-6, 1e-6, "V", vec![0.1, 0.2, 0.3, 0.4])),
        ]);
        fs::write(temp_dir.path().join("nan.gwy"), encode_file(&root)).unwrap();

        let report = plot_folder(
            temp_dir.path(),
            &temp_dir.path().join("out"),
            &fast_config(),
            &BatchOptions::default(),
        )
        .unwrap();

        assert_eq!(report.channel_failures.len(), 1);
        assert_eq!(report.channel_failures[0].channel, "ZSensor");
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].channel, "Potential");
    }

    #[test]
    fn test_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "scan.GWY");
        write_scan(temp_dir.path(), "other.dat");

        let mut config = fast_config();
        config.input.extension = ".gwy".to_string();
        let report = plot_folder(
            temp_dir.path(),
            &temp_dir.path().join("out"),
            &config,
            &BatchOptions {
                dry_run: true,
                channels: None,
            },
        )
        .unwrap();

        assert_eq!(report.files_found, 1);
    }

    #[test]
    fn test_same_stem_different_case_is_plotted_once() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "scan.gwy");
        write_scan(temp_dir.path(), "scan.GWY");

        let report = plot_folder(
            temp_dir.path(),
            &temp_dir.path().join("out"),
            &fast_config(),
            &BatchOptions {
                dry_run: true,
                channels: None,
            },
        )
        .unwrap();

        assert_eq!(report.files_found, 2);
        let outputs: Vec<_> = report
            .images
            .iter()
            .map(|r| r.output.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(outputs, vec!["scan.Peak Force Error.png", "scan.ZSensor.png"]);
        // "scan.GWY" sorts first and is the one kept
        assert!(report.images.iter().all(|r| r.source.ends_with("scan.GWY")));

        assert_eq!(report.files_failed.len(), 1);
        assert!(report.files_failed[0].path.ends_with("scan.gwy"));
        assert!(report.files_failed[0].error.contains("collide"));
    }

    #[test]
    fn test_split_colliding_stems() {
        let files = vec![
            PathBuf::from("d/a.GWY"),
            PathBuf::from("d/a.gwy"),
            PathBuf::from("d/b.gwy"),
        ];
        let (unique, colliding) = split_colliding_stems(files);
        assert_eq!(unique, vec![PathBuf::from("d/a.GWY"), PathBuf::from("d/b.gwy")]);
        assert_eq!(colliding.len(), 1);
        assert_eq!(colliding[0].path, PathBuf::from("d/a.gwy"));
    }

    #[test]
    fn test_failure_messages_one_line_per_failure() {
        let temp_dir = TempDir::new().unwrap();
        write_scan(temp_dir.path(), "a.gwy");
        fs::write(temp_dir.path().join("broken.gwy"), b"not a gwy file").unwrap();
        let root = container(&[("ZSensor", datafield(2, 2, 1e-6, 1e-6, "m", vec![f64::NAN; 4]))]);
        fs::write(temp_dir.path().join("nan.gwy"), encode_file(&root)).unwrap();

        let report = plot_folder(
            temp_dir.path(),
            &temp_dir.path().join("out"),
            &fast_config(),
            &BatchOptions {
                dry_run: true,
                channels: None,
            },
        )
        .unwrap();

        let messages = report.failure_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("Error loading "));
        assert!(messages[0].contains("broken.gwy"));
        assert!(messages[1].starts_with("Error plotting "));
        assert!(messages[1].contains("[ZSensor]"));
    }

    #[test]
    fn test_plot_folder_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let result = plot_folder(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("out"),
            &fast_config(),
            &BatchOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_inspect_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_scan(temp_dir.path(), "a.gwy");

        let summary = inspect_file(&path).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].title, "ZSensor");
        assert_eq!((summary[0].xres, summary[0].yres), (16, 8));
        assert_eq!(summary[1].unit_z, "V");
        assert_eq!(summary[2].range, Some((0.0, 127.0)));

        assert!(inspect_file(&temp_dir.path().join("missing.gwy")).is_err());
    }
}
