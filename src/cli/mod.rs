//! Command-line interface for AFM batch plotting.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::writers::write_manifest_csv;
use crate::processors::batch::{inspect_file, plot_folder, BatchOptions};
use crate::PlotConfig;

#[derive(Parser)]
#[command(name = "afm-plot")]
#[command(about = "Batch plotting of Gwyddion-processed AFM scans", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Defaults to `plot` in the current directory
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plot every data file in a folder
    Plot {
        /// Folder containing the data files
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Output folder (defaults to <DIRECTORY>/<output_folder from config>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Data file extension
        #[arg(short, long)]
        extension: Option<String>,
        /// Only plot these channels (repeatable)
        #[arg(long = "channel")]
        channels: Vec<String>,
        /// Also plot channels without a configured style
        #[arg(long)]
        all_channels: bool,
        /// Preview outputs without writing images
        #[arg(long)]
        dry_run: bool,
        /// Write a CSV manifest of the images
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// List the channels of a data file
    Channels {
        /// Data file to inspect
        file: PathBuf,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination of the YAML file
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Plot {
            directory: PathBuf::from("."),
            output: None,
            extension: None,
            channels: Vec::new(),
            all_channels: false,
            dry_run: false,
            manifest: None,
        }
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn truncate_display(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let head: String = value.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        value.to_string()
    }
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        println!("║ {:<20}: {:<39} ║", key, truncate_display(value, 39));
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Output folder for a plot run.
fn resolve_output_dir(directory: &Path, output: Option<PathBuf>, config: &PlotConfig) -> PathBuf {
    output.unwrap_or_else(|| directory.join(&config.input.output_folder))
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(
    mut config: PlotConfig,
    extension: Option<String>,
    all_channels: bool,
) -> PlotConfig {
    if let Some(ext) = extension {
        config.input.extension = ext;
    }
    if all_channels {
        config.input.render_unconfigured = true;
    }
    config
}

fn load_config(path: Option<&Path>) -> PlotConfig {
    match path {
        Some(path) => match PlotConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PlotConfig::default()
            }
        },
        None => PlotConfig::default(),
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = load_config(cli.config.as_deref());

    match cli.command.unwrap_or_default() {
        Commands::Plot {
            directory,
            output,
            extension,
            channels,
            all_channels,
            dry_run,
            manifest,
        } => {
            let config = apply_overrides(config, extension, all_channels);
            let output_dir = resolve_output_dir(&directory, output, &config);
            let options = BatchOptions {
                dry_run,
                channels: if channels.is_empty() { None } else { Some(channels) },
            };
            cmd_plot(&directory, &output_dir, &options, manifest.as_deref(), &config);
        }
        Commands::Channels { file } => {
            cmd_channels(&file);
        }
        Commands::InitConfig { path, force } => {
            cmd_init_config(&path, force, &config);
        }
    }
}

fn cmd_plot(
    directory: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    manifest: Option<&Path>,
    config: &PlotConfig,
) {
    let start = Instant::now();

    if options.dry_run {
        println!("DRY RUN: No images will be written");
    }

    let spinner = create_spinner("Plotting data files...");
    let result = plot_folder(directory, output_dir, config, options);
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!("Plotting failed: {:#}", e);
            std::process::exit(1);
        }
    };

    if report.files_found == 0 {
        println!(
            "No .{} files found in the folder.",
            config.input.extension.trim_start_matches('.')
        );
        return;
    }

    if options.dry_run {
        for image in &report.images {
            println!("{} -> {}", image.source.display(), image.output.display());
        }
    }

    if let Some(path) = manifest {
        match write_manifest_csv(path, &report.images) {
            Ok(()) => info!("Wrote manifest {}", path.display()),
            Err(e) => error!("Failed to write manifest: {}", e),
        }
    }

    for message in report.failure_messages() {
        println!("{}", message);
    }

    print_summary(
        "Plotting Complete",
        &[
            ("Directory", directory.display().to_string()),
            ("Output folder", output_dir.display().to_string()),
            ("Files found", report.files_found.to_string()),
            ("Files failed", report.files_failed.len().to_string()),
            ("Images", report.images.len().to_string()),
            ("Channels skipped", report.skipped_channels.to_string()),
            ("Channel errors", report.channel_failures.len().to_string()),
            ("Dry run", options.dry_run.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_channels(file: &Path) {
    let channels = match inspect_file(file) {
        Ok(channels) => channels,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    println!("{}: {} channel(s)", file.display(), channels.len());
    for c in &channels {
        let range = c
            .range
            .map(|(lo, hi)| format!("{:.4e} .. {:.4e} {}", lo, hi, c.unit_z))
            .unwrap_or_else(|| "no data".to_string());
        println!(
            "  [{}] {:<24} {}x{} px, {:.3e} x {:.3e} m, {}",
            c.id, c.title, c.xres, c.yres, c.xreal, c.yreal, range
        );
    }
}

fn cmd_init_config(path: &Path, force: bool, config: &PlotConfig) {
    if path.exists() && !force {
        error!(
            "{} already exists, use --force to overwrite",
            path.display()
        );
        std::process::exit(1);
    }

    match config.to_yaml(path) {
        Ok(()) => println!("Wrote configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
