//! Configuration types for AFM batch plotting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::visualization::colormap::Colormap;

/// How a single channel is scaled, coloured and labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStyle {
    /// Colormap used for the image and colorbar
    #[serde(default)]
    pub colormap: Colormap,

    /// Factor applied to raw values before plotting (e.g. 1e9 for m -> nm)
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Colorbar label
    #[serde(default)]
    pub label: String,

    /// Shift values so the lowest sample is zero
    #[serde(default)]
    pub zero_min: bool,
}

fn default_scale() -> f64 {
    1.0
}

impl ChannelStyle {
    pub fn new(colormap: Colormap, scale: f64, label: &str) -> Self {
        Self {
            colormap,
            scale,
            label: label.to_string(),
            zero_min: false,
        }
    }

    /// Style used for channels without an explicit entry.
    pub fn fallback(unit: &str) -> Self {
        let label = if unit.is_empty() {
            String::new()
        } else {
            format!("[{}]", unit)
        };
        Self {
            colormap: Colormap::Gray,
            scale: 1.0,
            label,
            zero_min: false,
        }
    }
}

fn default_channels() -> HashMap<String, ChannelStyle> {
    let mut channels = HashMap::new();
    channels.insert(
        "ZSensor".to_string(),
        ChannelStyle {
            zero_min: true,
            ..ChannelStyle::new(Colormap::Afmhot, 1e9, "Height [nm]")
        },
    );
    channels.insert(
        "Peak Force Error".to_string(),
        ChannelStyle::new(Colormap::Gray, 1e3, "Peak Force [mV]"),
    );
    // KPFM surface potential
    channels.insert(
        "Potential".to_string(),
        ChannelStyle::new(Colormap::Inferno, 1.0, "Potential [V]"),
    );
    channels
}

/// Where input files are found and outputs go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Extension of data files to plot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Output sub-folder created inside the input directory
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Also plot channels that have no entry in `channels`
    #[serde(default)]
    pub render_unconfigured: bool,
}

fn default_extension() -> String {
    "gwy".to_string()
}

fn default_output_folder() -> String {
    "processed_images".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            output_folder: default_output_folder(),
            render_unconfigured: false,
        }
    }
}

/// Output image geometry and text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureConfig {
    /// Longest side of the image panel in pixels
    #[serde(default = "default_map_size")]
    pub map_size: u32,

    /// Dots per inch, used to convert the font size to pixels
    #[serde(default = "default_dpi")]
    pub dpi: f64,

    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: f64,

    /// TrueType font for labels; system fonts are searched when unset or
    /// unreadable. The font is registered process-wide, so the path of the
    /// most recent render applies to every image drawn after it.
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// Draw colorbar labels and the scale bar text
    #[serde(default = "default_true")]
    pub annotations: bool,
}

fn default_map_size() -> u32 {
    1500
}

fn default_dpi() -> f64 {
    300.0
}

fn default_font_size() -> f64 {
    12.0
}

fn default_true() -> bool {
    true
}

impl FigureConfig {
    /// Font height in pixels.
    pub fn font_px(&self) -> f64 {
        (self.font_size * self.dpi / 72.0).max(1.0)
    }
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            map_size: default_map_size(),
            dpi: default_dpi(),
            font_size: default_font_size(),
            font_path: None,
            annotations: true,
        }
    }
}

/// Colorbar placement, relative to the image panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorbarConfig {
    /// Colorbar height as a fraction of the image height
    #[serde(default = "default_shrink")]
    pub shrink: f64,

    /// Height to width ratio of the colorbar
    #[serde(default = "default_aspect")]
    pub aspect: f64,

    /// Gap to the image as a fraction of the image width
    #[serde(default = "default_pad")]
    pub pad: f64,

    /// Distance of the min/max labels as a fraction of the colorbar height
    #[serde(default = "default_label_sep")]
    pub label_sep: f64,
}

fn default_shrink() -> f64 {
    0.5
}

fn default_aspect() -> f64 {
    12.0
}

fn default_pad() -> f64 {
    0.03
}

fn default_label_sep() -> f64 {
    0.07
}

impl Default for ColorbarConfig {
    fn default() -> Self {
        Self {
            shrink: default_shrink(),
            aspect: default_aspect(),
            pad: default_pad(),
            label_sep: default_label_sep(),
        }
    }
}

/// Scale bar drawn in the lower left corner of the image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalebarConfig {
    /// Maximum bar length as a fraction of the image width
    #[serde(default = "default_length_fraction")]
    pub length_fraction: f64,

    /// Distance from the image border in font heights
    #[serde(default = "default_border_pad")]
    pub border_pad: f64,

    /// Bar thickness as a fraction of the image height
    #[serde(default = "default_width_fraction")]
    pub width_fraction: f64,

    /// RGB colour of bar and label
    #[serde(default = "default_scalebar_color")]
    pub color: [u8; 3],
}

fn default_length_fraction() -> f64 {
    0.3
}

fn default_border_pad() -> f64 {
    1.5
}

fn default_width_fraction() -> f64 {
    0.012
}

fn default_scalebar_color() -> [u8; 3] {
    [255, 255, 255]
}

impl Default for ScalebarConfig {
    fn default() -> Self {
        Self {
            length_fraction: default_length_fraction(),
            border_pad: default_border_pad(),
            width_fraction: default_width_fraction(),
            color: default_scalebar_color(),
        }
    }
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default)]
    pub input: InputConfig,

    /// Channel title -> style. Channels not listed are skipped.
    #[serde(default = "default_channels")]
    pub channels: HashMap<String, ChannelStyle>,

    #[serde(default)]
    pub figure: FigureConfig,

    #[serde(default)]
    pub colorbar: ColorbarConfig,

    #[serde(default)]
    pub scalebar: ScalebarConfig,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            channels: default_channels(),
            figure: FigureConfig::default(),
            colorbar: ColorbarConfig::default(),
            scalebar: ScalebarConfig::default(),
        }
    }
}

impl PlotConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PlotConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Style for a channel, honouring `render_unconfigured`.
    pub fn style_for(&self, title: &str, unit: &str) -> Option<ChannelStyle> {
        match self.channels.get(title) {
            Some(style) => Some(style.clone()),
            None if self.input.render_unconfigured => Some(ChannelStyle::fallback(unit)),
            None => None,
        }
    }
}
