//! Rendering of AFM channels to PNG images.
//!
//! Each image shows the channel as a false-colour map with its physical
//! aspect ratio, a colorbar with the value range printed at its ends and the
//! channel label alongside, and a scale bar in the lower left corner. Axes
//! are not drawn.

pub mod colormap;
pub mod fonts;
pub mod scalebar;

use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use plotters_bitmap::BitMapBackend;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ChannelStyle, PlotConfig};
use crate::core::transforms::{sample_nearest, PreparedChannel};
use colormap::Colormap;
use scalebar::{format_general, nice_scale_length};

pub use scalebar::ScaleLength;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Channel has no data")]
    EmptyChannel,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Significant digits of the colorbar min/max labels.
const RANGE_LABEL_DIGITS: usize = 3;

/// Horizontal offset of the channel label, in colorbar widths.
const LABEL_OFFSET: f64 = 2.25;

/// Pixel rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    #[inline]
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }
}

/// Placement of all figure elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub map: Rect,
    pub colorbar: Rect,
    /// Center x of the rotated channel label
    pub label_x: i32,
    pub font_px: f64,
}

/// Summary of a rendered image.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotInfo {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Value at the bottom of the colorbar
    pub min: f64,
    /// Value at the top of the colorbar
    pub max: f64,
    /// Scale bar label, if a bar was drawn
    pub scale_bar: Option<String>,
}

/// Rough text width, used only to reserve canvas space.
fn approx_text_width(text: &str, font_px: f64) -> f64 {
    text.chars().count() as f64 * font_px * 0.6
}

/// Compute the canvas layout for a channel.
pub fn compute_layout(channel: &PreparedChannel, config: &PlotConfig, annotate: bool) -> Layout {
    let figure = &config.figure;
    let cbar = &config.colorbar;
    let font_px = figure.font_px();
    let margin = (font_px * 0.5).round();

    let map_size = figure.map_size.max(2) as f64;
    let aspect = channel.xreal / channel.yreal;
    let (map_w, map_h) = if aspect >= 1.0 {
        (map_size, (map_size / aspect).round().max(1.0))
    } else {
        ((map_size * aspect).round().max(1.0), map_size)
    };

    let cb_h = (cbar.shrink.clamp(0.05, 1.0) * map_h).round().max(1.0);
    let cb_w = (cb_h / cbar.aspect.max(1.0)).round().max(1.0);
    let cb_gap = (cbar.pad.max(0.0) * map_w).round();

    // Min/max labels may stick out above and below a tall colorbar.
    let overhang = if annotate {
        (cbar.label_sep * cb_h + font_px * 0.6 - (map_h - cb_h) / 2.0).max(0.0)
    } else {
        0.0
    };
    let top = margin + overhang;

    let map = Rect {
        x: margin as i32,
        y: top as i32,
        width: map_w as u32,
        height: map_h as u32,
    };
    let colorbar = Rect {
        x: (margin + map_w + cb_gap) as i32,
        y: (top + (map_h - cb_h) / 2.0).round() as i32,
        width: cb_w as u32,
        height: cb_h as u32,
    };

    let label_x = (colorbar.x as f64 + LABEL_OFFSET * cb_w).round() as i32;
    let right = if annotate {
        let label_right = label_x as f64 + font_px * 0.7;
        let range_w = [channel.min, channel.max]
            .iter()
            .map(|v| approx_text_width(&format_general(*v, RANGE_LABEL_DIGITS), font_px))
            .fold(0.0, f64::max);
        label_right.max(colorbar.x as f64 + cb_w / 2.0 + range_w / 2.0)
    } else {
        colorbar.right() as f64
    };

    Layout {
        width: (right + margin).ceil() as u32,
        height: (top + map_h + overhang + margin).ceil() as u32,
        map,
        colorbar,
        label_x,
        font_px,
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Colour of every map pixel, row by row.
fn map_pixels(channel: &PreparedChannel, cmap: Colormap, map: Rect) -> Vec<Vec<RGBColor>> {
    let columns: Vec<u32> = (0..map.width).collect();
    (0..map.height)
        .into_par_iter()
        .map(|py| {
            columns
                .iter()
                .map(|&px| {
                    let (col, row) =
                        sample_nearest(channel.xres, channel.yres, map.width, map.height, px, py);
                    cmap.map(channel.normalized(col, row))
                })
                .collect()
        })
        .collect()
}

/// Colorbar colour of each row, top row (maximum) first.
fn colorbar_pixels(cmap: Colormap, height: u32) -> Vec<RGBColor> {
    (0..height)
        .map(|py| cmap.map(1.0 - (py as f64 + 0.5) / height as f64))
        .collect()
}

/// Render a prepared channel as a PNG image.
///
/// # Arguments
///
/// * `output_path` - Path of the PNG to write (parent directories are created)
/// * `channel` - Scaled channel values
/// * `style` - Colormap and label of the channel
/// * `config` - Figure, colorbar and scale bar settings
///
/// # Errors
///
/// Returns an error if the channel is empty or the image cannot be written.
pub fn plot_channel(
    output_path: &Path,
    channel: &PreparedChannel,
    style: &ChannelStyle,
    config: &PlotConfig,
) -> Result<PlotInfo> {
    if channel.values.is_empty() || channel.xres == 0 || channel.yres == 0 {
        return Err(VisualizationError::EmptyChannel);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let annotate =
        config.figure.annotations && fonts::ensure_font(config.figure.font_path.as_deref());
    let layout = compute_layout(channel, config, annotate);
    let map = layout.map;
    let cb = layout.colorbar;

    let root = BitMapBackend::new(output_path, (layout.width, layout.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    // Image
    for (py, row) in map_pixels(channel, style.colormap, map).iter().enumerate() {
        for (px, color) in row.iter().enumerate() {
            root.draw_pixel((map.x + px as i32, map.y + py as i32), color)
                .map_err(plot_err)?;
        }
    }

    // Colorbar, max at the top
    for (py, color) in colorbar_pixels(style.colormap, cb.height).iter().enumerate() {
        for px in 0..cb.width {
            root.draw_pixel((cb.x + px as i32, cb.y + py as i32), color)
                .map_err(plot_err)?;
        }
    }

    let scale_bar = draw_scale_bar(&root, channel, config, &layout, annotate)?;

    if annotate {
        let font = (fonts::FONT_FAMILY, layout.font_px).into_font();
        let centered = TextStyle::from(font)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let sep = (config.colorbar.label_sep * cb.height as f64).round() as i32;
        let (cb_cx, cb_cy) = cb.center();

        root.draw_text(
            &format_general(channel.min, RANGE_LABEL_DIGITS),
            &centered,
            (cb_cx, cb.bottom() + sep),
        )
        .map_err(plot_err)?;
        root.draw_text(
            &format_general(channel.max, RANGE_LABEL_DIGITS),
            &centered,
            (cb_cx, cb.y - sep),
        )
        .map_err(plot_err)?;

        if !style.label.is_empty() {
            let rotated = centered.transform(FontTransform::Rotate90);
            root.draw_text(&style.label, &rotated, (layout.label_x, cb_cy))
                .map_err(plot_err)?;
        }
    }

    root.present().map_err(plot_err)?;

    Ok(PlotInfo {
        output: output_path.to_path_buf(),
        width: layout.width,
        height: layout.height,
        min: channel.min,
        max: channel.max,
        scale_bar,
    })
}

/// Draw the scale bar and return its label.
fn draw_scale_bar<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    channel: &PreparedChannel,
    config: &PlotConfig,
    layout: &Layout,
    annotate: bool,
) -> Result<Option<String>> {
    let sb = &config.scalebar;
    let map = layout.map;
    let Some(length) = nice_scale_length(sb.length_fraction * channel.xreal) else {
        return Ok(None);
    };

    let bar_w = (length.meters / channel.xreal * map.width as f64).round().max(1.0) as i32;
    let bar_h = (sb.width_fraction * map.height as f64).round().max(1.0) as i32;
    let pad = (sb.border_pad * layout.font_px)
        .min(map.width as f64 / 10.0)
        .min(map.height as f64 / 10.0)
        .round() as i32;

    let x0 = map.x + pad;
    let y1 = map.bottom() - pad;
    let y0 = y1 - bar_h;
    let [r, g, b] = sb.color;
    let color = RGBColor(r, g, b);

    root.draw(&Rectangle::new([(x0, y0), (x0 + bar_w, y1)], color.filled()))
        .map_err(plot_err)?;

    let label = length.label();
    if annotate {
        let style = TextStyle::from((fonts::FONT_FAMILY, layout.font_px).into_font())
            .color(&color)
            .pos(Pos::new(HPos::Center, VPos::Bottom));
        let gap = (layout.font_px * 0.2).round() as i32;
        root.draw_text(&label, &style, (x0 + bar_w / 2, y0 - gap))
            .map_err(plot_err)?;
    }

    Ok(Some(label))
}
