//! Colormaps for false-colour rendering of channel data.

use std::fmt;
use std::str::FromStr;

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

/// Colour used for samples that are NaN or infinite.
pub const BAD_COLOR: RGBColor = RGBColor(0, 0, 0);

/// Supported colormaps, named as in matplotlib.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Black-red-yellow-white, the usual AFM height map.
    Afmhot,
    #[default]
    Gray,
    Inferno,
    Viridis,
}

// Nine evenly spaced samples (t = k/8) of matplotlib's 256-entry tables,
// linearly interpolated in between. This approximates the full maps to
// within a few units per channel.
const INFERNO: &[(u8, u8, u8)] = &[
    (0, 0, 4),
    (31, 12, 72),
    (85, 15, 109),
    (136, 34, 106),
    (186, 54, 85),
    (227, 89, 51),
    (249, 140, 10),
    (249, 201, 50),
    (252, 255, 164),
];

const VIRIDIS: &[(u8, u8, u8)] = &[
    (68, 1, 84),
    (71, 45, 123),
    (59, 82, 139),
    (44, 114, 142),
    (33, 144, 140),
    (39, 173, 129),
    (93, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];

#[inline]
fn channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn interpolate(stops: &[(u8, u8, u8)], t: f64) -> RGBColor {
    let last = stops.len() - 1;
    let pos = t * last as f64;
    let i = (pos.floor() as usize).min(last - 1);
    let frac = pos - i as f64;

    let (r0, g0, b0) = stops[i];
    let (r1, g1, b1) = stops[i + 1];
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;

    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

impl Colormap {
    /// Colour for a normalized value `t` in `[0, 1]`. Out-of-range values
    /// are clamped; NaN maps to [`BAD_COLOR`].
    ///
    /// `Inferno` and `Viridis` are piecewise-linear approximations of the
    /// matplotlib lookup tables.
    pub fn map(self, t: f64) -> RGBColor {
        if t.is_nan() {
            return BAD_COLOR;
        }
        let t = t.clamp(0.0, 1.0);

        match self {
            Colormap::Afmhot => RGBColor(
                channel(2.0 * t),
                channel(2.0 * t - 0.5),
                channel(2.0 * t - 1.0),
            ),
            Colormap::Gray => {
                let v = channel(t);
                RGBColor(v, v, v)
            }
            Colormap::Inferno => interpolate(INFERNO, t),
            Colormap::Viridis => interpolate(VIRIDIS, t),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Colormap::Afmhot => "afmhot",
            Colormap::Gray => "gray",
            Colormap::Inferno => "inferno",
            Colormap::Viridis => "viridis",
        }
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "afmhot" => Ok(Colormap::Afmhot),
            "gray" | "grey" => Ok(Colormap::Gray),
            "inferno" => Ok(Colormap::Inferno),
            "viridis" => Ok(Colormap::Viridis),
            other => Err(format!("unknown colormap '{}'", other)),
        }
    }
}
