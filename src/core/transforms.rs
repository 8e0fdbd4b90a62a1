//! Value scaling and sampling for channel data.
//!
//! These turn a raw [`DataField`] into display-ready values: physical units
//! are scaled to the plotted unit, heights are optionally shifted so the
//! lowest point is zero, and pixels are looked up nearest-neighbour.

use rayon::prelude::*;

use super::loaders::DataField;
use crate::config::ChannelStyle;

/// Channel values ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChannel {
    /// Scaled samples, row-major, first row at the top
    pub values: Vec<f64>,
    pub xres: usize,
    pub yres: usize,
    /// Physical width in meters
    pub xreal: f64,
    /// Physical height in meters
    pub yreal: f64,
    /// Smallest finite scaled value
    pub min: f64,
    /// Largest finite scaled value
    pub max: f64,
}

impl PreparedChannel {
    /// Normalized value in `[0, 1]` at pixel (`col`, `row`).
    #[inline]
    pub fn normalized(&self, col: usize, row: usize) -> f64 {
        normalize(self.values[row * self.xres + col], self.min, self.max)
    }
}

/// Multiply every sample by `factor`.
pub fn scale_values(data: &mut [f64], factor: f64) {
    if factor == 1.0 {
        return;
    }
    data.par_iter_mut().for_each(|v| *v *= factor);
}

/// Smallest and largest finite sample, or `None` if there is none.
pub fn value_range(data: &[f64]) -> Option<(f64, f64)> {
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Subtract the finite minimum so the lowest sample becomes zero.
pub fn shift_to_zero(data: &mut [f64]) {
    if let Some((min, _)) = value_range(data) {
        data.par_iter_mut().for_each(|v| *v -= min);
    }
}

/// Map `value` linearly from `[min, max]` onto `[0, 1]`.
///
/// A flat range maps everything to 0. Non-finite values stay NaN so the
/// colormap can flag them.
#[inline]
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return f64::NAN;
    }
    let span = max - min;
    if span <= 0.0 || !span.is_finite() {
        return 0.0;
    }
    ((value - min) / span).clamp(0.0, 1.0)
}

/// Source pixel for output pixel (`px`, `py`) when `xres` x `yres` samples
/// are stretched over `width` x `height` pixels. No interpolation.
#[inline]
pub fn sample_nearest(
    xres: usize,
    yres: usize,
    width: u32,
    height: u32,
    px: u32,
    py: u32,
) -> (usize, usize) {
    let col = ((px as f64 + 0.5) * xres as f64 / width.max(1) as f64) as usize;
    let row = ((py as f64 + 0.5) * yres as f64 / height.max(1) as f64) as usize;
    (col.min(xres - 1), row.min(yres - 1))
}

/// Apply a channel style to raw field data.
///
/// Returns `None` when the field has no finite samples.
pub fn prepare_channel(field: &DataField, style: &ChannelStyle) -> Option<PreparedChannel> {
    let mut values = field.data.clone();
    scale_values(&mut values, style.scale);

    if style.zero_min {
        shift_to_zero(&mut values);
    }

    let (min, max) = value_range(&values)?;

    Some(PreparedChannel {
        values,
        xres: field.xres,
        yres: field.yres,
        xreal: field.xreal,
        yreal: field.yreal,
        min,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::colormap::Colormap;

    fn field(data: Vec<f64>, xres: usize, yres: usize) -> DataField {
        DataField {
            xres,
            yres,
            xreal: 1e-6,
            yreal: 1e-6,
            xoff: 0.0,
            yoff: 0.0,
            unit_xy: "m".to_string(),
            unit_z: "m".to_string(),
            data,
        }
    }

    #[test]
    fn test_scale_values() {
        let mut data = vec![1e-9, 2e-9, -3e-9];
        scale_values(&mut data, 1e9);
        assert!((data[0] - 1.0).abs() < 1e-12);
        assert!((data[2] + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_value_range_skips_non_finite() {
        let data = vec![f64::NAN, 3.0, -1.0, f64::INFINITY, 2.0];
        assert_eq!(value_range(&data), Some((-1.0, 3.0)));
        assert_eq!(value_range(&[f64::NAN]), None);
        assert_eq!(value_range(&[]), None);
    }

    #[test]
    fn test_shift_to_zero() {
        let mut data = vec![5.0, 7.0, 6.0];
        shift_to_zero(&mut data);
        assert_eq!(data, vec![0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalize(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize(3.0, 3.0, 3.0), 0.0);
        assert!(normalize(f64::NAN, 0.0, 1.0).is_nan());
    }

    #[test]
    fn test_sample_nearest() {
        // 2x2 field stretched over 4x4 pixels
        assert_eq!(sample_nearest(2, 2, 4, 4, 0, 0), (0, 0));
        assert_eq!(sample_nearest(2, 2, 4, 4, 1, 1), (0, 0));
        assert_eq!(sample_nearest(2, 2, 4, 4, 2, 1), (1, 0));
        assert_eq!(sample_nearest(2, 2, 4, 4, 3, 3), (1, 1));
        // downsampling stays in bounds
        assert_eq!(sample_nearest(10, 10, 3, 3, 2, 2), (8, 8));
    }

    #[test]
    fn test_prepare_height_channel() {
        let style = ChannelStyle {
            zero_min: true,
            ..ChannelStyle::new(Colormap::Afmhot, 1e9, "Height [nm]")
        };
        let f = field(vec![2e-9, 4e-9, 3e-9, 10e-9], 2, 2);

        let prepared = prepare_channel(&f, &style).unwrap();
        assert!((prepared.min - 0.0).abs() < 1e-9);
        assert!((prepared.max - 8.0).abs() < 1e-9);
        assert!((prepared.normalized(1, 1) - 1.0).abs() < 1e-12);
        assert!((prepared.normalized(0, 0)).abs() < 1e-12);
    }

    #[test]
    fn test_prepare_without_shift() {
        let style = ChannelStyle::new(Colormap::Gray, 1e3, "Peak Force [mV]");
        let f = field(vec![0.001, 0.002], 2, 1);

        let prepared = prepare_channel(&f, &style).unwrap();
        assert!((prepared.min - 1.0).abs() < 1e-9);
        assert!((prepared.max - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_prepare_all_nan() {
        let style = ChannelStyle::new(Colormap::Gray, 1.0, "");
        let f = field(vec![f64::NAN; 4], 2, 2);
        assert!(prepare_channel(&f, &style).is_none());
    }
}
