//! Scale bar length selection and number formatting.

/// Bar lengths considered "round", in the chosen SI unit.
const PREFERRED_VALUES: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 25.0, 50.0, 75.0, 100.0, 125.0, 150.0, 200.0, 500.0, 750.0,
];

/// SI prefixes for lengths, ascending.
const SI_PREFIXES: &[(f64, &str)] = &[
    (1e-15, "f"),
    (1e-12, "p"),
    (1e-9, "n"),
    (1e-6, "µ"),
    (1e-3, "m"),
    (1.0, ""),
    (1e3, "k"),
];

/// A scale bar length with its display unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleLength {
    /// Length in `unit`, one of the preferred round values
    pub value: f64,
    /// Unit with SI prefix, e.g. `nm`
    pub unit: String,
    /// Length in meters
    pub meters: f64,
}

impl ScaleLength {
    pub fn label(&self) -> String {
        format!("{} {}", self.value, self.unit)
    }
}

/// Pick the longest round scale bar not exceeding `max_length_m`.
///
/// The unit prefix is chosen so the value lies in `[1, 1000)`. Returns
/// `None` for non-positive or non-finite input and for lengths below 1 fm.
pub fn nice_scale_length(max_length_m: f64) -> Option<ScaleLength> {
    if !(max_length_m.is_finite() && max_length_m > 0.0) {
        return None;
    }

    let &(factor, prefix) = SI_PREFIXES
        .iter()
        .rev()
        .find(|(factor, _)| max_length_m >= *factor * (1.0 - 1e-9))?;

    let in_unit = max_length_m / factor;
    let value = PREFERRED_VALUES
        .iter()
        .rev()
        .copied()
        .find(|&p| p <= in_unit * (1.0 + 1e-9))?;

    Some(ScaleLength {
        value,
        unit: format!("{}m", prefix),
        meters: value * factor,
    })
}

/// Format a number like C's `%.{sig}g`.
pub fn format_general(value: f64, sig: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let sig = sig.max(1);
    // Let the formatter do the rounding, then read back the exponent.
    let sci = format!("{:.*e}", sig - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= sig as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (sig as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
