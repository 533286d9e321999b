use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};

/// Round to two decimals, halves away from zero.
///
/// Magnitudes too large to scale by 100 have no fractional part and are
/// returned unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

/// Currency units to whole millions. Absent stays absent, zero stays zero.
pub fn to_millions(value: Option<f64>) -> Option<f64> {
    value.map(|v| (v / 1_000_000.0).round())
}

/// Per-share figures keep two decimals
pub fn per_share(value: Option<f64>) -> Option<f64> {
    value.map(round2)
}

/// Parse an `--as-of` date, defaulting to today in local time
pub fn resolve_as_of(as_of: Option<&str>) -> Result<NaiveDate> {
    match as_of {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow!("Invalid --as-of date {:?}: {}", raw, e)),
        None => Ok(Local::now().date_naive()),
    }
}
