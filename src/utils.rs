//! Utility functions shared across the codebase.
//!
//! Interpolation helpers used by settings blending and the transition
//! controller, plus the small string parsers shared by method and
//! provider options.

use anyhow::{Result, bail};
use regex::Regex;
use std::sync::OnceLock;

/// Interpolate between two u32 values based on progress (0.0 to 1.0).
///
/// # Arguments
/// * `start` - Starting value (returned when progress = 0.0)
/// * `end` - Ending value (returned when progress = 1.0)
/// * `progress` - Interpolation progress, automatically clamped to [0.0, 1.0]
///
/// # Returns
/// Interpolated value rounded to the nearest integer
///
/// # Examples
/// ```
/// use sunshift::utils::interpolate_u32;
/// assert_eq!(interpolate_u32(1000, 2000, 0.5), 1500);
/// assert_eq!(interpolate_u32(6000, 3000, 0.25), 5250);
/// ```
pub fn interpolate_u32(start: u32, end: u32, progress: f64) -> u32 {
    let result = interpolate_f64(start as f64, end as f64, progress);
    result.round() as u32
}

/// Interpolate between two f32 values based on progress (0.0 to 1.0).
///
/// # Examples
/// ```
/// use sunshift::utils::interpolate_f32;
/// assert_eq!(interpolate_f32(0.5, 1.0, 0.5), 0.75);
/// ```
pub fn interpolate_f32(start: f32, end: f32, progress: f64) -> f32 {
    interpolate_f64(start as f64, end as f64, progress) as f32
}

/// Interpolate between two f64 values based on progress (0.0 to 1.0).
pub fn interpolate_f64(start: f64, end: f64, progress: f64) -> f64 {
    let progress = progress.clamp(0.0, 1.0);
    start * (1.0 - progress) + end * progress
}

/// Parse a `key=value:key=value` option string as given after `-m NAME:`
/// or `-l NAME:`.
///
/// # Examples
/// ```
/// use sunshift::utils::parse_key_value_list;
/// let opts = parse_key_value_list("card=0:crtc=all").unwrap();
/// assert_eq!(opts, vec![("card".to_string(), "0".to_string()), ("crtc".to_string(), "all".to_string())]);
/// ```
pub fn parse_key_value_list(args: &str) -> Result<Vec<(String, String)>> {
    args.split(':')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => Ok((key.trim().to_string(), value.trim().to_string())),
            None => bail!("Failed to parse option `{}'", part),
        })
        .collect()
}

/// Parse a unit or partition index that may be the literal `all`.
///
/// Returns `None` for `all`, which selects every index.
pub fn parse_index_or_all(value: &str) -> Option<Option<usize>> {
    if value.eq_ignore_ascii_case("all") {
        return Some(None);
    }
    value.trim().parse::<usize>().ok().map(Some)
}

/// Parse a gamma value: either `R:G:B` or a single value for all channels.
pub fn parse_gamma(value: &str) -> Result<[f32; 3]> {
    let parts: Vec<&str> = value.split(':').collect();
    let parse = |s: &str| -> Result<f32> {
        match s.trim().parse::<f32>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => bail!("Malformed gamma setting `{}'", value),
        }
    };
    match parts.as_slice() {
        [all] => {
            let g = parse(all)?;
            Ok([g; 3])
        }
        [r, g, b] => Ok([parse(r)?, parse(g)?, parse(b)?]),
        _ => bail!("Malformed gamma setting `{}'", value),
    }
}

/// Recognize the `LAT:LON` shorthand for the manual location provider.
///
/// # Examples
/// ```
/// use sunshift::utils::parse_lat_lon_shorthand;
/// assert_eq!(parse_lat_lon_shorthand("55.7:12.6"), Some((55.7, 12.6)));
/// assert_eq!(parse_lat_lon_shorthand("manual:lat=1"), None);
/// ```
pub fn parse_lat_lon_shorthand(value: &str) -> Option<(f64, f64)> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*:\s*(-?\d+(?:\.\d+)?)\s*$").ok())
        .as_ref()?;
    let captures = re.captures(value)?;
    let lat = captures.get(1)?.as_str().parse().ok()?;
    let lon = captures.get(2)?.as_str().parse().ok()?;
    Some((lat, lon))
}

/// Parse a `0`/`1`/`true`/`false`/`yes`/`no` flag as accepted on the
/// command line and in method options.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
