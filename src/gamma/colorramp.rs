//! Ramp fill: computes a unit's ramps from its settings.
//!
//! The white point for a temperature comes from a blackbody curve fit,
//! normalised so that [`NEUTRAL_TEMP`] yields exactly (1, 1, 1). Each
//! sample is scaled by white point and brightness, then gamma corrected.

use super::ramps::Ramps;
use super::selection::UnitSettings;
use crate::constants::{MAX_TEMP, MIN_TEMP, NEUTRAL_TEMP};

/// Unnormalised RGB (0-255) of a blackbody at `temperature` Kelvin.
fn blackbody_rgb(temperature: f64) -> [f64; 3] {
    let t = temperature.clamp(MIN_TEMP as f64, MAX_TEMP as f64) / 100.0;

    if t >= 66.0 {
        let red = 329.698727446 * (t - 60.0).powf(-0.1332047592);
        let green = 288.1221695283 * (t - 60.0).powf(-0.0755148492);
        [red, green, 255.0]
    } else {
        let green = 99.4708025861 * t.ln() - 161.1195681661;
        let blue = if t > 19.0 {
            138.5177312231 * (t - 10.0).ln() - 305.0447927307
        } else {
            0.0
        };
        [255.0, green, blue]
    }
}

/// Channel multipliers in [0, 1] for a color temperature.
///
/// # Examples
/// ```
/// use sunshift::gamma::colorramp::whitepoint;
/// let [r, g, b] = whitepoint(6500.0);
/// assert!((r - 1.0).abs() < 1e-9 && (g - 1.0).abs() < 1e-9 && (b - 1.0).abs() < 1e-9);
/// ```
pub fn whitepoint(temperature: f32) -> [f64; 3] {
    let neutral = blackbody_rgb(NEUTRAL_TEMP as f64);
    let raw = blackbody_rgb(temperature as f64);
    [0, 1, 2].map(|c| (raw[c] / neutral[c]).clamp(0.0, 1.0))
}

/// Fill `ramps` from `settings`.
///
/// With `base` the adjustment is applied on top of those ramps (e.g. a
/// calibration captured at open time); otherwise on top of identity.
/// `base` must have the same layout as `ramps`.
pub fn fill(ramps: &mut Ramps, base: Option<&Ramps>, settings: &UnitSettings) {
    let white = whitepoint(settings.temperature);
    let brightness = settings.brightness as f64;
    let base_channels = base
        .filter(|b| b.same_layout(ramps))
        .map(|b| [b.red(), b.green(), b.blue()]);

    let (red, green, blue) = ramps.channels_mut();
    for (c, channel) in [red, green, blue].into_iter().enumerate() {
        let len = channel.len();
        let gamma = settings.gamma[c] as f64;
        for (i, sample) in channel.iter_mut().enumerate() {
            let input = match base_channels {
                Some(base) => base[c][i] as f64 / u16::MAX as f64,
                None if len > 1 => i as f64 / (len - 1) as f64,
                None => 1.0,
            };
            let value = (input * white[c] * brightness).powf(1.0 / gamma);
            *sample = (value * u16::MAX as f64).round().clamp(0.0, u16::MAX as f64) as u16;
        }
    }
}
