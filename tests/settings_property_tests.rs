//! Property tests for settings blending, elevation interpolation and value
//! clamping.

use proptest::prelude::*;
use sunshift::constants::*;
use sunshift::gamma::UnitSettings;
use sunshift::settings::{Settings, SettingsOverlay};
use sunshift::time_state::{day_fraction, interpolated_temperature};

fn temperature_strategy() -> impl Strategy<Value = u32> {
    MIN_TEMP..=MAX_TEMP
}

fn threshold_strategy() -> impl Strategy<Value = (f64, f64)> {
    (-18.0f64..0.0, 0.0f64..10.0)
}

fn settings_with(day: u32, night: u32, (low, high): (f64, f64)) -> Settings {
    Settings {
        temp_day: day,
        temp_night: night,
        transition_low: low,
        transition_high: high,
        ..Settings::default()
    }
}

proptest! {
    /// The day fraction stays in [0, 1] and never decreases as the sun rises.
    #[test]
    fn test_day_fraction_is_bounded_and_monotonic(
        thresholds in threshold_strategy(),
        a in -90.0f64..90.0,
        b in -90.0f64..90.0,
    ) {
        let settings = settings_with(DEFAULT_DAY_TEMP, DEFAULT_NIGHT_TEMP, thresholds);
        let (lower, higher) = if a <= b { (a, b) } else { (b, a) };
        let f_lower = day_fraction(lower, &settings);
        let f_higher = day_fraction(higher, &settings);

        prop_assert!((0.0..=1.0).contains(&f_lower));
        prop_assert!((0.0..=1.0).contains(&f_higher));
        prop_assert!(f_lower <= f_higher + 1e-12);
    }

    /// Temperatures between the thresholds lie between night and day values.
    #[test]
    fn test_interpolated_temperature_within_endpoints(
        day in temperature_strategy(),
        night in temperature_strategy(),
        thresholds in threshold_strategy(),
        elevation in -90.0f64..90.0,
    ) {
        let settings = settings_with(day, night, thresholds);
        let temp = interpolated_temperature(elevation, &settings);
        let (min, max) = (day.min(night) as f64, day.max(night) as f64);
        prop_assert!(temp >= min - 1e-6 && temp <= max + 1e-6);
    }

    /// The endpoints of a reload blend are the old and the new settings.
    #[test]
    fn test_settings_interpolation_endpoints(
        day_a in temperature_strategy(),
        night_a in temperature_strategy(),
        day_b in temperature_strategy(),
        night_b in temperature_strategy(),
        weight in 0.0f64..=1.0,
    ) {
        let low = settings_with(day_a, night_a, (TRANSITION_LOW, TRANSITION_HIGH));
        let high = settings_with(day_b, night_b, (TRANSITION_LOW, TRANSITION_HIGH));

        prop_assert_eq!(Settings::interpolate(&low, &high, 0.0).temp_day, day_a);
        prop_assert_eq!(Settings::interpolate(&low, &high, 1.0).temp_night, night_b);

        let mid = Settings::interpolate(&low, &high, weight);
        prop_assert!(mid.temp_day >= day_a.min(day_b) && mid.temp_day <= day_a.max(day_b));
    }

    /// Whatever is written, unit settings stay inside their limits.
    #[test]
    fn test_unit_settings_are_clamped(
        temperature in -1.0e6f32..1.0e6,
        brightness in -10.0f32..10.0,
        gamma in -10.0f32..100.0,
    ) {
        let mut settings = UnitSettings::default();
        settings.set_temperature(temperature);
        settings.set_brightness(brightness);
        settings.set_gamma([gamma; 3]);

        prop_assert!(settings.temperature >= MIN_TEMP as f32);
        prop_assert!(settings.temperature <= MAX_TEMP as f32);
        prop_assert!((MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&settings.brightness));
        prop_assert!(settings.gamma.iter().all(|g| *g >= MIN_GAMMA));
        if let Some(max) = MAX_GAMMA {
            prop_assert!(settings.gamma.iter().all(|g| *g <= max));
        }
    }

    /// An upper overlay value always wins; gaps are filled from below.
    #[test]
    fn test_layer_over_precedence(
        upper in proptest::option::of(temperature_strategy()),
        lower in proptest::option::of(temperature_strategy()),
    ) {
        let upper_overlay = SettingsOverlay { temp_day: upper, ..Default::default() };
        let lower_overlay = SettingsOverlay { temp_day: lower, ..Default::default() };
        let merged = upper_overlay.layer_over(lower_overlay);
        prop_assert_eq!(merged.temp_day, upper.or(lower));
    }
}

#[test]
fn test_midpoint_example() {
    let settings = settings_with(5500, 3700, (-6.0, 3.0));
    assert_eq!(interpolated_temperature(-1.5, &settings), 4600.0);
    assert_eq!(interpolated_temperature(-6.0, &settings), 3700.0);
    assert_eq!(interpolated_temperature(3.0, &settings), 5500.0);
}
