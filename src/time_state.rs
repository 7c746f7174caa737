//! Mapping from solar elevation to period of day and target values.
//!
//! Below the low elevation threshold it is night, at or above the high
//! threshold it is day, and in between values are blended linearly by how
//! far the sun has climbed from the low threshold toward the high one.

use crate::logger::Log;
use crate::settings::Settings;
use crate::utils::interpolate_f64;

/// Period of the day as announced to hooks.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Period {
    Day,
    Night,
    Twilight,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Night => "night",
            Period::Twilight => "twilight",
        }
    }
}

/// Where the sun is relative to the thresholds, with blend progress.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum TransitionState {
    Stable(Period),
    /// Between the thresholds. `progress` is the fraction of day (0..1).
    Transitioning { progress: f64 },
}

/// Fraction of daytime at `elevation`: 0 at or below the low threshold,
/// 1 at or above the high threshold.
///
/// # Examples
/// ```
/// use sunshift::settings::Settings;
/// use sunshift::time_state::day_fraction;
/// let settings = Settings::default(); // thresholds -6 and 3
/// assert_eq!(day_fraction(-1.5, &settings), 0.5);
/// assert_eq!(day_fraction(-10.0, &settings), 0.0);
/// ```
pub fn day_fraction(elevation: f64, settings: &Settings) -> f64 {
    let (low, high) = (settings.transition_low, settings.transition_high);
    if elevation < low {
        0.0
    } else if elevation < high {
        (low - elevation) / (low - high)
    } else {
        1.0
    }
}

/// Temperature for the current elevation, blended between night and day.
pub fn interpolated_temperature(elevation: f64, settings: &Settings) -> f64 {
    interpolate_f64(
        settings.temp_night as f64,
        settings.temp_day as f64,
        day_fraction(elevation, settings),
    )
}

/// Brightness for the current elevation, blended between night and day.
pub fn interpolated_brightness(elevation: f64, settings: &Settings) -> f64 {
    interpolate_f64(
        settings.brightness_night as f64,
        settings.brightness_day as f64,
        day_fraction(elevation, settings),
    )
}

/// Period used for hooks. The thresholds themselves count as day or night.
pub fn classify_period(elevation: f64, settings: &Settings) -> Period {
    if elevation >= settings.transition_high {
        Period::Day
    } else if elevation <= settings.transition_low {
        Period::Night
    } else {
        Period::Twilight
    }
}

pub fn get_transition_state(elevation: f64, settings: &Settings) -> TransitionState {
    if elevation < settings.transition_low {
        TransitionState::Stable(Period::Night)
    } else if elevation < settings.transition_high {
        TransitionState::Transitioning {
            progress: day_fraction(elevation, settings),
        }
    } else {
        TransitionState::Stable(Period::Day)
    }
}

/// Human readable period, e.g. `Transition (42.00% day)`.
pub fn describe_period(elevation: f64, settings: &Settings) -> String {
    match get_transition_state(elevation, settings) {
        TransitionState::Stable(Period::Night) => "Night".to_string(),
        TransitionState::Transitioning { progress } => {
            format!("Transition ({:.2}% day)", progress * 100.0)
        }
        TransitionState::Stable(_) => "Daytime".to_string(),
    }
}

/// Announcement logged when a new period begins.
pub fn get_period_message(period: Period) -> &'static str {
    match period {
        Period::Day => "Entering day mode",
        Period::Night => "Entering night mode",
        Period::Twilight => "Entering twilight",
    }
}

pub fn log_period_announcement(period: Period) {
    Log::log_block_start(get_period_message(period));
}
