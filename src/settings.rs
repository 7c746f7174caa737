//! Program settings: layering, defaults, validation and blending.
//!
//! Settings arrive as [`SettingsOverlay`]s from the command line and from
//! the config file. The command line overlay is layered over the config
//! overlay, and [`Settings::finalize`] fills whatever is still unset with
//! built-in defaults.

use anyhow::{Result, bail};

use crate::constants::*;
use crate::logger::Log;
use crate::utils::{interpolate_f32, interpolate_f64, interpolate_u32};

/// What the program does once settings are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgramMode {
    /// Follow the sun until terminated.
    #[default]
    Continual,
    /// Apply the current values once and exit.
    OneShot,
    /// Apply a fixed temperature once and exit.
    Manual,
    /// Print the current values and exit without touching any display.
    Print,
    /// Put all units back to neutral and exit.
    Reset,
}

impl ProgramMode {
    /// Modes that compute values from the sun's position.
    pub fn needs_location(self) -> bool {
        matches!(
            self,
            ProgramMode::Continual | ProgramMode::OneShot | ProgramMode::Print
        )
    }
}

/// Partially specified settings. `None` means "not given here".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SettingsOverlay {
    pub temp_set: Option<u32>,
    pub temp_day: Option<u32>,
    pub temp_night: Option<u32>,
    pub brightness_day: Option<f32>,
    pub brightness_night: Option<f32>,
    pub transition: Option<bool>,
    pub transition_low: Option<f64>,
    pub transition_high: Option<f64>,
    pub reload_transition: Option<bool>,
    pub preserve_calibrations: Option<bool>,
}

impl SettingsOverlay {
    /// Keep every value set here and take the rest from `lower`.
    pub fn layer_over(self, lower: SettingsOverlay) -> SettingsOverlay {
        SettingsOverlay {
            temp_set: self.temp_set.or(lower.temp_set),
            temp_day: self.temp_day.or(lower.temp_day),
            temp_night: self.temp_night.or(lower.temp_night),
            brightness_day: self.brightness_day.or(lower.brightness_day),
            brightness_night: self.brightness_night.or(lower.brightness_night),
            transition: self.transition.or(lower.transition),
            transition_low: self.transition_low.or(lower.transition_low),
            transition_high: self.transition_high.or(lower.transition_high),
            reload_transition: self.reload_transition.or(lower.reload_transition),
            preserve_calibrations: self.preserve_calibrations.or(lower.preserve_calibrations),
        }
    }
}

/// Fully resolved program settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub temp_set: Option<u32>,
    pub temp_day: u32,
    pub temp_night: u32,
    pub brightness_day: f32,
    pub brightness_night: f32,
    pub transition: bool,
    pub transition_low: f64,
    pub transition_high: f64,
    pub reload_transition: bool,
    pub preserve_calibrations: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::finalize(SettingsOverlay::default())
    }
}

impl Settings {
    /// Fill every unset value with its default.
    pub fn finalize(overlay: SettingsOverlay) -> Self {
        Self {
            temp_set: overlay.temp_set,
            temp_day: overlay.temp_day.unwrap_or(DEFAULT_DAY_TEMP),
            temp_night: overlay.temp_night.unwrap_or(DEFAULT_NIGHT_TEMP),
            brightness_day: overlay.brightness_day.unwrap_or(DEFAULT_BRIGHTNESS),
            brightness_night: overlay.brightness_night.unwrap_or(DEFAULT_BRIGHTNESS),
            transition: overlay.transition.unwrap_or(DEFAULT_TRANSITION),
            transition_low: overlay.transition_low.unwrap_or(TRANSITION_LOW),
            transition_high: overlay.transition_high.unwrap_or(TRANSITION_HIGH),
            reload_transition: overlay.reload_transition.unwrap_or(DEFAULT_RELOAD_TRANSITION),
            preserve_calibrations: overlay
                .preserve_calibrations
                .unwrap_or(DEFAULT_PRESERVE_CALIBRATIONS),
        }
    }

    /// Check value ranges relevant for `mode`. Reports every problem at once.
    pub fn validate(&self, mode: ProgramMode) -> Result<()> {
        let temp_range = MIN_TEMP..=MAX_TEMP;
        let temp_message = format!("Temperature must be between {}K and {}K.", MIN_TEMP, MAX_TEMP);
        let mut problems: Vec<String> = Vec::new();

        match mode {
            ProgramMode::Manual => match self.temp_set {
                Some(t) if temp_range.contains(&t) => {}
                _ => problems.push(temp_message),
            },
            ProgramMode::Reset => {}
            _ => {
                if !temp_range.contains(&self.temp_day) || !temp_range.contains(&self.temp_night) {
                    problems.push(temp_message);
                }
                if self.transition_high < self.transition_low {
                    problems.push(
                        "High transition elevation cannot be lower than the low transition elevation."
                            .to_string(),
                    );
                }
            }
        }

        let brightness_range = MIN_BRIGHTNESS..=MAX_BRIGHTNESS;
        if !brightness_range.contains(&self.brightness_day)
            || !brightness_range.contains(&self.brightness_night)
        {
            problems.push(format!(
                "Brightness values must be between {:.1} and {:.1}.",
                MIN_BRIGHTNESS, MAX_BRIGHTNESS
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            bail!(problems.join("\n"))
        }
    }

    /// Blend numeric settings from `low` (weight 0) to `high` (weight 1).
    ///
    /// Flags are taken from `high`.
    pub fn interpolate(low: &Settings, high: &Settings, weight: f64) -> Settings {
        let temp_set = match (low.temp_set, high.temp_set) {
            (Some(a), Some(b)) => Some(interpolate_u32(a, b, weight)),
            (_, b) => b,
        };
        Settings {
            temp_set,
            temp_day: interpolate_u32(low.temp_day, high.temp_day, weight),
            temp_night: interpolate_u32(low.temp_night, high.temp_night, weight),
            brightness_day: interpolate_f32(low.brightness_day, high.brightness_day, weight),
            brightness_night: interpolate_f32(low.brightness_night, high.brightness_night, weight),
            transition_low: interpolate_f64(low.transition_low, high.transition_low, weight),
            transition_high: interpolate_f64(low.transition_high, high.transition_high, weight),
            ..*high
        }
    }

    /// Log the values a verbose run reports at startup and on reload.
    pub fn log_settings(&self) {
        Log::log_indented(&format!(
            "Temperatures: {}K at day, {}K at night",
            self.temp_day, self.temp_night
        ));
        Log::log_indented(&format!(
            "Solar elevations: day above {:.1}, night below {:.1}",
            self.transition_high, self.transition_low
        ));
        Log::log_indented(&format!(
            "Brightness: {:.2}:{:.2}",
            self.brightness_day, self.brightness_night
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_defaults() {
        let settings = Settings::finalize(SettingsOverlay::default());
        assert_eq!(settings.temp_day, DEFAULT_DAY_TEMP);
        assert_eq!(settings.temp_night, DEFAULT_NIGHT_TEMP);
        assert_eq!(settings.brightness_day, 1.0);
        assert!(settings.transition);
        assert!(settings.reload_transition);
        assert!(!settings.preserve_calibrations);
        assert_eq!(settings.transition_low, -6.0);
        assert_eq!(settings.transition_high, 3.0);
        assert_eq!(settings.temp_set, None);
    }

    #[test]
    fn test_layer_over_prefers_upper() {
        let cmdline = SettingsOverlay {
            temp_day: Some(6000),
            ..Default::default()
        };
        let config = SettingsOverlay {
            temp_day: Some(5000),
            temp_night: Some(3000),
            ..Default::default()
        };
        let merged = cmdline.layer_over(config);
        assert_eq!(merged.temp_day, Some(6000));
        assert_eq!(merged.temp_night, Some(3000));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Settings::default().validate(ProgramMode::Continual).is_ok());
        assert!(Settings::default().validate(ProgramMode::Reset).is_ok());
    }

    #[test]
    fn test_validate_manual_requires_temp_set() {
        let mut settings = Settings::default();
        assert!(settings.validate(ProgramMode::Manual).is_err());
        settings.temp_set = Some(4000);
        assert!(settings.validate(ProgramMode::Manual).is_ok());
        settings.temp_set = Some(500);
        assert!(settings.validate(ProgramMode::Manual).is_err());
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let settings = Settings {
            temp_day: 50000,
            brightness_night: 0.0,
            transition_low: 5.0,
            transition_high: 1.0,
            ..Settings::default()
        };
        let err = settings.validate(ProgramMode::Continual).unwrap_err().to_string();
        assert!(err.contains("Temperature must be between"));
        assert!(err.contains("High transition elevation"));
        assert!(err.contains("Brightness values"));
    }

    #[test]
    fn test_reset_ignores_temperatures() {
        let settings = Settings {
            temp_day: 1,
            ..Settings::default()
        };
        assert!(settings.validate(ProgramMode::Reset).is_ok());
    }

    #[test]
    fn test_interpolate_midpoint() {
        let low = Settings {
            temp_day: 6000,
            temp_night: 3000,
            brightness_day: 1.0,
            brightness_night: 0.5,
            ..Settings::default()
        };
        let high = Settings {
            temp_day: 5000,
            temp_night: 4000,
            brightness_day: 0.8,
            brightness_night: 0.7,
            transition: false,
            ..Settings::default()
        };

        let mid = Settings::interpolate(&low, &high, 0.5);
        assert_eq!(mid.temp_day, 5500);
        assert_eq!(mid.temp_night, 3500);
        assert!((mid.brightness_day - 0.9).abs() < 1e-6);
        assert!((mid.brightness_night - 0.6).abs() < 1e-6);
        assert!(!mid.transition);

        assert_eq!(Settings::interpolate(&low, &high, 0.0).temp_day, 6000);
        assert_eq!(Settings::interpolate(&low, &high, 1.0), high);
    }

    #[test]
    fn test_mode_location_requirements() {
        assert!(ProgramMode::Continual.needs_location());
        assert!(ProgramMode::Print.needs_location());
        assert!(!ProgramMode::Manual.needs_location());
        assert!(!ProgramMode::Reset.needs_location());
    }
}
