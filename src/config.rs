//! Configuration file loading for sunshift.
//!
//! The config is a TOML file, by default at
//! `$XDG_CONFIG_HOME/sunshift/sunshift.toml`. A missing default file is
//! fine and yields built-in defaults.
//!
//! ```toml
//! [sunshift]
//! temp-day = 5500
//! temp-night = 3500
//! brightness-night = 0.8
//! elevation-low = -6.0
//! adjustment-method = "drm"
//! location-provider = "manual"
//!
//! [manual]
//! lat = 55.7
//! lon = 12.6
//!
//! [hooks]
//! night = "notify-send 'Good night'"
//!
//! # One table per selection, applied in order
//! [[drm]]
//! card = 0
//! crtc = 1
//! gamma = "0.9:0.9:1.0"
//! ```
//!
//! Every top-level table other than `sunshift` and `hooks` is kept as a
//! raw section. Method and provider option tables are looked up by name.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logger::Log;
use crate::settings::{ProgramMode, SettingsOverlay};
use crate::utils::parse_gamma;

/// A gamma value given either as a number or as `"R:G:B"`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum GammaSetting {
    Uniform(f32),
    Channels(String),
}

impl GammaSetting {
    /// The value in the `R:G:B` form method options expect.
    pub fn as_option_value(&self) -> String {
        match self {
            GammaSetting::Uniform(g) => g.to_string(),
            GammaSetting::Channels(s) => s.clone(),
        }
    }
}

/// The `[sunshift]` section.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GeneralSection {
    pub temp_day: Option<u32>,
    pub temp_night: Option<u32>,
    pub transition: Option<bool>,
    pub reload_transition: Option<bool>,
    pub brightness: Option<f32>,
    pub brightness_day: Option<f32>,
    pub brightness_night: Option<f32>,
    pub elevation_high: Option<f64>,
    pub elevation_low: Option<f64>,
    pub preserve_calibrations: Option<bool>,
    pub gamma: Option<GammaSetting>,
    pub adjustment_method: Option<String>,
    pub location_provider: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sunshift: GeneralSection,
    #[serde(default)]
    pub hooks: BTreeMap<String, String>,
    /// Method and provider sections, keyed by their name.
    #[serde(flatten)]
    pub sections: BTreeMap<String, toml::Value>,
}

/// Key/value options of one config section, stringified.
pub type OptionList = Vec<(String, String)>;

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("sunshift").join("sunshift.toml"))
    }

    /// Load the config named on the command line, or the default one.
    ///
    /// An explicitly named file must exist; the default file may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => {
                let path = Self::get_config_path()?;
                if path.exists() {
                    Self::load_from_path(&path)
                } else {
                    Log::log_debug(&format!(
                        "No config file at {}, using defaults",
                        path.display()
                    ));
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "Configuration file not found at specified path: {}",
                path.display()
            );
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        config.validate_fields()?;
        Ok(config)
    }

    fn validate_fields(&self) -> Result<()> {
        if let Some(gamma) = &self.sunshift.gamma {
            parse_gamma(&gamma.as_option_value())?;
        }
        Ok(())
    }

    /// Settings given in the `[sunshift]` section.
    ///
    /// `brightness` sets both day and night unless the specific key is
    /// present. `preserve-calibrations` only applies in continual mode.
    pub fn settings_overlay(&self, mode: ProgramMode) -> SettingsOverlay {
        let general = &self.sunshift;
        SettingsOverlay {
            temp_set: None,
            temp_day: general.temp_day,
            temp_night: general.temp_night,
            brightness_day: general.brightness_day.or(general.brightness),
            brightness_night: general.brightness_night.or(general.brightness),
            transition: general.transition,
            transition_low: general.elevation_low,
            transition_high: general.elevation_high,
            reload_transition: general.reload_transition,
            preserve_calibrations: general
                .preserve_calibrations
                .filter(|_| mode == ProgramMode::Continual),
        }
    }

    /// Option lists for a method: one per `[[name]]` table, in file order.
    pub fn method_sections(&self, name: &str) -> Result<Vec<OptionList>> {
        match self.sections.get(name) {
            None => Ok(Vec::new()),
            Some(toml::Value::Table(table)) => Ok(vec![table_options(name, table)?]),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    toml::Value::Table(table) => table_options(name, table),
                    _ => bail!("Section `{}' must contain tables", name),
                })
                .collect(),
            Some(_) => bail!("Section `{}' must be a table", name),
        }
    }

    /// Options for a location provider from its `[name]` table.
    pub fn provider_section(&self, name: &str) -> Result<OptionList> {
        match self.sections.get(name) {
            None => Ok(Vec::new()),
            Some(toml::Value::Table(table)) => table_options(name, table),
            Some(_) => bail!("Section `{}' must be a single table", name),
        }
    }

    pub fn log_config(&self, path: Option<&Path>) {
        let shown = match path {
            Some(p) => p.display().to_string(),
            None => Self::get_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "(none)".to_string()),
        };
        Log::log_block_start(&format!("Loaded configuration from {}", shown));
        if let Some(method) = &self.sunshift.adjustment_method {
            Log::log_indented(&format!("Adjustment method: {}", method));
        }
        if let Some(provider) = &self.sunshift.location_provider {
            Log::log_indented(&format!("Location provider: {}", provider));
        }
        if !self.hooks.is_empty() {
            Log::log_indented(&format!("Hooks: {}", self.hooks.len()));
        }
    }
}

fn table_options(section: &str, table: &toml::Table) -> Result<OptionList> {
    table
        .iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
                _ => bail!("Unsupported value for `{}' in section `{}'", key, section),
            };
            Ok((key.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    fn parse(content: &str) -> Config {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_config_toml_parsing() {
        let config = parse(
            r#"
[sunshift]
temp-day = 6000
temp-night = 3300
brightness = 0.9
brightness-night = 0.7
elevation-high = 4.0
transition = false
gamma = "0.9:0.8:0.7"
adjustment-method = "drm"
"#,
        );

        assert_eq!(config.sunshift.temp_day, Some(6000));
        assert_eq!(config.sunshift.adjustment_method.as_deref(), Some("drm"));
        let overlay = config.settings_overlay(ProgramMode::Continual);
        assert_eq!(overlay.brightness_day, Some(0.9));
        assert_eq!(overlay.brightness_night, Some(0.7));
        assert_eq!(overlay.transition_high, Some(4.0));
        assert_eq!(overlay.transition, Some(false));
        assert_eq!(overlay.temp_set, None);
    }

    #[test]
    fn test_config_malformed_toml() {
        let result: Result<Config, _> = toml::from_str("[sunshift]\ntemp-day = \"warm\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_general_key_rejected() {
        let result: Result<Config, _> = toml::from_str("[sunshift]\ntemp-dya = 5000\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_gamma() {
        let config = parse("[sunshift]\ngamma = 0.8\n");
        assert_eq!(config.sunshift.gamma, Some(GammaSetting::Uniform(0.8)));
        assert_eq!(config.sunshift.gamma.unwrap().as_option_value(), "0.8");
    }

    #[test]
    fn test_preserve_calibrations_only_in_continual_mode() {
        let config = parse("[sunshift]\npreserve-calibrations = true\n");
        assert_eq!(
            config.settings_overlay(ProgramMode::Continual).preserve_calibrations,
            Some(true)
        );
        assert_eq!(
            config.settings_overlay(ProgramMode::OneShot).preserve_calibrations,
            None
        );
    }

    #[test]
    fn test_method_sections_array_and_single() {
        let config = parse(
            r#"
[[drm]]
card = 0
crtc = "all"

[[drm]]
card = 1
gamma = 0.9

[dummy]
crtc = 0
"#,
        );

        let drm = config.method_sections("drm").unwrap();
        assert_eq!(drm.len(), 2);
        assert!(drm[0].contains(&("crtc".to_string(), "all".to_string())));
        assert!(drm[1].contains(&("card".to_string(), "1".to_string())));
        assert_eq!(config.method_sections("dummy").unwrap().len(), 1);
        assert!(config.method_sections("wayland").unwrap().is_empty());
    }

    #[test]
    fn test_provider_section() {
        let config = parse("[manual]\nlat = 55.5\nlon = -3\n");
        let options = config.provider_section("manual").unwrap();
        assert!(options.contains(&("lat".to_string(), "55.5".to_string())));
        assert!(options.contains(&("lon".to_string(), "-3".to_string())));
    }

    #[test]
    fn test_hooks_section() {
        let config = parse("[hooks]\nday = \"echo day\"\nnight = \"echo night\"\n");
        assert_eq!(config.hooks.len(), 2);
        assert_eq!(config.hooks.get("day").map(String::as_str), Some("echo day"));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        assert!(Config::load(Some(missing.as_path())).is_err());
    }

    #[test]
    fn test_load_from_path_rejects_bad_gamma() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sunshift.toml");
        fs::write(&path, "[sunshift]\ngamma = \"1:2\"\n").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_load_default_path_missing_gives_defaults() {
        let temp_dir = tempdir().unwrap();
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
        }

        let result = Config::load(None);

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        let config = result.unwrap();
        assert_eq!(config.sunshift, GeneralSection::default());
        assert!(config.sections.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_default_path_reads_file() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("sunshift");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("sunshift.toml"), "[sunshift]\ntemp-night = 3000\n").unwrap();

        let original = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
        }

        let result = Config::load(None);

        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert_eq!(result.unwrap().sunshift.temp_night, Some(3000));
    }
}
