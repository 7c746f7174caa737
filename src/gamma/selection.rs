//! Selections, selectors and per-unit adjustment settings.

use crate::constants::{
    DEFAULT_BRIGHTNESS, DEFAULT_GAMMA, MAX_BRIGHTNESS, MAX_GAMMA, MAX_TEMP, MIN_BRIGHTNESS,
    MIN_GAMMA, MIN_TEMP, NEUTRAL_TEMP,
};

/// Adjustment applied to one unit's ramps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSettings {
    pub gamma: [f32; 3],
    pub brightness: f32,
    pub temperature: f32,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            gamma: [DEFAULT_GAMMA; 3],
            brightness: DEFAULT_BRIGHTNESS,
            temperature: NEUTRAL_TEMP as f32,
        }
    }
}

impl UnitSettings {
    /// Set per-channel gamma, clamped to the supported range.
    pub fn set_gamma(&mut self, gamma: [f32; 3]) {
        self.gamma = gamma.map(clamp_gamma);
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.clamp(MIN_BRIGHTNESS, MAX_BRIGHTNESS);
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature.clamp(MIN_TEMP as f32, MAX_TEMP as f32);
    }
}

fn clamp_gamma(value: f32) -> f32 {
    match MAX_GAMMA {
        Some(max) => value.clamp(MIN_GAMMA, max),
        None => value.max(MIN_GAMMA),
    }
}

/// A request to open some units of a method, with the settings they get.
///
/// `None` for `partition` or `unit` selects all of them. A `None` site
/// means the method's default site.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub site: Option<String>,
    pub partition: Option<usize>,
    pub unit: Option<usize>,
    pub settings: UnitSettings,
}

impl Selection {
    /// The template every method starts with: default site, all partitions,
    /// all units, neutral settings.
    pub fn default_template() -> Self {
        Self::default()
    }
}

/// Addresses units of an opened hierarchy by index. `None` matches any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selector {
    pub site: Option<usize>,
    pub partition: Option<usize>,
    pub unit: Option<usize>,
}

impl Selector {
    pub const ALL: Selector = Selector {
        site: None,
        partition: None,
        unit: None,
    };

    /// Select exactly one unit.
    pub fn unit(site: usize, partition: usize, unit: usize) -> Self {
        Self {
            site: Some(site),
            partition: Some(partition),
            unit: Some(unit),
        }
    }

    pub fn is_all(&self) -> bool {
        self.site.is_none() && self.partition.is_none() && self.unit.is_none()
    }

    /// The concrete triple, if no component is a wildcard.
    pub fn exact(&self) -> Option<(usize, usize, usize)> {
        Some((self.site?, self.partition?, self.unit?))
    }

    pub fn matches(&self, site: usize, partition: usize, unit: usize) -> bool {
        self.site.is_none_or(|s| s == site)
            && self.partition.is_none_or(|p| p == partition)
            && self.unit.is_none_or(|u| u == unit)
    }
}
