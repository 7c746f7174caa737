//! Application constants and default values for sunshift.
//!
//! This module contains the configuration defaults, validation limits,
//! and loop timing used throughout the application.

// ═══ Settings Defaults ═══
// Used when neither the command line nor the config file sets a value

pub const DEFAULT_DAY_TEMP: u32 = 5500; // Kelvin
pub const DEFAULT_NIGHT_TEMP: u32 = 3500; // Kelvin
pub const DEFAULT_BRIGHTNESS: f32 = 1.0;
pub const DEFAULT_GAMMA: f32 = 1.0;
pub const DEFAULT_TRANSITION: bool = true;
pub const DEFAULT_RELOAD_TRANSITION: bool = true;
pub const DEFAULT_PRESERVE_CALIBRATIONS: bool = false;

/// Reference white point: unit ramps at this temperature are unmodified.
pub const NEUTRAL_TEMP: u32 = 6500;

// ═══ Solar Elevation Thresholds ═══
// Degrees. Below LOW is night, above HIGH is day, in between is twilight.

pub const TRANSITION_LOW: f64 = -6.0; // civil dusk
pub const TRANSITION_HIGH: f64 = 3.0;

// ═══ Validation Limits ═══

pub const MIN_TEMP: u32 = 1000;
pub const MAX_TEMP: u32 = 25000;

pub const MIN_BRIGHTNESS: f32 = 0.1;
pub const MAX_BRIGHTNESS: f32 = 1.0;

pub const MIN_GAMMA: f32 = 0.1;
pub const MAX_GAMMA: Option<f32> = Some(10.0); // None leaves gamma unbounded above

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

// ═══ Transition Controller Timing ═══

pub const TICK_ACTIVE_MS: u64 = 100; // While a short or reload transition runs
pub const TICK_IDLE_MS: u64 = 5000;

pub const SHORT_TRANSITION_STEP: f64 = 0.1; // Progress per tick is STEP / length
pub const INITIAL_FADE_LENGTH: u32 = 10; // Startup fade from neutral
pub const TOGGLE_FADE_LENGTH: u32 = 2; // Enable/disable and shutdown fades
pub const RELOAD_TRANSITION_STEP: f64 = 0.2;

// ═══ Backend Constants ═══

pub const DUMMY_RAMP_SIZE: usize = 256;
pub const DRM_DIR: &str = "/dev/dri";

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1;
