//! # Sunshift
//!
//! Adjusts the color temperature of displays according to the position of
//! the sun.
//!
//! ## Architecture
//!
//! - **gamma**: sites, partitions and units, selection resolution, ramp
//!   computation and the adjustment engine
//! - **backend**: gamma methods (`wayland`, `drm`, `dummy`) and fallback
//! - **controller**: the adjustment loop with its fades, and the one-shot modes
//! - **location**, **solar**, **time_state**: where the sun is and what that
//!   means for temperature and brightness
//! - **config**, **args**, **settings**: where settings come from and how
//!   they are layered
//! - **signals**, **hooks**, **logger**: process plumbing

pub mod args;
pub mod backend;
pub mod config;
pub mod constants;
pub mod controller;
pub mod gamma;
pub mod hooks;
pub mod location;
pub mod logger;
pub mod settings;
pub mod signals;
pub mod solar;
#[cfg(any(test, feature = "testing-support"))]
pub mod testing;
pub mod time_state;
pub mod utils;

// Re-export important types for easier access
pub use config::Config;
pub use controller::Controller;
pub use gamma::{GammaMethod, GammaState, Ramps, Selector};
pub use logger::{Log, LogLevel};
pub use settings::{ProgramMode, Settings, SettingsOverlay};
pub use time_state::{Period, TransitionState, get_transition_state};
