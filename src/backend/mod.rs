//! Gamma adjustment methods and the registry used to start them.
//!
//! Every method implements [`GammaMethod`]. Once started, a method's
//! [`GammaState`] is used through the object safe
//! [`ColorTemperatureBackend`] trait, so the controller does not care
//! which method is driving the hardware.
//!
//! ## Supported Methods
//!
//! - **wayland**: `wlr-gamma-control-unstable-v1` on wlroots based compositors
//! - **drm**: kernel mode setting through `/dev/dri/cardN`
//! - **dummy**: no hardware, for testing settings
//!
//! Without an explicit `-m`, each method that may autostart and looks
//! available is tried in the order above until one resolves.

use anyhow::{Context, Result, anyhow};

use crate::config::OptionList;
use crate::gamma::{GammaMethod, GammaState, Selector};
use crate::logger::Log;

pub mod drm;
pub mod dummy;
pub mod wayland;

/// Operations the controller needs from a started method.
pub trait ColorTemperatureBackend {
    /// Name of the method driving this backend.
    fn backend_name(&self) -> &'static str;

    /// Set temperature and brightness on every unit and push the ramps.
    fn apply_temperature_brightness(&mut self, temperature: f32, brightness: f32);

    /// Put the ramps captured at startup back.
    fn restore(&self);

    /// Number of opened units.
    fn unit_count(&self) -> usize;
}

impl<M: GammaMethod> ColorTemperatureBackend for GammaState<M> {
    fn backend_name(&self) -> &'static str {
        self.method().name()
    }

    fn apply_temperature_brightness(&mut self, temperature: f32, brightness: f32) {
        self.set_temperature(Selector::ALL, temperature);
        self.set_brightness(Selector::ALL, brightness);
        self.update();
    }

    fn restore(&self) {
        GammaState::restore(self);
    }

    fn unit_count(&self) -> usize {
        self.units().count()
    }
}

/// Everything needed to start a method: generic settings plus the option
/// lists from config sections and the command line.
#[derive(Debug, Clone, Default)]
pub struct MethodSetup {
    /// Gamma for the default selection, as `R:G:B` or a single value.
    pub gamma: Option<String>,
    pub preserve_calibrations: bool,
    /// One option list per config section, in file order.
    pub sections: Vec<OptionList>,
    /// Options from `-m NAME:key=value`, applied to every selection.
    pub cmdline: OptionList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Wayland,
    Drm,
    Dummy,
}

impl Method {
    /// Preference order for automatic selection.
    pub const ALL: [Method; 3] = [Method::Wayland, Method::Drm, Method::Dummy];

    pub fn name(self) -> &'static str {
        match self {
            Method::Wayland => "wayland",
            Method::Drm => "drm",
            Method::Dummy => "dummy",
        }
    }

    pub fn from_name(name: &str) -> Option<Method> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    /// Whether the method may be tried without being asked for.
    pub fn autostart(self) -> bool {
        !matches!(self, Method::Dummy)
    }

    /// Cheap check whether starting the method could succeed here.
    pub fn is_available(self) -> bool {
        match self {
            Method::Wayland => wayland::WaylandMethod::is_available(),
            Method::Drm => drm::DrmMethod::is_available(),
            Method::Dummy => true,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Method::Wayland => "Wayland gamma control (wlroots compositors)",
            Method::Drm => "Direct Rendering Manager",
            Method::Dummy => "Does not affect the display, only logs",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Method::Wayland => {
                "Adjust gamma ramps with the wlr-gamma-control protocol.\n  display=NAME\tWayland display to connect to\n  output=N\tOutput index to apply adjustments to, or `all'"
            }
            Method::Drm => {
                "Adjust gamma ramps with Direct Rendering Manager.\n  card=N\t\tGraphics card to apply adjustments to, or `all'\n  crtc=N\t\tCRTC to apply adjustments to, or `all'"
            }
            Method::Dummy => {
                "Does not affect the display but logs the ramps written.\n  crtc=N\t\tAccepted for testing selections (only CRTC 0 exists)"
            }
        }
    }

    /// Open the method and resolve its selections.
    pub fn start(self, setup: &MethodSetup) -> Result<Box<dyn ColorTemperatureBackend>> {
        match self {
            Method::Wayland => start_method(wayland::WaylandMethod, setup),
            Method::Drm => start_method(drm::DrmMethod, setup),
            Method::Dummy => start_method(dummy::DummyMethod, setup),
        }
    }
}

/// Configure a fresh [`GammaState`] for `method` and open its units.
///
/// The default selection gets the generic settings. Each config section
/// becomes a selection of its own, and command line options are applied
/// to all selections last.
pub fn start_method<M>(method: M, setup: &MethodSetup) -> Result<Box<dyn ColorTemperatureBackend>>
where
    M: GammaMethod + 'static,
{
    let mut state = GammaState::new(method);
    let name = state.method().name();

    if let Some(gamma) = &setup.gamma {
        state.set_option("gamma", gamma, Some(0))?;
    }
    let preserve = if setup.preserve_calibrations { "1" } else { "0" };
    state.set_option("preserve-calibrations", preserve, Some(0))?;

    for section in &setup.sections {
        let index = state.add_selection();
        for (key, value) in section {
            state
                .set_option(key, value, Some(index))
                .with_context(|| format!("Invalid option in [{}] section", name))?;
        }
    }

    for (key, value) in &setup.cmdline {
        state.set_option(key, value, None)?;
    }

    state.resolve_selections()?;
    Log::log_debug(&format!(
        "Method {} opened {} unit(s)",
        name,
        state.units().count()
    ));
    Ok(Box::new(state))
}

/// Start `requested`, or the first autostart method that comes up.
///
/// `setup_for` builds the setup of each method tried.
pub fn start_any<F>(
    requested: Option<Method>,
    mut setup_for: F,
) -> Result<Box<dyn ColorTemperatureBackend>>
where
    F: FnMut(Method) -> Result<MethodSetup>,
{
    if let Some(method) = requested {
        let setup = setup_for(method)?;
        return method
            .start(&setup)
            .with_context(|| format!("Failed to start adjustment method {}.", method.name()));
    }

    for method in Method::ALL {
        if !method.autostart() || !method.is_available() {
            continue;
        }
        match setup_for(method).and_then(|setup| method.start(&setup)) {
            Ok(backend) => {
                Log::log_decorated(&format!("Using method `{}'.", method.name()));
                return Ok(backend);
            }
            Err(e) => {
                Log::log_error(&format!("{:#}", e));
                Log::log_decorated("Trying next method...");
            }
        }
    }
    Err(anyhow!("No more methods to try."))
}

/// Print the method list for `-m list`.
pub fn print_method_list() {
    println!("Available adjustment methods:");
    for method in Method::ALL {
        println!("  {:<10} {}", method.name(), method.description());
    }
    println!();
    println!("Specify colon-separated options with `-m METHOD:OPTIONS'.");
    println!("Try `-m METHOD:help' for help.");
}
