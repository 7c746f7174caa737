//! The main adjustment loop and the one-shot modes.
//!
//! [`Controller`] holds the loop state and advances it one tick at a time
//! through [`Controller::step`]. The loop around it, [`run_continual`],
//! only reads the clock, pushes the values a tick produced and sleeps on
//! the signal channel.
//!
//! Two kinds of animation run inside the loop:
//!
//! - A short transition moves `alpha` between 0 (computed values) and 1
//!   (neutral 6500 K at full brightness). It fades in at startup, fades out
//!   on disable and on shutdown.
//! - A reload transition blends from the settings in effect before a
//!   config reload to the newly loaded ones.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::backend::ColorTemperatureBackend;
use crate::constants::*;
use crate::hooks::Hooks;
use crate::location::Location;
use crate::logger::Log;
use crate::settings::{ProgramMode, Settings, SettingsOverlay};
use crate::signals::{PendingSignals, SignalState};
use crate::solar;
use crate::time_state::{
    Period, classify_period, describe_period, interpolated_brightness, interpolated_temperature,
    log_period_announcement,
};

/// Slack for float accumulation when testing whether alpha hit a bound.
const ALPHA_EPSILON: f64 = 1e-9;

/// What one tick decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub temperature: u32,
    pub brightness: f32,
    /// Whether the values should be written to the displays.
    pub push: bool,
    /// Set when the values are pushed and the period differs from the last
    /// announced one.
    pub announce: Option<Period>,
    pub period: Period,
}

/// State of the continual adjustment loop.
#[derive(Debug, Clone)]
pub struct Controller {
    settings: Settings,
    /// Command line settings, layered over the config on every reload.
    cmdline: SettingsOverlay,
    mode: ProgramMode,

    /// 0 shows the computed values, 1 shows neutral.
    alpha: f64,
    /// Direction of the running short transition, 0 when none runs.
    direction: i8,
    /// Length of the short transition; each tick moves alpha by 0.1 / length.
    length: u32,

    reloading: bool,
    reload_weight: f64,
    old_settings: Settings,
    new_settings: Settings,

    disabled: bool,
    done: bool,
    announced: Option<Period>,
}

impl Controller {
    /// Start state: fully neutral, fading toward the computed values.
    pub fn new(settings: Settings, cmdline: SettingsOverlay, mode: ProgramMode) -> Self {
        Self {
            settings,
            cmdline,
            mode,
            alpha: 1.0,
            direction: -1,
            length: INITIAL_FADE_LENGTH,
            reloading: false,
            reload_weight: 0.0,
            old_settings: settings,
            new_settings: settings,
            disabled: false,
            done: false,
            announced: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_transitioning(&self) -> bool {
        self.direction != 0
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    /// Sleep between ticks: short while anything animates.
    pub fn tick_interval(&self) -> Duration {
        if self.direction != 0 || self.reloading {
            Duration::from_millis(TICK_ACTIVE_MS)
        } else {
            Duration::from_millis(TICK_IDLE_MS)
        }
    }

    /// Layer the command line over a freshly loaded config and make the
    /// result the new target.
    ///
    /// On any error the current settings stay in effect.
    pub fn reload(&mut self, config: Result<SettingsOverlay>) {
        let candidate = config.and_then(|overlay| {
            let settings = Settings::finalize(self.cmdline.layer_over(overlay));
            settings.validate(self.mode)?;
            Ok(settings)
        });

        let new_settings = match candidate {
            Ok(settings) => settings,
            Err(e) => {
                Log::log_warning(&format!("Unable to reload configuration: {:#}", e));
                return;
            }
        };

        if new_settings.reload_transition {
            self.old_settings = self.settings;
            self.reloading = true;
            self.reload_weight = 0.0;
        }
        self.settings = new_settings;
        self.new_settings = new_settings;

        Log::log_block_start("Configuration reloaded");
        if Log::is_debug() {
            self.settings.log_settings();
        }
    }

    /// Flip between enabled and disabled with a short fade.
    pub fn toggle(&mut self) {
        self.length = TOGGLE_FADE_LENGTH;
        self.direction = if self.disabled { -1 } else { 1 };
        self.disabled = !self.disabled;
        Log::log_debug(&format!(
            "Status: {}",
            if self.disabled { "Disabled" } else { "Enabled" }
        ));
    }

    /// First call fades out and marks the loop done. A second call stops
    /// the fade where it is.
    pub fn request_exit(&mut self) {
        if self.done {
            self.direction = 0;
        } else {
            if !self.disabled {
                self.direction = 1;
                self.length = TOGGLE_FADE_LENGTH;
            }
            self.done = true;
        }
    }

    /// Advance the loop by one tick.
    ///
    /// Pending requests are consumed first; `load_config` is only called
    /// when a reload is pending. Returns `None` once the loop is finished.
    pub fn step<F>(&mut self, pending: &mut PendingSignals, elevation: f64, load_config: F) -> Option<Frame>
    where
        F: FnOnce() -> Result<SettingsOverlay>,
    {
        if pending.reload {
            pending.reload = false;
            self.reload(load_config());
        }

        if self.reloading {
            self.reload_weight = (self.reload_weight + RELOAD_TRANSITION_STEP).min(1.0);
            if self.reload_weight >= 1.0 {
                self.reloading = false;
            }
            self.settings =
                Settings::interpolate(&self.old_settings, &self.new_settings, self.reload_weight);
        }

        if pending.toggle {
            pending.toggle = false;
            self.toggle();
        }

        if pending.exit {
            pending.exit = false;
            self.request_exit();
        }

        let mut forced = false;
        if !self.settings.transition && self.direction != 0 {
            self.alpha = if self.direction < 0 { 0.0 } else { 1.0 };
            self.direction = 0;
            forced = true;
        }

        let target_temp = interpolated_temperature(elevation, &self.settings).trunc();
        let target_brightness = interpolated_brightness(elevation, &self.settings);
        Log::log_debug(&format!("Period: {}", describe_period(elevation, &self.settings)));

        let fading = self.direction != 0;
        if fading {
            self.alpha += f64::from(self.direction) * SHORT_TRANSITION_STEP / f64::from(self.length);
            if self.alpha <= ALPHA_EPSILON || self.alpha >= 1.0 - ALPHA_EPSILON {
                self.direction = 0;
            }
            self.alpha = self.alpha.clamp(0.0, 1.0);
            if self.direction == 0 {
                self.alpha = self.alpha.round();
            }
        }

        let temperature =
            (self.alpha * f64::from(NEUTRAL_TEMP) + (1.0 - self.alpha) * target_temp) as u32;
        let brightness = (self.alpha + (1.0 - self.alpha) * target_brightness) as f32;

        if self.done && self.direction == 0 {
            return None;
        }

        // The tick that ends a fade still has to reach the displays
        let push = !self.disabled || fading || self.reloading || forced;
        let period = classify_period(elevation, &self.settings);
        let announce = if push && self.announced != Some(period) {
            self.announced = Some(period);
            Some(period)
        } else {
            None
        };

        Some(Frame {
            temperature,
            brightness,
            push,
            announce,
            period,
        })
    }
}

/// Values for `elevation` with no fades applied.
pub fn current_values(settings: &Settings, elevation: f64) -> (u32, f32) {
    (
        interpolated_temperature(elevation, settings) as u32,
        interpolated_brightness(elevation, settings) as f32,
    )
}

/// `-p`: print what would be applied now.
pub fn print_mode(settings: &Settings, location: Location, now: DateTime<Utc>) {
    let elevation = solar::elevation(now, location.lat, location.lon);
    let (temperature, brightness) = current_values(settings, elevation);
    Log::log_debug(&format!("Solar elevation: {:.6}", elevation));
    println!("Period: {}", describe_period(elevation, settings));
    println!("Color temperature: {}K", temperature);
    println!("Brightness: {:.2}", brightness);
}

/// `-o`: apply the current values once.
pub fn one_shot(
    backend: &mut dyn ColorTemperatureBackend,
    settings: &Settings,
    location: Location,
    now: DateTime<Utc>,
) {
    let elevation = solar::elevation(now, location.lat, location.lon);
    let (temperature, brightness) = current_values(settings, elevation);
    Log::log_debug(&format!("Solar elevation: {:.6}", elevation));
    Log::log_debug(&format!("Period: {}", describe_period(elevation, settings)));
    Log::log_decorated(&format!(
        "Setting {}K at brightness {:.2}",
        temperature, brightness
    ));
    backend.apply_temperature_brightness(temperature as f32, brightness);
}

/// `-O`: apply the fixed temperature with day brightness.
pub fn manual(backend: &mut dyn ColorTemperatureBackend, settings: &Settings) -> Result<()> {
    let temperature = settings
        .temp_set
        .context("Manual mode needs a temperature")?;
    Log::log_decorated(&format!("Setting {}K", temperature));
    backend.apply_temperature_brightness(temperature as f32, settings.brightness_day);
    Ok(())
}

/// `-x`: neutral temperature at full brightness.
pub fn reset(backend: &mut dyn ColorTemperatureBackend) {
    Log::log_decorated("Resetting displays to neutral");
    backend.apply_temperature_brightness(NEUTRAL_TEMP as f32, 1.0);
}

/// Everything the continual loop needs besides the controller itself.
pub struct LoopContext<'a, F>
where
    F: FnMut() -> Result<SettingsOverlay>,
{
    pub backend: &'a mut dyn ColorTemperatureBackend,
    pub location: Location,
    pub hooks: &'a Hooks,
    pub signals: &'a SignalState,
    /// Reads the config file again on reload.
    pub load_config: F,
}

/// Run until shut down, then put the saved ramps back.
pub fn run_continual<F>(mut controller: Controller, mut context: LoopContext<'_, F>)
where
    F: FnMut() -> Result<SettingsOverlay>,
{
    let location = context.location;
    let mut pending = PendingSignals::default();
    Log::log_debug("Status: Enabled");

    loop {
        let now = Utc::now();
        let elevation = solar::elevation(now, location.lat, location.lon);
        let load_config = &mut context.load_config;
        let Some(frame) = controller.step(&mut pending, elevation, || load_config()) else {
            break;
        };

        if frame.push {
            Log::log_debug(&format!("Color temperature: {}K", frame.temperature));
            Log::log_debug(&format!("Brightness: {:.2}", frame.brightness));
            context
                .backend
                .apply_temperature_brightness(frame.temperature as f32, frame.brightness);
        }

        if let Some(period) = frame.announce {
            log_period_announcement(period);
            context.hooks.run(period);
            if Log::is_debug() {
                match solar::twilight_times(location.lat, location.lon, now.date_naive()) {
                    Ok(times) => times.log(),
                    Err(e) => Log::log_debug(&format!("No twilight times: {}", e)),
                }
            }
        }

        context.signals.wait(controller.tick_interval(), &mut pending);
    }

    Log::log_block_start("Restoring gamma ramps");
    context.backend.restore();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::test_constants::*;

    const DAY: f64 = 30.0;
    const NIGHT: f64 = -30.0;

    fn settings() -> Settings {
        Settings {
            temp_day: TEST_DAY_TEMP,
            temp_night: TEST_NIGHT_TEMP,
            ..Settings::default()
        }
    }

    fn controller() -> Controller {
        Controller::new(settings(), SettingsOverlay::default(), ProgramMode::Continual)
    }

    fn no_config() -> Result<SettingsOverlay> {
        Ok(SettingsOverlay::default())
    }

    /// Run ticks until the short transition stops, returning how many ran.
    fn ticks_until_settled(controller: &mut Controller, elevation: f64) -> usize {
        let mut pending = PendingSignals::default();
        let mut ticks = 0;
        while controller.is_transitioning() {
            controller.step(&mut pending, elevation, no_config);
            ticks += 1;
            assert!(ticks < 1000, "transition never settled");
        }
        ticks
    }

    #[test]
    fn test_starts_neutral_and_fades_in() {
        let mut controller = controller();
        let mut pending = PendingSignals::default();

        let first = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert!(first.push);
        assert!(first.temperature < NEUTRAL_TEMP);
        assert!(first.temperature > 6400);
        assert_eq!(controller.tick_interval(), Duration::from_millis(TICK_ACTIVE_MS));

        // Step 0.1 / 10 from 0.99 down to 0
        assert_eq!(ticks_until_settled(&mut controller, NIGHT), 99);
        let settled = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert_eq!(settled.temperature, TEST_NIGHT_TEMP);
        assert_eq!(controller.tick_interval(), Duration::from_millis(TICK_IDLE_MS));
    }

    #[test]
    fn test_twilight_midpoint_temperature() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, TEST_TWILIGHT_MIDPOINT);
        let mut pending = PendingSignals::default();
        let frame = controller
            .step(&mut pending, TEST_TWILIGHT_MIDPOINT, no_config)
            .unwrap();
        assert_eq!(frame.temperature, 4600);
        assert_eq!(frame.period, Period::Twilight);
    }

    #[test]
    fn test_toggle_fades_over_twenty_ticks() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, DAY);
        assert_eq!(controller.alpha(), 0.0);

        let mut pending = PendingSignals {
            toggle: true,
            ..Default::default()
        };
        controller.step(&mut pending, DAY, no_config);
        assert!(controller.is_disabled());
        assert!(!pending.toggle);

        assert_eq!(ticks_until_settled(&mut controller, DAY) + 1, 20);
        assert_eq!(controller.alpha(), 1.0);

        // Disabled and settled: nothing is pushed
        let frame = controller.step(&mut pending, DAY, no_config).unwrap();
        assert!(!frame.push);
        assert_eq!(frame.temperature, NEUTRAL_TEMP);
    }

    #[test]
    fn test_disable_pushes_neutral_frame_last() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, NIGHT);

        let mut pending = PendingSignals {
            toggle: true,
            ..Default::default()
        };
        let mut last_pushed = None;
        for _ in 0..30 {
            let frame = controller.step(&mut pending, NIGHT, no_config).unwrap();
            if frame.push {
                last_pushed = Some(frame);
            }
        }

        let last = last_pushed.unwrap();
        assert_eq!(last.temperature, NEUTRAL_TEMP);
        assert_eq!(last.brightness, 1.0);
        assert!(controller.is_disabled());
    }

    #[test]
    fn test_reload_while_disabled_keeps_pushing() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, NIGHT);
        controller.toggle();
        ticks_until_settled(&mut controller, NIGHT);

        let mut pending = PendingSignals {
            reload: true,
            ..Default::default()
        };
        let frame = controller
            .step(&mut pending, NIGHT, || {
                Ok(SettingsOverlay {
                    temp_night: Some(2700),
                    ..Default::default()
                })
            })
            .unwrap();
        assert!(controller.is_reloading());
        assert!(frame.push);
        assert_eq!(frame.temperature, NEUTRAL_TEMP);
    }

    #[test]
    fn test_toggle_back_enables() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, NIGHT);
        controller.toggle();
        ticks_until_settled(&mut controller, NIGHT);
        controller.toggle();
        assert!(!controller.is_disabled());
        ticks_until_settled(&mut controller, NIGHT);

        let mut pending = PendingSignals::default();
        let frame = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert!(frame.push);
        assert_eq!(frame.temperature, TEST_NIGHT_TEMP);
    }

    #[test]
    fn test_exit_fades_to_neutral_then_finishes() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, NIGHT);

        let mut pending = PendingSignals {
            exit: true,
            ..Default::default()
        };
        let mut frames = 0;
        while controller.step(&mut pending, NIGHT, no_config).is_some() {
            frames += 1;
            assert!(frames < 100);
        }
        assert_eq!(frames, 19);
        assert_eq!(controller.alpha(), 1.0);
    }

    #[test]
    fn test_second_exit_stops_immediately() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, NIGHT);

        let mut pending = PendingSignals {
            exit: true,
            ..Default::default()
        };
        assert!(controller.step(&mut pending, NIGHT, no_config).is_some());
        assert!(controller.step(&mut pending, NIGHT, no_config).is_some());

        pending.exit = true;
        assert!(controller.step(&mut pending, NIGHT, no_config).is_none());
    }

    #[test]
    fn test_exit_while_disabled_finishes_without_fade() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, NIGHT);
        controller.toggle();
        ticks_until_settled(&mut controller, NIGHT);

        let mut pending = PendingSignals {
            exit: true,
            ..Default::default()
        };
        assert!(controller.step(&mut pending, NIGHT, no_config).is_none());
    }

    #[test]
    fn test_transitions_off_snaps_and_pushes() {
        let settings = Settings {
            transition: false,
            ..settings()
        };
        let mut controller =
            Controller::new(settings, SettingsOverlay::default(), ProgramMode::Continual);
        let mut pending = PendingSignals::default();

        let frame = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert_eq!(frame.temperature, TEST_NIGHT_TEMP);
        assert!(!controller.is_transitioning());

        controller.toggle();
        let frame = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert!(frame.push);
        assert_eq!(frame.temperature, NEUTRAL_TEMP);

        let frame = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert!(!frame.push);
    }

    #[test]
    fn test_reload_blends_over_five_ticks() {
        let mut controller = controller();
        ticks_until_settled(&mut controller, NIGHT);

        let mut pending = PendingSignals {
            reload: true,
            ..Default::default()
        };
        let reloaded = || {
            Ok(SettingsOverlay {
                temp_night: Some(2700),
                ..Default::default()
            })
        };

        let first = controller.step(&mut pending, NIGHT, reloaded).unwrap();
        assert!(controller.is_reloading());
        // 20% of the way from 3700 to 2700
        assert_eq!(first.temperature, 3500);

        let mut last = first;
        for _ in 0..4 {
            last = controller.step(&mut pending, NIGHT, no_config).unwrap();
        }
        assert!(!controller.is_reloading());
        assert_eq!(last.temperature, 2700);
    }

    #[test]
    fn test_reload_keeps_cmdline_values() {
        let cmdline = SettingsOverlay {
            temp_night: Some(3000),
            reload_transition: Some(false),
            ..Default::default()
        };
        let mut controller =
            Controller::new(Settings::finalize(cmdline), cmdline, ProgramMode::Continual);
        controller.reload(Ok(SettingsOverlay {
            temp_night: Some(2000),
            temp_day: Some(6000),
            ..Default::default()
        }));
        assert!(!controller.is_reloading());
        assert_eq!(controller.settings().temp_night, 3000);
        assert_eq!(controller.settings().temp_day, 6000);
    }

    #[test]
    fn test_failed_reload_keeps_settings() {
        let mut controller = controller();
        let before = *controller.settings();

        controller.reload(Err(anyhow::anyhow!("parse error")));
        assert_eq!(*controller.settings(), before);

        controller.reload(Ok(SettingsOverlay {
            temp_day: Some(100),
            ..Default::default()
        }));
        assert_eq!(*controller.settings(), before);
        assert!(!controller.is_reloading());
    }

    #[test]
    fn test_period_announced_once_per_change() {
        let mut controller = controller();
        let mut pending = PendingSignals::default();

        let frame = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert_eq!(frame.announce, Some(Period::Night));
        let frame = controller.step(&mut pending, NIGHT, no_config).unwrap();
        assert_eq!(frame.announce, None);
        let frame = controller.step(&mut pending, DAY, no_config).unwrap();
        assert_eq!(frame.announce, Some(Period::Day));
    }

    #[test]
    fn test_current_values_at_thresholds() {
        let settings = settings();
        assert_eq!(current_values(&settings, -6.0), (TEST_NIGHT_TEMP, 1.0));
        assert_eq!(current_values(&settings, 3.0), (TEST_DAY_TEMP, 1.0));
    }

    #[test]
    fn test_manual_requires_temperature() {
        let mut backend = crate::backend::Method::Dummy
            .start(&crate::backend::MethodSetup::default())
            .unwrap();
        assert!(manual(backend.as_mut(), &settings()).is_err());

        let with_temp = Settings {
            temp_set: Some(4200),
            ..settings()
        };
        assert!(manual(backend.as_mut(), &with_temp).is_ok());
    }
}
