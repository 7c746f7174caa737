use anyhow::{Context, Result, bail};
use chrono::Utc;
use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::io::AsRawFd,
    path::{Path, PathBuf},
};
use termios::{os::linux::ECHOCTL, *};

use sunshift::args::{CliAction, ParsedArgs, RunOptions, display_help, display_version_info};
use sunshift::backend::{self, Method, MethodSetup};
use sunshift::config::{Config, OptionList};
use sunshift::constants::EXIT_FAILURE;
use sunshift::controller::{self, Controller, LoopContext};
use sunshift::hooks::Hooks;
use sunshift::location::{self, Location, Provider};
use sunshift::logger::Log;
use sunshift::settings::{ProgramMode, Settings};
use sunshift::signals::setup_signal_handler;

/// Suppresses the `^C` echo while the daemon runs in a terminal.
///
/// The original terminal settings are restored on drop.
struct TerminalGuard {
    original_termios: Termios,
}

impl TerminalGuard {
    /// `Ok(None)` when there is no controlling terminal, e.g. under systemd.
    fn new() -> io::Result<Option<Self>> {
        let tty = match File::open("/dev/tty") {
            Ok(tty) => tty,
            Err(e) if e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(6) => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let fd = tty.as_raw_fd();
        let mut term = Termios::from_fd(fd)?;
        let original = term;

        term.c_lflag &= !ECHOCTL;
        tcsetattr(fd, TCSANOW, &term)?;

        Ok(Some(Self {
            original_termios: original,
        }))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Ok(tty) = File::open("/dev/tty") {
            let _ = tcsetattr(tty.as_raw_fd(), TCSANOW, &self.original_termios);
        }
    }
}

/// Exclusive lock so that only one daemon drives the gamma ramps.
///
/// The lock file is removed again on drop.
struct InstanceLock {
    file: Option<File>,
    path: PathBuf,
}

impl InstanceLock {
    fn acquire() -> Result<Self> {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
        let path = Path::new(&runtime_dir).join("sunshift.lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to create lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            bail!("sunshift is already running (lock held on {})", path.display());
        }
        Log::log_debug(&format!("Lock acquired at {}", path.display()));
        Ok(Self {
            file: Some(file),
            path,
        })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Release the lock before removing the file
        drop(self.file.take());
        if let Err(e) = std::fs::remove_file(&self.path) {
            Log::log_warning(&format!("Failed to remove lock file: {}", e));
        }
    }
}

/// Provider from the command line, else from `location-provider`.
fn requested_provider(options: &RunOptions, config: &Config) -> Result<Option<Provider>> {
    if options.provider.is_some() {
        return Ok(options.provider);
    }
    match &config.sunshift.location_provider {
        Some(name) => Provider::from_name(name)
            .map(Some)
            .with_context(|| format!("Unknown location provider `{}'.", name)),
        None => Ok(None),
    }
}

/// Method from the command line, else from `adjustment-method`.
fn requested_method(options: &RunOptions, config: &Config) -> Result<Option<Method>> {
    if options.method.is_some() {
        return Ok(options.method);
    }
    match &config.sunshift.adjustment_method {
        Some(name) => Method::from_name(name)
            .map(Some)
            .with_context(|| format!("Unknown adjustment method `{}'.", name)),
        None => Ok(None),
    }
}

fn find_location(options: &RunOptions, config: &Config) -> Result<Location> {
    let requested = requested_provider(options, config)?;
    let (provider, location) = location::locate(requested, |provider| {
        let mut list: OptionList = config.provider_section(provider.name())?;
        if options.provider == Some(provider) {
            list.extend(options.provider_options.iter().cloned());
        }
        Ok(list)
    })?;
    Log::log_decorated(&format!(
        "Location: {} (from {})",
        location.describe(),
        provider.name()
    ));
    Ok(location)
}

fn start_backend(
    options: &RunOptions,
    config: &Config,
    settings: &Settings,
) -> Result<Box<dyn backend::ColorTemperatureBackend>> {
    let requested = requested_method(options, config)?;
    let gamma = options
        .gamma
        .clone()
        .or_else(|| config.sunshift.gamma.as_ref().map(|g| g.as_option_value()));

    backend::start_any(requested, |method| {
        Ok(MethodSetup {
            gamma: gamma.clone(),
            preserve_calibrations: settings.preserve_calibrations,
            sections: config.method_sections(method.name())?,
            cmdline: if options.method == Some(method) {
                options.method_options.clone()
            } else {
                Vec::new()
            },
        })
    })
}

fn run(options: RunOptions) -> Result<()> {
    let mode = options.mode;
    Log::set_debug(options.verbose);
    if mode == ProgramMode::Print {
        Log::set_enabled(false);
    }

    Log::log_version();

    let config_path = options.config_path.clone();
    let config = Config::load(config_path.as_deref())?;
    if Log::is_debug() {
        config.log_config(config_path.as_deref());
    }

    let settings = Settings::finalize(options.overlay.layer_over(config.settings_overlay(mode)));
    settings.validate(mode)?;
    if Log::is_debug() && mode.needs_location() {
        Log::log_block_start("Settings");
        settings.log_settings();
    }

    let location = if mode.needs_location() {
        Some(find_location(&options, &config)?)
    } else {
        None
    };

    if let (ProgramMode::Print, Some(location)) = (mode, location) {
        controller::print_mode(&settings, location, Utc::now());
        return Ok(());
    }

    let _lock = if mode == ProgramMode::Continual {
        Some(InstanceLock::acquire()?)
    } else {
        None
    };

    let mut backend = start_backend(&options, &config, &settings)?;
    Log::log_decorated(&format!(
        "Adjusting {} unit(s) through {}",
        backend.unit_count(),
        backend.backend_name()
    ));

    match (mode, location) {
        (ProgramMode::Manual, _) => controller::manual(backend.as_mut(), &settings)?,
        (ProgramMode::Reset, _) => controller::reset(backend.as_mut()),
        (ProgramMode::OneShot, Some(location)) => {
            controller::one_shot(backend.as_mut(), &settings, location, Utc::now())
        }
        (ProgramMode::Continual, Some(location)) => {
            let _term = TerminalGuard::new().context("failed to initialize terminal features")?;
            let signals = setup_signal_handler()?;
            let hooks = Hooks::from_section(&config.hooks);

            let controller = Controller::new(settings, options.overlay, mode);
            let context = LoopContext {
                backend: backend.as_mut(),
                location,
                hooks: &hooks,
                signals: &signals,
                load_config: || Ok(Config::load(config_path.as_deref())?.settings_overlay(mode)),
            };
            controller::run_continual(controller, context);
        }
        (_, None) => bail!("No location available"),
        (ProgramMode::Print, Some(_)) => {}
    }

    Log::log_end();
    Ok(())
}

fn main() {
    let parsed = ParsedArgs::from_env();

    match parsed.action {
        CliAction::ShowVersion => display_version_info(),
        CliAction::ShowHelp => display_help(),
        CliAction::ShowHelpDueToError => {
            display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::ListMethods => backend::print_method_list(),
        CliAction::MethodHelp(method) => {
            println!("Parameters for `{}':", method.name());
            println!("{}", method.help());
        }
        CliAction::ListProviders => location::print_provider_list(),
        CliAction::ProviderHelp(provider) => {
            println!("Parameters for `{}':", provider.name());
            println!("{}", provider.help());
        }
        CliAction::Run(options) => {
            if let Err(e) = run(options) {
                Log::set_enabled(true);
                Log::log_critical(&format!("{:#}", e));
                std::process::exit(EXIT_FAILURE);
            }
        }
    }
}
