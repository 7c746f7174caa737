//! Command-line argument parsing and processing.
//!
//! Arguments are parsed with clap into [`RawArgs`] and then interpreted
//! into a [`CliAction`]. Malformed values never abort parsing directly:
//! they are reported as warnings and turn into
//! [`CliAction::ShowHelpDueToError`].

use clap::Parser;
use std::path::PathBuf;

use crate::backend::Method;
use crate::config::OptionList;
use crate::location::Provider;
use crate::logger::Log;
use crate::settings::{ProgramMode, SettingsOverlay};
use crate::utils::{parse_gamma, parse_key_value_list, parse_lat_lon_shorthand};

#[derive(Parser, Debug, Default)]
#[command(
    name = "sunshift",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct RawArgs {
    #[arg(short = 'b', long = "brightness", value_name = "DAY:NIGHT")]
    brightness: Option<String>,
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(short = 'g', long = "gamma", value_name = "R:G:B")]
    gamma: Option<String>,
    #[arg(short = 'h', long = "help")]
    help: bool,
    #[arg(
        short = 'l',
        long = "location",
        value_name = "LAT:LON|PROVIDER",
        allow_hyphen_values = true
    )]
    location: Option<String>,
    #[arg(short = 'm', long = "method", value_name = "METHOD")]
    method: Option<String>,
    #[arg(short = 'o', long = "oneshot")]
    one_shot: bool,
    #[arg(short = 'O', long = "manual", value_name = "TEMP")]
    manual: Option<String>,
    #[arg(short = 'p', long = "print")]
    print: bool,
    #[arg(short = 'P', long = "preserve")]
    preserve: bool,
    #[arg(short = 'r', long = "no-transition")]
    no_transition: bool,
    #[arg(short = 't', long = "temperatures", value_name = "DAY:NIGHT")]
    temperatures: Option<String>,
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    #[arg(short = 'V', long = "version")]
    version: bool,
    #[arg(short = 'x', long = "reset")]
    reset: bool,
}

/// Settings and selections for a normal run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunOptions {
    pub mode: ProgramMode,
    pub verbose: bool,
    pub config_path: Option<PathBuf>,
    /// Settings given on the command line. Layered over the config file.
    pub overlay: SettingsOverlay,
    pub gamma: Option<String>,
    pub method: Option<Method>,
    pub method_options: OptionList,
    pub provider: Option<Provider>,
    pub provider_options: OptionList,
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the application with these options
    Run(RunOptions),
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to invalid arguments and exit with failure
    ShowHelpDueToError,
    /// `-m list`
    ListMethods,
    /// `-m NAME:help`
    MethodHelp(Method),
    /// `-l list`
    ListProviders,
    /// `-l NAME:help`
    ProviderHelp(Provider),
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

/// `NAME:key=value:...` split into name and options, or the `help` request.
enum Request<T> {
    List,
    Help(T),
    Use(T, OptionList),
}

fn parse_request<T>(arg: &str, kind: &str, lookup: fn(&str) -> Option<T>) -> Result<Request<T>, String> {
    if arg.eq_ignore_ascii_case("list") {
        return Ok(Request::List);
    }
    let (name, rest) = arg.split_once(':').unwrap_or((arg, ""));
    let found = lookup(name).ok_or_else(|| format!("Unknown {} `{}'.", kind, name))?;
    if rest.eq_ignore_ascii_case("help") {
        return Ok(Request::Help(found));
    }
    let options = parse_key_value_list(rest).map_err(|e| e.to_string())?;
    Ok(Request::Use(found, options))
}

/// Parse `DAY:NIGHT`, or a single value used for both when `single` is set.
fn parse_pair<T: std::str::FromStr + Copy>(value: &str, single: bool) -> Option<(T, T)> {
    match value.split_once(':') {
        Some((day, night)) => Some((day.trim().parse().ok()?, night.trim().parse().ok()?)),
        None if single => {
            let v = value.trim().parse().ok()?;
            Some((v, v))
        }
        None => None,
    }
}

impl RawArgs {
    fn into_run_options(self) -> Result<CliAction, String> {
        let mut run = RunOptions {
            verbose: self.verbose,
            config_path: self.config,
            ..Default::default()
        };

        run.mode = if self.reset {
            ProgramMode::Reset
        } else if self.manual.is_some() {
            ProgramMode::Manual
        } else if self.print {
            ProgramMode::Print
        } else if self.one_shot {
            ProgramMode::OneShot
        } else {
            ProgramMode::Continual
        };

        if let Some(value) = &self.manual {
            let temp = value
                .trim()
                .parse()
                .map_err(|_| format!("Malformed temperature `{}'.", value))?;
            run.overlay.temp_set = Some(temp);
        }

        if let Some(value) = &self.temperatures {
            let (day, night) = parse_pair::<u32>(value, false)
                .ok_or_else(|| "Malformed temperature argument.".to_string())?;
            run.overlay.temp_day = Some(day);
            run.overlay.temp_night = Some(night);
        }

        if let Some(value) = &self.brightness {
            let (day, night) = parse_pair::<f32>(value, true)
                .ok_or_else(|| "Malformed brightness argument.".to_string())?;
            run.overlay.brightness_day = Some(day);
            run.overlay.brightness_night = Some(night);
        }

        if let Some(value) = self.gamma {
            parse_gamma(&value).map_err(|_| "Malformed gamma argument.".to_string())?;
            run.gamma = Some(value);
        }

        if self.no_transition {
            run.overlay.transition = Some(false);
        }
        if self.preserve {
            run.overlay.preserve_calibrations = Some(true);
        }

        if let Some(value) = &self.method {
            match parse_request(value, "adjustment method", Method::from_name)? {
                Request::List => return Ok(CliAction::ListMethods),
                Request::Help(method) => return Ok(CliAction::MethodHelp(method)),
                Request::Use(method, options) => {
                    run.method = Some(method);
                    run.method_options = options;
                }
            }
        }

        if let Some(value) = &self.location {
            if let Some((lat, lon)) = parse_lat_lon_shorthand(value) {
                run.provider = Some(Provider::Manual);
                run.provider_options = vec![
                    ("lat".to_string(), lat.to_string()),
                    ("lon".to_string(), lon.to_string()),
                ];
            } else {
                match parse_request(value, "location provider", Provider::from_name)? {
                    Request::List => return Ok(CliAction::ListProviders),
                    Request::Help(provider) => return Ok(CliAction::ProviderHelp(provider)),
                    Request::Use(provider, options) => {
                        run.provider = Some(provider);
                        run.provider_options = options;
                    }
                }
            }
        }

        Ok(CliAction::Run(run))
    }
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        let raw = match RawArgs::try_parse_from(&args) {
            Ok(raw) => raw,
            Err(e) => {
                let message = e.to_string();
                let first = message.lines().next().unwrap_or("Invalid arguments");
                Log::log_warning(first.trim_start_matches("error: "));
                return ParsedArgs {
                    action: CliAction::ShowHelpDueToError,
                };
            }
        };

        let action = if raw.version {
            CliAction::ShowVersion
        } else if raw.help {
            CliAction::ShowHelp
        } else {
            raw.into_run_options().unwrap_or_else(|message| {
                Log::log_warning(&message);
                CliAction::ShowHelpDueToError
            })
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    Log::log_version();
    Log::log_pipe();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    Log::log_version();
    Log::log_block_start(env!("CARGO_PKG_DESCRIPTION"));
    Log::log_block_start("Usage: sunshift [OPTIONS]");
    Log::log_block_start("Options:");
    Log::log_indented("-b DAY:NIGHT   Screen brightness to apply (between 0.1 and 1.0)");
    Log::log_indented("-c FILE        Load settings from specified configuration file");
    Log::log_indented("-g R:G:B       Additional gamma correction to apply");
    Log::log_indented("-h             Display this help message");
    Log::log_indented("-l LAT:LON     Your current location");
    Log::log_indented("-l PROVIDER    Select provider for automatic location updates");
    Log::log_indented("               (Type `list' to see available providers)");
    Log::log_indented("-m METHOD      Method to use to set color temperature");
    Log::log_indented("               (Type `list' to see available methods)");
    Log::log_indented("-o             One shot mode (do not continuously adjust)");
    Log::log_indented("-O TEMP        One shot manual mode (set color temperature)");
    Log::log_indented("-p             Print mode (only print parameters and exit)");
    Log::log_indented("-P             Keep existing gamma ramps as the base of adjustments");
    Log::log_indented("-r             Disable fading between color temperatures");
    Log::log_indented("-t DAY:NIGHT   Color temperature to set at daytime/night");
    Log::log_indented("-v             Verbose output");
    Log::log_indented("-V             Show program version");
    Log::log_indented("-x             Reset mode (remove adjustment from screen)");
    Log::log_block_start("Signals:");
    Log::log_indented("SIGUSR1        Toggle adjustments on and off");
    Log::log_indented("SIGUSR2        Reload the configuration file");
    Log::log_end();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliAction {
        let mut full = vec!["sunshift"];
        full.extend_from_slice(args);
        ParsedArgs::parse(full).action
    }

    fn run(args: &[&str]) -> RunOptions {
        match parse(args) {
            CliAction::Run(options) => options,
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_no_args() {
        assert_eq!(parse(&[]), CliAction::Run(RunOptions::default()));
    }

    #[test]
    fn test_parse_help_and_version() {
        assert_eq!(parse(&["-h"]), CliAction::ShowHelp);
        assert_eq!(parse(&["--help"]), CliAction::ShowHelp);
        assert_eq!(parse(&["-V"]), CliAction::ShowVersion);
        // Version takes precedence
        assert_eq!(parse(&["-h", "-V"]), CliAction::ShowVersion);
    }

    #[test]
    fn test_parse_unknown_flag() {
        assert_eq!(parse(&["--unknown"]), CliAction::ShowHelpDueToError);
        assert_eq!(parse(&["-q"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_verbose() {
        assert!(run(&["-v"]).verbose);
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(run(&["-o"]).mode, ProgramMode::OneShot);
        assert_eq!(run(&["-p"]).mode, ProgramMode::Print);
        assert_eq!(run(&["-x"]).mode, ProgramMode::Reset);
        let manual = run(&["-O", "4000"]);
        assert_eq!(manual.mode, ProgramMode::Manual);
        assert_eq!(manual.overlay.temp_set, Some(4000));
        assert_eq!(parse(&["-O", "warm"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_temperatures() {
        let options = run(&["-t", "6000:3000"]);
        assert_eq!(options.overlay.temp_day, Some(6000));
        assert_eq!(options.overlay.temp_night, Some(3000));
        assert_eq!(parse(&["-t", "6000"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_brightness() {
        let both = run(&["-b", "0.7"]);
        assert_eq!(both.overlay.brightness_day, Some(0.7));
        assert_eq!(both.overlay.brightness_night, Some(0.7));

        let pair = run(&["-b", "1.0:0.5"]);
        assert_eq!(pair.overlay.brightness_day, Some(1.0));
        assert_eq!(pair.overlay.brightness_night, Some(0.5));
    }

    #[test]
    fn test_parse_gamma() {
        assert_eq!(run(&["-g", "0.9:1.0:1.1"]).gamma.as_deref(), Some("0.9:1.0:1.1"));
        assert_eq!(parse(&["-g", "a:b"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_parse_flags_into_overlay() {
        let options = run(&["-r", "-P"]);
        assert_eq!(options.overlay.transition, Some(false));
        assert_eq!(options.overlay.preserve_calibrations, Some(true));
    }

    #[test]
    fn test_parse_method_requests() {
        assert_eq!(parse(&["-m", "list"]), CliAction::ListMethods);
        assert_eq!(parse(&["-m", "drm:help"]), CliAction::MethodHelp(Method::Drm));
        assert_eq!(parse(&["-m", "xrandr"]), CliAction::ShowHelpDueToError);

        let options = run(&["-m", "drm:card=1:crtc=0"]);
        assert_eq!(options.method, Some(Method::Drm));
        assert_eq!(
            options.method_options,
            vec![
                ("card".to_string(), "1".to_string()),
                ("crtc".to_string(), "0".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_location_shorthand() {
        let options = run(&["-l", "-33.9:151.2"]);
        assert_eq!(options.provider, Some(Provider::Manual));
        assert_eq!(
            options.provider_options,
            vec![
                ("lat".to_string(), "-33.9".to_string()),
                ("lon".to_string(), "151.2".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_location_requests() {
        assert_eq!(parse(&["-l", "list"]), CliAction::ListProviders);
        assert_eq!(
            parse(&["-l", "city:help"]),
            CliAction::ProviderHelp(Provider::City)
        );
        let options = run(&["-l", "city:name=Oslo"]);
        assert_eq!(options.provider, Some(Provider::City));
        assert_eq!(
            options.provider_options,
            vec![("name".to_string(), "Oslo".to_string())]
        );
    }

    #[test]
    fn test_parse_config_path() {
        let options = run(&["-c", "/tmp/custom.toml"]);
        assert_eq!(options.config_path, Some(PathBuf::from("/tmp/custom.toml")));
    }
}
