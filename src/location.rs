//! Location providers.
//!
//! A provider turns a few options into a latitude/longitude pair. Providers
//! are tried in [`Provider::ALL`] order unless one is requested explicitly.

use anyhow::{Context, Result, anyhow, bail};
use std::path::Path;
use std::sync::OnceLock;
use tzf_rs::DefaultFinder;

use crate::config::OptionList;
use crate::constants::{MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};
use crate::logger::Log;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            bail!(
                "Latitude must be between {:.1} and {:.1}.",
                MIN_LAT,
                MAX_LAT
            );
        }
        if !(MIN_LON..=MAX_LON).contains(&self.lon) {
            bail!(
                "Longitude must be between {:.1} and {:.1}.",
                MIN_LON,
                MAX_LON
            );
        }
        Ok(())
    }

    /// Format as `52.52 N, 13.40 E`.
    pub fn describe(&self) -> String {
        format!(
            "{:.2} {}, {:.2} {}",
            self.lat.abs(),
            if self.lat >= 0.0 { "N" } else { "S" },
            self.lon.abs(),
            if self.lon >= 0.0 { "E" } else { "W" }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Manual,
    City,
    Timezone,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Manual, Provider::City, Provider::Timezone];

    pub fn name(self) -> &'static str {
        match self {
            Provider::Manual => "manual",
            Provider::City => "city",
            Provider::Timezone => "timezone",
        }
    }

    pub fn from_name(name: &str) -> Option<Provider> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    pub fn description(self) -> &'static str {
        match self {
            Provider::Manual => "Specify location manually",
            Provider::City => "Look up a city by name",
            Provider::Timezone => "Guess location from the system time zone",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Provider::Manual => {
                "  lat=N\t\tLatitude\n  lon=N\t\tLongitude\n\nBoth values are expected in degrees, north and east positive."
            }
            Provider::City => "  name=CITY\tCity name, e.g. `Berlin' or `New York'",
            Provider::Timezone => {
                "  zone=TZ\tTime zone name, e.g. `Europe/Berlin'. Defaults to the system time zone."
            }
        }
    }

    /// Resolve a location from this provider's options.
    pub fn locate(self, options: &OptionList) -> Result<Location> {
        let location = match self {
            Provider::Manual => locate_manual(options)?,
            Provider::City => {
                let name = option(options, "name")
                    .ok_or_else(|| anyhow!("No city name given (use name=CITY)."))?;
                find_city(name).ok_or_else(|| anyhow!("Unknown city `{}'.", name))?
            }
            Provider::Timezone => {
                let zone = match option(options, "zone") {
                    Some(zone) => zone.to_string(),
                    None => system_timezone()?,
                };
                locate_timezone(&zone)?
            }
        };
        location.validate()?;
        Ok(location)
    }
}

/// Print the provider list for `-l list`.
pub fn print_provider_list() {
    println!("Available location providers:");
    for provider in Provider::ALL {
        println!("  {:<10} {}", provider.name(), provider.description());
    }
    println!();
    println!("Specify colon-separated options with `-l PROVIDER:OPTIONS'.");
    println!("Try `-l PROVIDER:help' for help.");
}

/// Find a location through `requested`, or through each provider in turn.
///
/// `options_for` yields the options of a provider: config section plus
/// command line arguments.
pub fn locate<F>(requested: Option<Provider>, mut options_for: F) -> Result<(Provider, Location)>
where
    F: FnMut(Provider) -> Result<OptionList>,
{
    if let Some(provider) = requested {
        let options = options_for(provider)?;
        let location = provider
            .locate(&options)
            .with_context(|| format!("Failed to start provider {}.", provider.name()))?;
        return Ok((provider, location));
    }

    for provider in Provider::ALL {
        let attempt = options_for(provider).and_then(|options| provider.locate(&options));
        match attempt {
            Ok(location) => {
                Log::log_decorated(&format!("Using provider `{}'.", provider.name()));
                return Ok((provider, location));
            }
            Err(e) => {
                Log::log_debug(&format!("Provider {} failed: {}", provider.name(), e));
                Log::log_decorated("Trying next provider...");
            }
        }
    }
    bail!("No more location providers to try.")
}

fn option<'a>(options: &'a OptionList, key: &str) -> Option<&'a str> {
    options
        .iter()
        .rev()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn locate_manual(options: &OptionList) -> Result<Location> {
    let mut lat = None;
    let mut lon = None;
    for (key, value) in options {
        let slot = match key.to_ascii_lowercase().as_str() {
            "lat" => &mut lat,
            "lon" => &mut lon,
            _ => bail!("Unknown provider parameter `{}' for manual.", key),
        };
        let parsed: f64 = value
            .parse()
            .map_err(|_| anyhow!("Malformed {} value `{}'.", key, value))?;
        *slot = Some(parsed);
    }
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Location { lat, lon }),
        _ => bail!("Latitude and longitude must be set."),
    }
}

/// Look a city up by name, ignoring case.
pub fn find_city(name: &str) -> Option<Location> {
    let name = name.trim();
    IntoIterator::into_iter(cities::all())
        .find(|city| city.city.eq_ignore_ascii_case(name))
        .map(|city| Location {
            lat: city.latitude,
            lon: city.longitude,
        })
}

fn finder() -> &'static DefaultFinder {
    static FINDER: OnceLock<DefaultFinder> = OnceLock::new();
    FINDER.get_or_init(DefaultFinder::new)
}

/// City part of a zone name: `America/New_York` gives `New York`.
fn zone_city(zone: &str) -> Option<String> {
    zone.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('_', " "))
}

/// Location of the city a time zone is named after.
///
/// Among equally named cities the one inside the zone wins.
pub fn locate_timezone(zone: &str) -> Result<Location> {
    let tz: chrono_tz::Tz = zone
        .parse()
        .map_err(|_| anyhow!("Unknown time zone `{}'.", zone))?;
    let tz_name = tz.name();
    let city_name = zone_city(tz_name)
        .ok_or_else(|| anyhow!("Time zone `{}' does not name a city.", tz_name))?;

    let candidates: Vec<Location> = IntoIterator::into_iter(cities::all())
        .filter(|city| city.city.eq_ignore_ascii_case(&city_name))
        .map(|city| Location {
            lat: city.latitude,
            lon: city.longitude,
        })
        .collect();

    candidates
        .iter()
        .find(|loc| finder().get_tz_name(loc.lon, loc.lat) == tz_name)
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| anyhow!("No known city for time zone `{}'.", tz_name))
}

/// System time zone from `$TZ` or the `/etc/localtime` link.
pub fn system_timezone() -> Result<String> {
    if let Ok(tz) = std::env::var("TZ") {
        let tz = tz.trim_start_matches(':').trim();
        if !tz.is_empty() {
            return Ok(tz.to_string());
        }
    }
    timezone_from_link(Path::new("/etc/localtime"))
        .or_else(|_| {
            std::fs::read_to_string("/etc/timezone")
                .map(|s| s.trim().to_string())
                .context("Failed to read /etc/timezone")
        })
        .context("Unable to determine the system time zone")
}

fn timezone_from_link(path: &Path) -> Result<String> {
    let target = std::fs::read_link(path)
        .with_context(|| format!("{} is not a symlink", path.display()))?;
    let target = target.to_string_lossy();
    target
        .split_once("zoneinfo/")
        .map(|(_, zone)| zone.to_string())
        .ok_or_else(|| anyhow!("{} does not point into zoneinfo", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn opts(pairs: &[(&str, &str)]) -> OptionList {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_manual_provider() {
        let location = Provider::Manual
            .locate(&opts(&[("lat", "52.5"), ("lon", "13.4")]))
            .unwrap();
        assert_eq!(location, Location { lat: 52.5, lon: 13.4 });
    }

    #[test]
    fn test_manual_provider_errors() {
        assert!(Provider::Manual.locate(&opts(&[("lat", "52.5")])).is_err());
        assert!(Provider::Manual
            .locate(&opts(&[("lat", "x"), ("lon", "1")]))
            .is_err());
        let err = Provider::Manual
            .locate(&opts(&[("alt", "1")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown provider parameter `alt' for manual.");
        let err = Provider::Manual
            .locate(&opts(&[("lat", "95"), ("lon", "0")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Latitude must be between -90.0 and 90.0.");
        let err = Provider::Manual
            .locate(&opts(&[("lat", "0"), ("lon", "-200")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Longitude must be between -180.0 and 180.0.");
    }

    #[test]
    fn test_city_provider() {
        let berlin = Provider::City.locate(&opts(&[("name", "berlin")])).unwrap();
        assert!((berlin.lat - 52.5).abs() < 1.0);
        assert!((berlin.lon - 13.4).abs() < 1.0);
        assert!(Provider::City.locate(&opts(&[("name", "Nowhereville Zzz")])).is_err());
        assert!(Provider::City.locate(&Vec::new()).is_err());
    }

    #[test]
    fn test_timezone_provider() {
        let location = locate_timezone("Europe/Paris").unwrap();
        assert!((location.lat - 48.8).abs() < 1.0);
        assert!((location.lon - 2.3).abs() < 1.0);
        assert!(locate_timezone("Mars/Olympus_Mons").is_err());
    }

    #[test]
    fn test_zone_city_name() {
        assert_eq!(zone_city("America/New_York").as_deref(), Some("New York"));
        assert_eq!(zone_city("UTC").as_deref(), Some("UTC"));
    }

    #[test]
    #[serial]
    fn test_system_timezone_from_env() {
        let previous = std::env::var("TZ").ok();
        unsafe { std::env::set_var("TZ", ":Europe/Berlin") };
        assert_eq!(system_timezone().unwrap(), "Europe/Berlin");
        unsafe {
            match previous {
                Some(v) => std::env::set_var("TZ", v),
                None => std::env::remove_var("TZ"),
            }
        }
    }

    #[test]
    fn test_timezone_from_link() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("localtime");
        std::os::unix::fs::symlink("/usr/share/zoneinfo/Asia/Tokyo", &link).unwrap();
        assert_eq!(timezone_from_link(&link).unwrap(), "Asia/Tokyo");
    }

    #[test]
    fn test_fallback_skips_failing_providers() {
        let (provider, location) = locate(None, |p| match p {
            Provider::Manual => Ok(Vec::new()),
            Provider::City => Ok(opts(&[("name", "Tokyo")])),
            Provider::Timezone => Ok(Vec::new()),
        })
        .unwrap();
        assert_eq!(provider, Provider::City);
        assert!((location.lat - 35.7).abs() < 1.0);
    }

    #[test]
    fn test_requested_provider_does_not_fall_back() {
        let result = locate(Some(Provider::Manual), |_| Ok(Vec::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(Provider::from_name("CITY"), Some(Provider::City));
        assert_eq!(Provider::from_name("geoclue"), None);
        assert_eq!(
            Location { lat: -33.9, lon: 151.2 }.describe(),
            "33.90 S, 151.20 E"
        );
    }
}
