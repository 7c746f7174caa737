//! Solar position calculations.
//!
//! [`elevation`] computes the sun's elevation for a point in time and a
//! location using the NOAA solar position equations. Twilight times for
//! display come from the `sunrise` crate.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};
use sunrise::{Coordinates, DawnType, SolarDay, SolarEvent};

const JULIAN_UNIX_EPOCH: f64 = 2440587.5;
const JULIAN_J2000: f64 = 2451545.0;

fn julian_centuries(time: DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + time.timestamp_subsec_nanos() as f64 / 1e9;
    let julian_day = seconds / 86400.0 + JULIAN_UNIX_EPOCH;
    (julian_day - JULIAN_J2000) / 36525.0
}

/// Sun elevation above the horizon in degrees, without refraction.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// // Equator, prime meridian, noon around the March equinox
/// let noon = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
/// let elevation = sunshift::solar::elevation(noon, 0.0, 0.0);
/// assert!(elevation > 85.0);
/// ```
pub fn elevation(time: DateTime<Utc>, lat: f64, lon: f64) -> f64 {
    let t = julian_centuries(time);

    let mean_long = (280.46646 + t * (36000.76983 + t * 0.0003032)).rem_euclid(360.0);
    let mean_anom = 357.52911 + t * (35999.05029 - 0.0001537 * t);
    let eccent = 0.016708634 - t * (0.000042037 + 0.0000001267 * t);

    let m = mean_anom.to_radians();
    let center = m.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * m).sin() * 0.000289;
    let omega = (125.04 - 1934.136 * t).to_radians();
    let apparent_long = (mean_long + center - 0.00569 - 0.00478 * omega.sin()).to_radians();

    let seconds = 21.448 - t * (46.815 + t * (0.00059 - t * 0.001813));
    let mean_obliq = 23.0 + (26.0 + seconds / 60.0) / 60.0;
    let obliq = (mean_obliq + 0.00256 * omega.cos()).to_radians();

    let declination = (obliq.sin() * apparent_long.sin()).asin();

    // Equation of time, in minutes
    let l = mean_long.to_radians();
    let y = (obliq / 2.0).tan().powi(2);
    let eq_time = 4.0
        * (y * (2.0 * l).sin() - 2.0 * eccent * m.sin()
            + 4.0 * eccent * y * m.sin() * (2.0 * l).cos()
            - 0.5 * y * y * (4.0 * l).sin()
            - 1.25 * eccent * eccent * (2.0 * m).sin())
        .to_degrees();

    let minutes = time.num_seconds_from_midnight() as f64 / 60.0;
    let true_solar = (minutes + eq_time + 4.0 * lon).rem_euclid(1440.0);
    let hour_angle = (true_solar / 4.0 - 180.0).to_radians();

    let lat = lat.to_radians();
    let cos_zenith =
        lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos();
    90.0 - cos_zenith.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Civil twilight and sunrise/sunset times for one day, in local time.
#[derive(Debug, Clone, Copy)]
pub struct TwilightTimes {
    pub civil_dawn: DateTime<Local>,
    pub sunrise: DateTime<Local>,
    pub sunset: DateTime<Local>,
    pub civil_dusk: DateTime<Local>,
}

pub fn twilight_times(lat: f64, lon: f64, date: NaiveDate) -> Result<TwilightTimes> {
    let coord = Coordinates::new(lat, lon)
        .ok_or_else(|| anyhow!("Invalid coordinates {:.2}, {:.2}", lat, lon))?;
    let day = SolarDay::new(coord, date);
    let local = |event| day.event_time(event).with_timezone(&Local);

    Ok(TwilightTimes {
        civil_dawn: local(SolarEvent::Dawn(DawnType::Civil)),
        sunrise: local(SolarEvent::Sunrise),
        sunset: local(SolarEvent::Sunset),
        civil_dusk: local(SolarEvent::Dusk(DawnType::Civil)),
    })
}

impl TwilightTimes {
    pub fn log(&self) {
        use crate::logger::Log;
        let fmt = |t: &DateTime<Local>| t.format("%H:%M:%S").to_string();
        Log::log_indented(&format!(
            "Civil dawn {}, sunrise {}",
            fmt(&self.civil_dawn),
            fmt(&self.sunrise)
        ));
        Log::log_indented(&format!(
            "Sunset {}, civil dusk {}",
            fmt(&self.sunset),
            fmt(&self.civil_dusk)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_midnight_at_equator_is_dark() {
        let elevation = elevation(utc(2024, 3, 20, 0, 0), 0.0, 0.0);
        assert!(elevation < -85.0, "got {}", elevation);
    }

    #[test]
    fn test_london_summer_solstice_noon() {
        // Solar noon in London is close to 12:00 UTC; expected ~62 degrees
        let elevation = elevation(utc(2024, 6, 21, 12, 2), 51.5, -0.12);
        assert!((elevation - 61.9).abs() < 1.0, "got {}", elevation);
    }

    #[test]
    fn test_longitude_shifts_solar_noon() {
        // Noon UTC at 90 degrees east is sunset-ish, at 180 it is midnight
        let east = elevation(utc(2024, 3, 20, 12, 0), 0.0, 90.0);
        let antipode = elevation(utc(2024, 3, 20, 12, 0), 0.0, 180.0);
        assert!(east.abs() < 3.0, "got {}", east);
        assert!(antipode < -85.0, "got {}", antipode);
    }

    #[test]
    fn test_polar_night() {
        let elevation = elevation(utc(2024, 12, 21, 12, 0), 80.0, 15.0);
        assert!(elevation < 0.0);
    }

    #[test]
    fn test_twilight_times_are_ordered() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let times = twilight_times(40.7128, -74.0060, date).unwrap();
        assert!(times.civil_dawn < times.sunrise);
        assert!(times.sunrise < times.sunset);
        assert!(times.sunset < times.civil_dusk);
    }

    #[test]
    fn test_twilight_times_reject_bad_coordinates() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        assert!(twilight_times(120.0, 0.0, date).is_err());
    }
}
