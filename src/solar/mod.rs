use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

/// Maximum solar declination, degrees.
const DECLINATION_MAX: f64 = 23.45;

/// Solar declination (degrees) on day of year `doy`.
pub fn declination(doy: u32) -> f64 {
    -DECLINATION_MAX * (2.0 * PI / 365.0 * (doy as f64 + 10.0)).cos()
}

/// Sun zenith angle (degrees) at local solar noon for `latitude` (degrees).
pub fn compute_sza(latitude: f64, doy: u32) -> f64 {
    let lat = latitude.to_radians();
    let delta = declination(doy).to_radians();

    (lat.sin() * delta.sin() + lat.cos() * delta.cos())
        .clamp(-1.0, 1.0)
        .acos()
        .to_degrees()
}

pub fn compute_sza_for_date(latitude: f64, date: NaiveDate) -> f64 {
    compute_sza(latitude, date.ordinal())
}
