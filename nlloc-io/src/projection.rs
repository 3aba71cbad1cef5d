//! Geographic <-> rectangular-frame projection:
//! the five `TRANS` modes, each invertible to within 1e-6 degrees over
//! the grid extent.
//!
//! All modes operate on a spherical Earth, consistent with the
//! spherical `KM2DEG` constant [`nlloc_grid::interp`] already uses for
//! GLOBAL-mode distance conversion, rather than mixing in a separate
//! ellipsoidal model for just this one component.

use std::f64::consts::PI;
use std::str::FromStr;

use hifitime::{Epoch, Unit};

use crate::control::Projection;
use crate::IoError;
use nlloc_loc::hypocenter::Hypocenter;

/// km per degree of arc on the same sphere as
/// [`nlloc_grid::interp::KM2DEG`] (its reciprocal).
pub const KM_PER_DEG: f64 = 1.0 / nlloc_grid::interp::KM2DEG;
/// Mean spherical Earth radius consistent with [`KM_PER_DEG`], km.
pub const EARTH_RADIUS_KM: f64 = KM_PER_DEG * 180.0 / PI;

fn wrap_deg(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}

fn rotate(x: f64, y: f64, rotation_deg: f64) -> (f64, f64) {
    let r = rotation_deg.to_radians();
    (x * r.cos() + y * r.sin(), -x * r.sin() + y * r.cos())
}

fn unrotate(x: f64, y: f64, rotation_deg: f64) -> (f64, f64) {
    rotate(x, y, -rotation_deg)
}

impl Projection {
    /// Geographic (lat, long) in degrees -> search-frame (x, y), km
    /// except for [`Projection::Global`], where there is no
    /// projection and the rectangular frame's units are degrees.
    pub fn geo_to_rect(&self, lat_deg: f64, long_deg: f64) -> (f64, f64) {
        match *self {
            Projection::Global => (long_deg, lat_deg),
            Projection::Simple { lat0, long0, rotation_deg } => {
                let dlong = wrap_deg(long_deg - long0);
                let x = dlong * KM_PER_DEG * lat0.to_radians().cos();
                let y = (lat_deg - lat0) * KM_PER_DEG;
                rotate(x, y, rotation_deg)
            },
            Projection::TransMerc { lat0, long0, rotation_deg } => {
                let (lat, long) = (lat_deg.to_radians(), long_deg.to_radians());
                let (lat0, long0) = (lat0.to_radians(), long0.to_radians());
                let b = lat.cos() * (long - long0).sin();
                let x = EARTH_RADIUS_KM * 0.5 * ((1.0 + b) / (1.0 - b)).ln();
                let y = EARTH_RADIUS_KM * (lat.tan().atan2((long - long0).cos()) - lat0);
                rotate(x, y, rotation_deg)
            },
            Projection::Lambert { std_parallel_1, std_parallel_2, lat0, long0, rotation_deg } => {
                let (phi1, phi2, phi0) = (std_parallel_1.to_radians(), std_parallel_2.to_radians(), lat0.to_radians());
                let (lat, long) = (lat_deg.to_radians(), long_deg.to_radians());
                let long0 = long0.to_radians();
                let n = lambert_n(phi1, phi2);
                let f = lambert_f(phi1, n);
                let rho = lambert_rho(f, n, lat);
                let rho0 = lambert_rho(f, n, phi0);
                let theta = n * (long - long0);
                let x = rho * theta.sin();
                let y = rho0 - rho * theta.cos();
                rotate(x, y, rotation_deg)
            },
            Projection::AzimuthalEquidist { lat0, long0, rotation_deg } => {
                let (lat0, long0) = (lat0.to_radians(), long0.to_radians());
                let (lat, long) = (lat_deg.to_radians(), long_deg.to_radians());
                let cos_c = lat0.sin() * lat.sin() + lat0.cos() * lat.cos() * (long - long0).cos();
                let c = cos_c.clamp(-1.0, 1.0).acos();
                if c.abs() < 1e-12 {
                    return (0.0, 0.0);
                }
                let k = c / c.sin();
                let x = EARTH_RADIUS_KM * k * lat.cos() * (long - long0).sin();
                let y = EARTH_RADIUS_KM * k * (lat0.cos() * lat.sin() - lat0.sin() * lat.cos() * (long - long0).cos());
                rotate(x, y, rotation_deg)
            },
        }
    }

    /// Inverse of [`Self::geo_to_rect`]: search-frame (x, y) -> geographic
    /// (lat, long) in degrees.
    pub fn rect_to_geo(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Projection::Global => (y, x),
            Projection::Simple { lat0, long0, rotation_deg } => {
                let (x, y) = unrotate(x, y, rotation_deg);
                let lat = lat0 + y / KM_PER_DEG;
                let long = long0 + x / (KM_PER_DEG * lat0.to_radians().cos());
                (lat, wrap_deg(long))
            },
            Projection::TransMerc { lat0, long0, rotation_deg } => {
                let (x, y) = unrotate(x, y, rotation_deg);
                let lat0 = lat0.to_radians();
                let long0 = long0.to_radians();
                let d = y / EARTH_RADIUS_KM + lat0;
                let long = long0 + (x / EARTH_RADIUS_KM).sinh().atan2(d.cos());
                let lat = (d.sin() / (x / EARTH_RADIUS_KM).cosh()).clamp(-1.0, 1.0).asin();
                (lat.to_degrees(), wrap_deg(long.to_degrees()))
            },
            Projection::Lambert { std_parallel_1, std_parallel_2, lat0, long0, rotation_deg } => {
                let (x, y) = unrotate(x, y, rotation_deg);
                let (phi1, phi2, phi0) = (std_parallel_1.to_radians(), std_parallel_2.to_radians(), lat0.to_radians());
                let long0 = long0.to_radians();
                let n = lambert_n(phi1, phi2);
                let f = lambert_f(phi1, n);
                let rho0 = lambert_rho(f, n, phi0);
                let rho = n.signum() * (x * x + (rho0 - y).powi(2)).sqrt();
                let theta = x.atan2(rho0 - y);
                let long = long0 + theta / n;
                let lat = 2.0 * (EARTH_RADIUS_KM * f / rho).powf(1.0 / n).atan() - PI / 2.0;
                (lat.to_degrees(), wrap_deg(long.to_degrees()))
            },
            Projection::AzimuthalEquidist { lat0, long0, rotation_deg } => {
                let (x, y) = unrotate(x, y, rotation_deg);
                let (lat0, long0) = (lat0.to_radians(), long0.to_radians());
                let rho = (x * x + y * y).sqrt();
                if rho < 1e-9 {
                    return (lat0.to_degrees(), wrap_deg(long0.to_degrees()));
                }
                let c = rho / EARTH_RADIUS_KM;
                let lat = (c.cos() * lat0.sin() + (y * c.sin() * lat0.cos()) / rho).clamp(-1.0, 1.0).asin();
                let long = long0 + (x * c.sin()).atan2(rho * lat0.cos() * c.cos() - y * lat0.sin() * c.sin());
                (lat.to_degrees(), wrap_deg(long.to_degrees()))
            },
        }
    }
}

fn lambert_t(phi: f64) -> f64 {
    (PI / 4.0 - phi / 2.0).tan()
}

fn lambert_n(phi1: f64, phi2: f64) -> f64 {
    if (phi1 - phi2).abs() < 1e-9 {
        phi1.sin()
    } else {
        (phi1.cos().ln() - phi2.cos().ln()) / (lambert_t(phi1).ln() - lambert_t(phi2).ln())
    }
}

fn lambert_f(phi1: f64, n: f64) -> f64 {
    phi1.cos() * lambert_t(phi1).powf(-n) / n
}

fn lambert_rho(f: f64, n: f64, phi: f64) -> f64 {
    EARTH_RADIUS_KM * f * lambert_t(phi).powf(n)
}

/// Completes a located [`Hypocenter`]'s geographic fields: projects
/// `(x, y)` back to `(latitude, longitude)` under `trans`, and
/// reconstructs the calendar date/time from `reference_date` (the
/// earliest arrival's calendar day) plus the analytically marginalized
/// origin time already carried in `hyp.seconds` (which may fall
/// outside `[0, 86400)` and roll the day over).
pub fn finalize_hypocenter(hyp: &mut Hypocenter, trans: &Projection, reference_date: (i32, u32, u32)) -> Result<(), IoError> {
    let (lat, long) = trans.rect_to_geo(hyp.x, hyp.y);
    hyp.latitude = lat;
    hyp.longitude = long;

    let (ref_year, ref_month, ref_day) = reference_date;
    let epoch_str = format!("{ref_year:04}-{ref_month:02}-{ref_day:02}T00:00:00 UTC");
    let reference_epoch =
    Epoch::from_str(&epoch_str).map_err(|e| IoError::BadReferenceDate(format!("{epoch_str}: {e}")))?;
    let epoch = reference_epoch + hyp.seconds * Unit::Second;
    let (year, month, day, hour, minute, second, nanos) = epoch.to_gregorian_utc();
    hyp.year = year;
    hyp.month = month as u32;
    hyp.day = day as u32;
    hyp.hour = hour as u32;
    hyp.minute = minute as u32;
    hyp.seconds = second as f64 + nanos as f64 * 1e-9;
    Ok(())
}
