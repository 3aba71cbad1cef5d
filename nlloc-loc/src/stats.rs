//! Posterior statistics from a scatter sample:
//! expectation, covariance, error ellipsoid, horizontal ellipse.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

use crate::hypocenter::{Covariance, Ellipsoid, HorizontalEllipse};

/// Δχ²(3, 68%) — the chi-squared value enclosing 68% probability in 3
/// degrees of freedom.
pub const DELTA_CHI2_3D_68: f64 = 3.53;
/// Δχ²(2, 68%) — 2 degrees of freedom.
pub const DELTA_CHI2_2D_68: f64 = 2.28;

/// Arithmetic mean of the sample positions.
pub fn expectation(samples: &[(f64, f64, f64, f64)]) -> [f64; 3] {
    if samples.is_empty() {
        return [0.0, 0.0, 0.0];
    }
    let n = samples.len() as f64;
    let (sx, sy, sz) = samples.iter().fold((0.0, 0.0, 0.0), |acc, (x, y, z, _)| (acc.0 + x, acc.1 + y, acc.2 + z));
    [sx / n, sy / n, sz / n]
}

/// Centered second moment matrix of the sample positions (
/// "Covariance"), symmetric by construction.
pub fn covariance(samples: &[(f64, f64, f64, f64)], mean: [f64; 3]) -> Covariance {
    if samples.len() < 2 {
        return Covariance::default();
    }
    let n = samples.len() as f64;
    let (mut xx, mut xy, mut xz, mut yy, mut yz, mut zz) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for (x, y, z, _) in samples {
        let dx = x - mean[0];
        let dy = y - mean[1];
        let dz = z - mean[2];
        xx += dx * dx;
        xy += dx * dy;
        xz += dx * dz;
        yy += dy * dy;
        yz += dy * dz;
        zz += dz * dz;
    }
    Covariance { xx: xx / n, xy: xy / n, xz: xz / n, yy: yy / n, yz: yz / n, zz: zz / n }
}

/// Eigen-decomposes the covariance and scales by [`DELTA_CHI2_3D_68`] to
/// produce the three error-ellipsoid semi-axes, encoded as (az, dip,
/// length) per axis. `rotation_deg` is applied in GLOBAL mode so
/// azimuths express geographic north; it is 0 otherwise.
pub fn error_ellipsoid(cov: &Covariance, rotation_deg: f64) -> Ellipsoid {
    let m = Matrix3::new(cov.xx, cov.xy, cov.xz, cov.xy, cov.yy, cov.yz, cov.xz, cov.yz, cov.zz);
    let eigen = SymmetricEigen::new(m);

    let mut axes: Vec<(f64, Vector3<f64>)> = (0..3)
    .map(|i| (eigen.eigenvalues[i].max(0.0), eigen.eigenvectors.column(i).into_owned()))
    .collect();
    axes.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let lengths: Vec<f64> = axes.iter().map(|(val, _)| (val * DELTA_CHI2_3D_68).max(0.0).sqrt()).collect();
    let (az, dip): (Vec<f64>, Vec<f64>) = axes
    .iter()
    .map(|(_, v)| vector_to_az_dip(v, rotation_deg))
    .unzip();

    Ellipsoid {
        az1: az[0],
        dip1: dip[0],
        len1: lengths[0],
        az2: az[1],
        dip2: dip[1],
        len2: lengths[1],
        len3: lengths[2],
    }
}

fn vector_to_az_dip(v: &Vector3<f64>, rotation_deg: f64) -> (f64, f64) {
    let az = v.x.atan2(v.y).to_degrees() + rotation_deg;
    let horizontal = (v.x * v.x + v.y * v.y).sqrt();
    let dip = (-v.z).atan2(horizontal).to_degrees();
    (az.rem_euclid(360.0), dip)
}

/// Same procedure restricted to the (x, y) block, scaled by
/// [`DELTA_CHI2_2D_68`].
pub fn horizontal_ellipse(cov: &Covariance, rotation_deg: f64) -> HorizontalEllipse {
    use nalgebra::Matrix2;
    let m = Matrix2::new(cov.xx, cov.xy, cov.xy, cov.yy);
    let eigen = nalgebra::SymmetricEigen::new(m);
    let mut pairs: Vec<(f64, f64)> = (0..2)
    .map(|i| {
            let v = eigen.eigenvectors.column(i);
            let az = v.x.atan2(v.y).to_degrees() + rotation_deg;
            (eigen.eigenvalues[i].max(0.0), az.rem_euclid(360.0))
    })
    .collect();
    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let len_max = (pairs[0].0 * DELTA_CHI2_2D_68).max(0.0).sqrt();
    let len_min = (pairs[1].0 * DELTA_CHI2_2D_68).max(0.0).sqrt();
    HorizontalEllipse { az_max: pairs[0].1, len_max, len_min }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_on_axes() -> Vec<(f64, f64, f64, f64)> {
        vec![
            (1.0, 0.0, 0.0, 0.0),
            (-1.0, 0.0, 0.0, 0.0),
            (0.0, 2.0, 0.0, 0.0),
            (0.0, -2.0, 0.0, 0.0),
            (0.0, 0.0, 0.5, 0.0),
            (0.0, 0.0, -0.5, 0.0),
        ]
    }

    #[test]
    fn expectation_of_symmetric_samples_is_the_origin() {
        let mean = expectation(&samples_on_axes());
        assert!(mean[0].abs() < 1e-9 && mean[1].abs() < 1e-9 && mean[2].abs() < 1e-9);
    }

    #[test]
    fn covariance_is_diagonal_for_axis_aligned_samples() {
        let samples = samples_on_axes();
        let mean = expectation(&samples);
        let cov = covariance(&samples, mean);
        assert!(cov.xy.abs() < 1e-9);
        assert!(cov.xz.abs() < 1e-9);
        assert!(cov.yz.abs() < 1e-9);
        assert!(cov.yy > cov.xx);
        assert!(cov.xx > cov.zz);
    }

    #[test]
    fn ellipsoid_lengths_are_nonnegative_and_ordered() {
        let samples = samples_on_axes();
        let mean = expectation(&samples);
        let cov = covariance(&samples, mean);
        let ellipsoid = error_ellipsoid(&cov, 0.0);
        assert!(ellipsoid.len1 >= ellipsoid.len2);
        assert!(ellipsoid.len2 >= ellipsoid.len3);
        assert!(ellipsoid.len3 >= 0.0);
    }
}
