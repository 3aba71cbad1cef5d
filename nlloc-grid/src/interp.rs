//! Trilinear (3-D) and bilinear (2-D radially-symmetric) interpolation
//! (Interpolate).

use crate::cascading::CascadingGrid;
use crate::{GridError, GRID_INVALID_VALUE, INVALID_INTERP};

/// Converts world (x, y) relative to a station at `station_xy` into
/// epicentral distance, in km (Interpolate 2-D).
pub fn epicentral_distance(x: f64, y: f64, station_xy: (f64, f64)) -> f64 {
    ((x - station_xy.0).powi(2) + (y - station_xy.1).powi(2)).sqrt()
}

/// km to degrees conversion factor used in GLOBAL projection mode:
/// distance is converted to degrees by multiplying by `KM2DEG`.
pub const KM2DEG: f64 = 1.0 / 111.19492664; // 1 degree of arc on a spherical Earth, km

impl CascadingGrid {
    /// Trilinear interpolation at a real-valued `(x, y, z)` (
    /// "Interpolate (3-D)"). Returns [`INVALID_INTERP`] if the point
    /// falls more than one cell outside the grid; returns
    /// [`GRID_INVALID_VALUE`] if any of the 8 surrounding corners is
    /// itself a sentinel (i.e. <= `GRID_INVALID_VALUE`).
    pub fn interpolate_3d(&self, x: f64, y: f64, z: f64) -> Result<f64, GridError> {
        let desc = &self.desc;
        let fx = desc.x.real_index(x);
        let fy = desc.y.real_index(y);
        let fz = desc.z.real_index(z);

        let nx = desc.x.count() as f64;
        let ny = desc.y.count() as f64;
        let nz = desc.z.count() as f64;

        if fx < -1.0 || fx > nx || fy < -1.0 || fy > ny || fz < -1.0 || fz > nz {
            return Ok(INVALID_INTERP);
        }

        // Clamp onto the upper boundary (edge case: "point
        // exactly on upper boundary is accepted / clamps to Nx-1").
        let ix0 = fx.floor().clamp(0.0, nx - 1.0) as i64;
        let iy0 = fy.floor().clamp(0.0, ny - 1.0) as i64;
        let iz0 = fz.floor().clamp(0.0, nz - 1.0) as i64;
        let ix1 = (ix0 + 1).min(desc.x.count() as i64 - 1);
        let iy1 = (iy0 + 1).min(desc.y.count() as i64 - 1);
        let iz1 = (iz0 + 1).min(desc.z.count() as i64 - 1);

        let tx = (fx - ix0 as f64).clamp(0.0, 1.0);
        let ty = (fy - iy0 as f64).clamp(0.0, 1.0);
        let tz = (fz - iz0 as f64).clamp(0.0, 1.0);

        let mut corners = [0.0f64; 8];
        let coords = [
            (ix0, iy0, iz0),
            (ix1, iy0, iz0),
            (ix0, iy1, iz0),
            (ix1, iy1, iz0),
            (ix0, iy0, iz1),
            (ix1, iy0, iz1),
            (ix0, iy1, iz1),
            (ix1, iy1, iz1),
        ];
        for (i, (cx, cy, cz)) in coords.iter().enumerate() {
            let v = self.read(*cx, *cy, *cz)?;
            if v <= GRID_INVALID_VALUE {
                return Ok(GRID_INVALID_VALUE);
            }
            corners[i] = v;
        }

        let c00 = corners[0] * (1.0 - tx) + corners[1] * tx;
        let c10 = corners[2] * (1.0 - tx) + corners[3] * tx;
        let c01 = corners[4] * (1.0 - tx) + corners[5] * tx;
        let c11 = corners[6] * (1.0 - tx) + corners[7] * tx;

        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;

        Ok(c0 * (1.0 - tz) + c1 * tz)
    }

    /// Bilinear interpolation of a 2-D (distance, z) sheet, used when a
    /// station sits in a 1-D model. The
    /// "X" axis of a 2-D [`crate::desc::GridDesc`] is distance, `Y` is
    /// unused (count == 1), `Z` is depth.
    pub fn interpolate_2d(&self, distance: f64, z: f64, global_mode: bool) -> Result<f64, GridError> {
        let d = if global_mode { distance * KM2DEG } else { distance };
        let desc = &self.desc;
        let fd = desc.x.real_index(d);
        let fz = desc.z.real_index(z);

        let nd = desc.x.count() as f64;
        let nz = desc.z.count() as f64;
        if fd < -1.0 || fd > nd || fz < -1.0 || fz > nz {
            return Ok(INVALID_INTERP);
        }

        let id0 = fd.floor().clamp(0.0, nd - 1.0) as i64;
        let iz0 = fz.floor().clamp(0.0, nz - 1.0) as i64;
        let id1 = (id0 + 1).min(desc.x.count() as i64 - 1);
        let iz1 = (iz0 + 1).min(desc.z.count() as i64 - 1);

        let td = (fd - id0 as f64).clamp(0.0, 1.0);
        let tz = (fz - iz0 as f64).clamp(0.0, 1.0);

        let v00 = self.read(id0, 0, iz0)?;
        let v10 = self.read(id1, 0, iz0)?;
        let v01 = self.read(id0, 0, iz1)?;
        let v11 = self.read(id1, 0, iz1)?;
        if v00 <= GRID_INVALID_VALUE
        || v10 <= GRID_INVALID_VALUE
        || v01 <= GRID_INVALID_VALUE
        || v11 <= GRID_INVALID_VALUE
        {
            return Ok(GRID_INVALID_VALUE);
        }

        let c0 = v00 * (1.0 - td) + v10 * td;
        let c1 = v01 * (1.0 - td) + v11 * td;
        Ok(c0 * (1.0 - tz) + c1 * tz)
    }

    /// Take-off angle lookup: trilinear-nearest on azimuth/dip, refusing
    /// to interpolate when the cell's quality falls below `min_quality`.
    pub fn angles_at(
        &self,
        x: f64,
        y: f64,
        z: f64,
        min_quality: u8,
    ) -> Result<Option<(f64, f64, u8)>, GridError> {
        let desc = &self.desc;
        let ix = desc.x.real_index(x).round().clamp(0.0, desc.x.count() as f64 - 1.0) as i64;
        let iy = desc.y.real_index(y).round().clamp(0.0, desc.y.count() as f64 - 1.0) as i64;
        let iz = desc.z.real_index(z).round().clamp(0.0, desc.z.count() as f64 - 1.0) as i64;
        let (az, dip, q) = self.read_angles(ix, iy, iz)?;
        if q < min_quality {
            return Ok(None);
        }
        Ok(Some((az, dip, q)))
    }
}
