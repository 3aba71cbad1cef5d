//! Grid buffer ownership, element access and cascading-level lookup
//! (Allocate / Read / Write element).

use crate::desc::{ElementType, GridDesc};
use crate::GridError;

#[cfg(feature = "logging")]
use log::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Backing storage for a grid, fixed in numeric type for the grid's
/// lifetime (invariant: "numeric type is fixed for the lifetime
/// of the grid").
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// Packed take-off angles: (azimuth degrees, dip degrees, quality).
    Angles(Vec<(f32, f32, u8)>),
}

impl Buffer {
    fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Angles(v) => v.len(),
        }
    }
}

/// An owned, allocated grid: [`GridDesc`] plus its buffer.
///
/// Named after the cascading variant because every grid in this engine,
/// regular or not, is addressed the same way (a single flat or
/// level-partitioned buffer); a regular grid is simply a `CascadingGrid`
/// with zero levels.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadingGrid {
    pub desc: GridDesc,
    buffer: Buffer,
}

impl CascadingGrid {
    /// Allocates a zero-filled buffer sized from `desc` (
    /// Allocate; fails with a sentinel error standing in for
    /// `OUT_OF_MEMORY`, since Rust allocation failure aborts the process
    /// rather than returning an error — we instead guard against runaway
    /// sizes the caller clearly mis-specified).
    pub fn allocate(desc: GridDesc) -> Result<Self, GridError> {
        let n = desc.element_count();
        const MAX_REASONABLE_ELEMENTS: usize = 1 << 32;
        if n == 0 || n > MAX_REASONABLE_ELEMENTS {
            return Err(GridError::OutOfMemory(desc.title.clone(), n));
        }
        let buffer = match desc.element {
            ElementType::Float32 => Buffer::F32(vec![0.0f32; n]),
            ElementType::FloatOrDouble { high_precision: true } => Buffer::F64(vec![0.0f64; n]),
            ElementType::FloatOrDouble { high_precision: false } => Buffer::F32(vec![0.0f32; n]),
            ElementType::TakeOffAngles => Buffer::Angles(vec![(0.0, 0.0, 0); n]),
        };
        #[cfg(feature = "logging")]
        trace!("allocated grid '{}' ({} elements)", desc.title, n);
        Ok(Self { desc, buffer })
    }

    /// Wraps a pre-filled buffer, checking its size against `desc`
    /// (used by [`crate::io`] after a binary read).
    pub fn from_buffer(desc: GridDesc, buffer: Buffer) -> Result<Self, GridError> {
        let expected = desc.element_count();
        if buffer.len() != expected {
            return Err(GridError::BufferSizeMismatch(expected, buffer.len()));
        }
        Ok(Self { desc, buffer })
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Resolves a (possibly cascading) lateral/depth index triple to a
    /// flat buffer offset. For a cascading grid the lateral index is
    /// floor-divided by `2^scale_log2` of the level covering `iz` before
    /// lookup; this floor-division must be reproduced exactly to keep
    /// byte layouts identical.
    fn resolve_index(&self, ix: i64, iy: i64, iz: i64) -> Result<usize, GridError> {
        if !self.desc.is_cascading() {
            return self.desc.flat_index(ix, iy, iz);
        }
        if ix < 0 || iy < 0 || iz < 0 {
            return Err(GridError::IndexOutOfBounds(ix as i32, iy as i32, iz as i32));
        }
        let iz = iz as usize;
        let mut level_offset = 0usize;
        for level in &self.desc.cascade_levels {
            if iz >= level.z_start && iz < level.z_end {
                let scale = 1i64 << level.scale_log2;
                let lx = ix / scale;
                let ly = iy / scale;
                if lx < 0 || ly < 0 || lx as usize >= level.nx || ly as usize >= level.ny {
                    return Err(GridError::IndexOutOfBounds(ix as i32, iy as i32, iz as i32));
                }
                let local_z = iz - level.z_start;
                let lateral = level.lateral_len();
                return Ok(level_offset + local_z * lateral + (ly as usize) * level.nx + lx as usize);
            }
            level_offset += level.lateral_len() * level.depth_len();
        }
        Err(GridError::NoCascadeLevel(iz as i32))
    }

    /// Reads the scalar value at integer `(ix, iy, iz)` (Read
    /// element). Angle grids return the azimuth component; use
    /// [`CascadingGrid::read_angles`] for the full triple.
    pub fn read(&self, ix: i64, iy: i64, iz: i64) -> Result<f64, GridError> {
        let idx = self.resolve_index(ix, iy, iz)?;
        Ok(match &self.buffer {
                Buffer::F32(v) => v[idx] as f64,
                Buffer::F64(v) => v[idx],
                Buffer::Angles(v) => v[idx].0 as f64,
        })
    }

    /// Reads packed take-off angles `(azimuth_deg, dip_deg, quality)` at
    /// `(ix, iy, iz)`.
    pub fn read_angles(&self, ix: i64, iy: i64, iz: i64) -> Result<(f64, f64, u8), GridError> {
        let idx = self.resolve_index(ix, iy, iz)?;
        match &self.buffer {
            Buffer::Angles(v) => {
                let (az, dip, q) = v[idx];
                Ok((az as f64, dip as f64, q))
            },
            _ => Err(GridError::BadHeader(
                    "read_angles called on a non-angles grid".to_string(),
            )),
        }
    }

    /// Writes the scalar value at integer `(ix, iy, iz)` (Write
    /// element).
    pub fn write(&mut self, ix: i64, iy: i64, iz: i64, value: f64) -> Result<(), GridError> {
        let idx = self.resolve_index(ix, iy, iz)?;
        match &mut self.buffer {
            Buffer::F32(v) => v[idx] = value as f32,
            Buffer::F64(v) => v[idx] = value,
            Buffer::Angles(_) => {
                return Err(GridError::BadHeader(
                        "write(scalar) called on an angles grid; use write_angles".to_string(),
                ))
            },
        }
        Ok(())
    }

    pub fn write_angles(
        &mut self,
        ix: i64,
        iy: i64,
        iz: i64,
        azimuth_deg: f64,
        dip_deg: f64,
        quality: u8,
    ) -> Result<(), GridError> {
        let idx = self.resolve_index(ix, iy, iz)?;
        match &mut self.buffer {
            Buffer::Angles(v) => {
                v[idx] = (azimuth_deg as f32, dip_deg as f32, quality);
                Ok(())
            },
            _ => Err(GridError::BadHeader(
                    "write_angles called on a non-angles grid".to_string(),
            )),
        }
    }

    // ---- grid arithmetic ----

    /// Scalar add/subtract/multiply, in place.
    pub fn scale(&mut self, factor: f64) {
        match &mut self.buffer {
            Buffer::F32(v) => v.iter_mut().for_each(|x| *x *= factor as f32),
            Buffer::F64(v) => v.iter_mut().for_each(|x| *x *= factor),
            Buffer::Angles(_) => {},
        }
    }

    pub fn add_scalar(&mut self, value: f64) {
        match &mut self.buffer {
            Buffer::F32(v) => v.iter_mut().for_each(|x| *x += value as f32),
            Buffer::F64(v) => v.iter_mut().for_each(|x| *x += value),
            Buffer::Angles(_) => {},
        }
    }

    /// Elementwise add of two identically-shaped grids.
    pub fn add_grid(&mut self, other: &CascadingGrid) -> Result<(), GridError> {
        if self.desc.element_count() != other.desc.element_count() {
            return Err(GridError::ShapeMismatch);
        }
        match (&mut self.buffer, &other.buffer) {
            (Buffer::F32(a), Buffer::F32(b)) => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x += *y;
                }
            },
            (Buffer::F64(a), Buffer::F64(b)) => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x += *y;
                }
            },
            _ => return Err(GridError::ShapeMismatch),
        }
        Ok(())
    }

    pub fn sub_grid(&mut self, other: &CascadingGrid) -> Result<(), GridError> {
        if self.desc.element_count() != other.desc.element_count() {
            return Err(GridError::ShapeMismatch);
        }
        match (&mut self.buffer, &other.buffer) {
            (Buffer::F32(a), Buffer::F32(b)) => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x -= *y;
                }
            },
            (Buffer::F64(a), Buffer::F64(b)) => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x -= *y;
                }
            },
            _ => return Err(GridError::ShapeMismatch),
        }
        Ok(())
    }

    /// Converts a misfit grid into a likelihood grid in place:
    /// `L = exp(-1/2 * (misfit/sigma)^2 / n)` (Arithmetic).
    pub fn misfit_to_likelihood(&mut self, sigma: f64, n: f64) {
        let transform = |m: f64| (-0.5 * (m / sigma).powi(2) / n).exp();
        match &mut self.buffer {
            Buffer::F32(v) => v.iter_mut().for_each(|x| *x = transform(*x as f64) as f32),
            Buffer::F64(v) => v.iter_mut().for_each(|x| *x = transform(*x)),
            Buffer::Angles(_) => {},
        }
    }

    /// Normalizes a PDF grid in place so its values sum to 1.
    pub fn normalize_pdf(&mut self) {
        let sum: f64 = match &self.buffer {
            Buffer::F32(v) => v.iter().map(|x| *x as f64).sum(),
            Buffer::F64(v) => v.iter().sum(),
            Buffer::Angles(_) => return,
        };
        if sum > 0.0 {
            self.scale(1.0 / sum);
        }
    }

    /// Iterates `(ix, iy, iz, value)` for every cell of a regular grid.
    /// Cascading grids are iterated level by level by the caller via
    /// [`GridDesc::cascade_levels`]; this is used by the octree's
    /// GRID-exhaustive method (step 4) and by statistics.
    pub fn iter_regular(&self) -> impl Iterator<Item = (usize, usize, usize, f64)> + '_ {
        let (nx, ny, nz) = (self.desc.x.count(), self.desc.y.count(), self.desc.z.count());
        (0..nz).flat_map(move |iz| {
                (0..ny).flat_map(move |iy| {
                        (0..nx).map(move |ix| {
                                let idx = (iz * ny + iy) * nx + ix;
                                let value = match &self.buffer {
                                    Buffer::F32(v) => v[idx] as f64,
                                    Buffer::F64(v) => v[idx],
                                    Buffer::Angles(v) => v[idx].0 as f64,
                                };
                                (ix, iy, iz, value)
                        })
                })
        })
    }

    /// World-space coordinate of cell `(ix, iy, iz)`, from this grid's own
    /// axes (`origin + index * step`).
    fn cell_xyz(&self, ix: usize, iy: usize, iz: usize) -> (f64, f64, f64) {
        (
            self.desc.x.origin + ix as f64 * self.desc.x.step,
            self.desc.y.origin + iy as f64 * self.desc.y.step,
            self.desc.z.origin + iz as f64 * self.desc.z.step,
        )
    }

    /// Expectation of a (regular) PDF grid's own buffer and axes, weighting
    /// each cell by its value: `E[x] = sum(w_i * x_i) / sum(w_i)`. Values
    /// are expected non-negative, as left by [`CascadingGrid::normalize_pdf`].
    /// Returns the grid's own centroid `(origin + (count-1)*step/2)` when
    /// every cell has zero weight.
    pub fn expectation(&self) -> [f64; 3] {
        let mut total = 0.0;
        let mut sum = [0.0; 3];
        for (ix, iy, iz, w) in self.iter_regular() {
            if w <= 0.0 {
                continue;
            }
            let (x, y, z) = self.cell_xyz(ix, iy, iz);
            sum[0] += w * x;
            sum[1] += w * y;
            sum[2] += w * z;
            total += w;
        }
        if total <= 0.0 {
            return [
                (self.desc.x.origin + self.desc.x.end()) / 2.0,
                (self.desc.y.origin + self.desc.y.end()) / 2.0,
                (self.desc.z.origin + self.desc.z.end()) / 2.0,
            ];
        }
        [sum[0] / total, sum[1] / total, sum[2] / total]
    }

    /// Covariance of a (regular) PDF grid's own buffer around `mean`,
    /// mirroring `nlloc_loc::stats::covariance` but summing directly over
    /// the grid's cells instead of a scatter-sample array.
    pub fn covariance(&self, mean: [f64; 3]) -> GridCovariance {
        let mut total = 0.0;
        let mut c = GridCovariance::default();
        for (ix, iy, iz, w) in self.iter_regular() {
            if w <= 0.0 {
                continue;
            }
            let (x, y, z) = self.cell_xyz(ix, iy, iz);
            let (dx, dy, dz) = (x - mean[0], y - mean[1], z - mean[2]);
            c.xx += w * dx * dx;
            c.xy += w * dx * dy;
            c.xz += w * dx * dz;
            c.yy += w * dy * dy;
            c.yz += w * dy * dz;
            c.zz += w * dz * dz;
            total += w;
        }
        if total > 0.0 {
            c.xx /= total;
            c.xy /= total;
            c.xz /= total;
            c.yy /= total;
            c.yz /= total;
            c.zz /= total;
        }
        c
    }
}

/// Covariance of a PDF grid's own buffer, independent of
/// `nlloc_loc::hypocenter::Covariance` since `nlloc-grid` sits below
/// `nlloc-loc` in the workspace's dependency order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridCovariance {
    pub xx: f64,
    pub xy: f64,
    pub xz: f64,
    pub yy: f64,
    pub yz: f64,
    pub zz: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::{CascadeLevel, ElementType, GridType};
    use crate::linspace::Linspace;

    fn regular_desc() -> GridDesc {
        GridDesc {
            title: "STA.P.TIME".to_string(),
            x: Linspace::new(0.0, 1.0, 4).unwrap(),
            y: Linspace::new(0.0, 1.0, 4).unwrap(),
            z: Linspace::new(0.0, 1.0, 4).unwrap(),
            grid_type: GridType::Time3D,
            element: ElementType::Float32,
            cascade_levels: vec![],
            big_endian: false,
            station_xyz: None,
        }
    }

    #[test]
    fn round_trip_read_write() {
        let mut grid = CascadingGrid::allocate(regular_desc()).unwrap();
        grid.write(1, 2, 3, 42.5).unwrap();
        assert_eq!(grid.read(1, 2, 3).unwrap(), 42.5);
        assert!(grid.read(4, 0, 0).is_err());
    }

    #[test]
    fn cascading_floor_division_matches_level_scale() {
        let mut desc = regular_desc();
        desc.cascade_levels = vec![
            CascadeLevel { z_start: 0, z_end: 2, scale_log2: 0, nx: 4, ny: 4 },
            CascadeLevel { z_start: 2, z_end: 4, scale_log2: 1, nx: 2, ny: 2 },
        ];
        let mut grid = CascadingGrid::allocate(desc).unwrap();
        // coarse level: lateral index 3 maps to 3/2 = 1 (floor division)
        grid.write(3, 3, 2, 7.0).unwrap();
        assert_eq!(grid.read(2, 2, 2).unwrap(), 7.0); // 2/2 == 3/2 == 1
        assert_eq!(grid.read(3, 3, 2).unwrap(), 7.0);
    }

    #[test]
    fn misfit_to_likelihood_matches_closed_form() {
        let mut grid = CascadingGrid::allocate(regular_desc()).unwrap();
        grid.write(0, 0, 0, 0.0).unwrap();
        grid.misfit_to_likelihood(1.0, 1.0);
        assert!((grid.read(0, 0, 0).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn add_and_sub_grid_require_matching_shape() {
        let mut a = CascadingGrid::allocate(regular_desc()).unwrap();
        let mut smaller_desc = regular_desc();
        smaller_desc.x = Linspace::new(0.0, 1.0, 2).unwrap();
        let b = CascadingGrid::allocate(smaller_desc).unwrap();
        assert!(a.add_grid(&b).is_err());
        let c = CascadingGrid::allocate(regular_desc()).unwrap();
        assert!(a.add_grid(&c).is_ok());
    }

    #[test]
    fn expectation_matches_the_single_weighted_cell() {
        let mut grid = CascadingGrid::allocate(regular_desc()).unwrap();
        grid.write(2, 1, 3, 1.0).unwrap();
        let mean = grid.expectation();
        assert_eq!(mean, [2.0, 1.0, 3.0]);
        let cov = grid.covariance(mean);
        assert_eq!(cov, GridCovariance::default());
    }

    #[test]
    fn covariance_spreads_with_a_symmetric_two_cell_pdf() {
        let mut grid = CascadingGrid::allocate(regular_desc()).unwrap();
        grid.write(0, 0, 0, 0.5).unwrap();
        grid.write(2, 0, 0, 0.5).unwrap();
        let mean = grid.expectation();
        assert!((mean[0] - 1.0).abs() < 1e-9);
        let cov = grid.covariance(mean);
        assert!((cov.xx - 1.0).abs() < 1e-9);
        assert_eq!(cov.yy, 0.0);
    }

    #[test]
    fn expectation_falls_back_to_the_grid_centroid_when_empty() {
        let grid = CascadingGrid::allocate(regular_desc()).unwrap();
        assert_eq!(grid.expectation(), [1.5, 1.5, 1.5]);
    }
}
