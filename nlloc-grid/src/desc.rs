//! Grid description: origin, step, counts, semantic type and element
//! representation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::linspace::Linspace;
use crate::GridError;

/// Semantic meaning of a grid's scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GridType {
    /// First-arrival travel time, 3-D.
    Time3D,
    /// First-arrival travel time, radially symmetric 2-D table
    /// (distance, depth).
    Time2D,
    /// Seismic velocity.
    Velocity,
    /// Squared slowness (used by some eikonal solvers).
    SlownessSquared,
    /// Slowness times path length.
    SlownessLength,
    /// Probability density (after normalization).
    ProbDensity,
    /// Misfit.
    Misfit,
    /// Log-likelihood.
    Likelihood,
    /// Generic length field.
    Length,
    /// Packed take-off angles (azimuth, dip, quality).
    Angles,
}

impl GridType {
    /// True for the two travel-time flavors; used by the TT lookup to
    /// reject grids of the wrong semantic type at open-time.
    pub fn is_travel_time(&self) -> bool {
        matches!(self, Self::Time3D | Self::Time2D)
    }
}

/// On-disk/in-memory element representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementType {
    /// Single IEEE-754 scalar per cell; the common case.
    Float32,
    /// Two packed shorts: dip/azimuth/quality bitfields, for
    /// [`GridType::Angles`] grids.
    TakeOffAngles,
    /// Float unless higher precision was requested at grid-build time, in
    /// which case the buffer holds `f64`. The representation is fixed for
    /// the lifetime of the grid (invariant).
    FloatOrDouble { high_precision: bool },
}

impl ElementType {
    /// Byte size of a single element for this representation.
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::TakeOffAngles => 4, // two packed u16
            Self::FloatOrDouble { high_precision } => {
                if *high_precision {
                    8
                } else {
                    4
                }
            },
        }
    }
}

/// One depth level of a [`crate::cascading::CascadingGrid`]: shares (x, y)
/// topology with the grid's base level but may coarsen resolution by an
/// integer power of two.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CascadeLevel {
    /// Depth (z) index in the base (finest) vertical axis at which this
    /// level begins.
    pub z_start: usize,
    /// Depth (z) index (exclusive) at which this level ends.
    pub z_end: usize,
    /// `log2` of the lateral coarsening factor relative to the base
    /// level; 0 means unchanged resolution.
    pub scale_log2: u32,
    /// Number of lateral (x) samples at this level.
    pub nx: usize,
    /// Number of lateral (y) samples at this level.
    pub ny: usize,
}

impl CascadeLevel {
    /// Number of lateral cells at this level.
    pub fn lateral_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Number of vertical samples this level spans.
    pub fn depth_len(&self) -> usize {
        self.z_end.saturating_sub(self.z_start)
    }
}

/// Full description of a rectilinear scalar grid.
///
/// A `GridDesc` never owns the buffer itself: [`crate::cache::GridCache`]
/// or a direct caller owns a `Vec<f32>`/`Vec<f64>` sized from
/// [`GridDesc::element_count`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridDesc {
    /// Cache/companion identity: `"{station}.{phase}.{grid_type}"`.
    pub title: String,
    /// X axis (regular grids only; cascading grids use `levels`).
    pub x: Linspace,
    /// Y axis.
    pub y: Linspace,
    /// Z (depth) axis.
    pub z: Linspace,
    /// Semantic type.
    pub grid_type: GridType,
    /// Element representation, fixed for the grid's lifetime.
    pub element: ElementType,
    /// Non-empty for a cascading grid; empty for a regular grid.
    pub cascade_levels: Vec<CascadeLevel>,
    /// Declared source byte order: `true` when big-endian.
    pub big_endian: bool,
    /// Station location, for 2-D radially-symmetric sheets (
    /// "Read header").
    pub station_xyz: Option<(f64, f64, f64)>,
}

impl GridDesc {
    /// True when this is a cascading grid.
    pub fn is_cascading(&self) -> bool {
        !self.cascade_levels.is_empty()
    }

    /// True when this is the radially-symmetric 2-D table (Ny == 1).
    pub fn is_2d(&self) -> bool {
        self.y.count() == 1 && !self.is_cascading()
    }

    /// Number of scalar elements the backing buffer must hold (
    /// invariant: "buffer size equals Nx*Ny*Nz... or sum over cascade
    /// levels").
    pub fn element_count(&self) -> usize {
        if self.is_cascading() {
            self.cascade_levels
            .iter()
            .map(|l| l.lateral_len() * l.depth_len())
            .sum()
        } else {
            self.x.count() * self.y.count() * self.z.count()
        }
    }

    /// Byte size of the backing buffer.
    pub fn byte_size(&self) -> usize {
        self.element_count() * self.element.byte_size()
    }

    /// Flat index into a regular (non-cascading) grid buffer, row-major
    /// with z slowest then y then x.
    pub fn flat_index(&self, ix: i64, iy: i64, iz: i64) -> Result<usize, GridError> {
        if self.is_cascading() {
            return Err(GridError::BadHeader(
                    "flat_index is only valid for regular grids".to_string(),
            ));
        }
        if ix < 0
        || iy < 0
        || iz < 0
        || ix as usize >= self.x.count()
        || iy as usize >= self.y.count()
        || iz as usize >= self.z.count()
        {
            return Err(GridError::IndexOutOfBounds(ix as i32, iy as i32, iz as i32));
        }
        let (ix, iy, iz) = (ix as usize, iy as usize, iz as usize);
        Ok((iz * self.y.count() + iy) * self.x.count() + ix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_desc() -> GridDesc {
        GridDesc {
            title: "STA.P.TIME".to_string(),
            x: Linspace::new(0.0, 1.0, 10).unwrap(),
            y: Linspace::new(0.0, 1.0, 10).unwrap(),
            z: Linspace::new(0.0, 1.0, 10).unwrap(),
            grid_type: GridType::Time3D,
            element: ElementType::Float32,
            cascade_levels: vec![],
            big_endian: false,
            station_xyz: None,
        }
    }

    #[test]
    fn element_and_byte_counts() {
        let desc = sample_desc();
        assert_eq!(desc.element_count(), 1000);
        assert_eq!(desc.byte_size(), 4000);
    }

    #[test]
    fn flat_index_row_major_z_slowest() {
        let desc = sample_desc();
        assert_eq!(desc.flat_index(0, 0, 0).unwrap(), 0);
        assert_eq!(desc.flat_index(1, 0, 0).unwrap(), 1);
        assert_eq!(desc.flat_index(0, 1, 0).unwrap(), 10);
        assert_eq!(desc.flat_index(0, 0, 1).unwrap(), 100);
        assert!(desc.flat_index(10, 0, 0).is_err());
    }

    #[test]
    fn cascading_element_count_sums_levels() {
        let mut desc = sample_desc();
        desc.cascade_levels = vec![
            CascadeLevel { z_start: 0, z_end: 4, scale_log2: 0, nx: 10, ny: 10 },
            CascadeLevel { z_start: 4, z_end: 10, scale_log2: 1, nx: 5, ny: 5 },
        ];
        assert_eq!(desc.element_count(), 4 * 100 + 6 * 25);
    }
}
