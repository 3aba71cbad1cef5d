//! The closed set of search methods and the
//! `LOCSEARCH`/`LOCGRID` parameters shared by all of them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::metropolis::MetropolisConfig;
use crate::octree::{OctreeConfig, SearchBox};

/// Modeled as an enum rather than dynamic dispatch, since the method is
/// chosen once at the start of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SearchMethod {
    Metropolis,
    Octree,
    ///: evaluates every cell of the search grid once, no
    /// adaptive refinement; used as a ground-truth regression fixture.
    GridExhaustive,
    /// Joint multi-event differential-time search.
    Differential,
}

/// `LOCGRID`: origin, step, counts of the search volume.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchGrid {
    pub x0: f64,
    pub y0: f64,
    pub z0: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl SearchGrid {
    pub fn bounds(&self) -> SearchBox {
        SearchBox {
            x_min: self.x0,
            x_max: self.x0 + self.dx * self.nx as f64,
            y_min: self.y0,
            y_max: self.y0 + self.dy * self.ny as f64,
            z_min: self.z0,
            z_max: self.z0 + self.dz * self.nz as f64,
        }
    }

    /// Every cell center, for the GRID-exhaustive method.
    pub fn cell_centers(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        (0..self.nz).flat_map(move |iz| {
                (0..self.ny).flat_map(move |iy| {
                        (0..self.nx).map(move |ix| {
                                (
                                    self.x0 + (ix as f64 + 0.5) * self.dx,
                                    self.y0 + (iy as f64 + 0.5) * self.dy,
                                    self.z0 + (iz as f64 + 0.5) * self.dz,
                                )
                        })
                })
        })
    }
}

/// Per-event search configuration (`LOCSEARCH`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchConfig {
    pub method: SearchMethod,
    pub grid: SearchGrid,
    pub octree: OctreeConfig,
    pub metropolis: MetropolisConfig,
    /// `true` in GLOBAL projection mode, where distance scaling and
    /// azimuth outputs are post-rotated.
    pub global_mode: bool,
    pub geographic_rotation_deg: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_grid_bounds_match_origin_and_extent() {
        let grid = SearchGrid { x0: -5.0, y0: -5.0, z0: 0.0, dx: 1.0, dy: 1.0, dz: 1.0, nx: 10, ny: 10, nz: 10 };
        let bounds = grid.bounds();
        assert_eq!(bounds.x_min, -5.0);
        assert_eq!(bounds.x_max, 5.0);
        assert_eq!(grid.cell_centers().count(), 1000);
    }
}
