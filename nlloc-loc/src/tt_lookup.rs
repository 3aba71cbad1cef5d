//! Travel-time lookup.
//!
//! `TT(arrival, x, y, z) -> seconds | INVALID`, resolved through the
//! companion chain, then a 3-D grid, then a radially-symmetric 2-D
//! sheet, and finally scaled by the arrival's `tfact`.

use nlloc_grid::cascading::CascadingGrid;
use nlloc_grid::{GridError, GRID_INVALID_VALUE, INVALID_INTERP};
use nlloc_obs::Arrival;

/// The grid an arrival owns, when it owns one: the first reference to
/// a given grid owns it, and subsequent identical references store a
/// companion index instead of duplicating it.
#[derive(Debug, Clone)]
pub enum OwnedGrid {
    ThreeD(CascadingGrid),
    TwoD(CascadingGrid),
}

/// Per-event table of owned travel-time grids, indexed the same way as
/// the event's arrival array. Companion arrivals have `None`
/// here and are resolved through [`Arrival::companion_of`].
#[derive(Debug, Clone, Default)]
pub struct TravelTimeTable {
    owned: Vec<Option<OwnedGrid>>,
}

impl TravelTimeTable {
    pub fn new(owned: Vec<Option<OwnedGrid>>) -> Self {
        Self { owned }
    }

    /// Resolution rules, in order:
    /// 1. companion -> delegate,
    /// 2. owned 3-D grid -> trilinear interpolation,
    /// 3. owned 2-D sheet -> distance + bilinear interpolation,
    /// scaled by `arrival.tfact`. Returns [`INVALID_INTERP`] or
    /// [`GRID_INVALID_VALUE`] unscaled by `tfact` is intentionally wrong
    /// so callers must special-case sentinels before scaling -- we scale
    /// only finite, non-sentinel results.
    pub fn travel_time(
        &self,
        arrivals: &[Arrival],
        index: usize,
        x: f64,
        y: f64,
        z: f64,
        global_mode: bool,
    ) -> Result<f64, GridError> {
        let arrival = &arrivals[index];
        let owner_index = self.owner_index(arrivals, index);
        let owned = self.owned[owner_index]
        .as_ref()
        .ok_or_else(|| GridError::BadHeader(format!("arrival {index} has no owned grid")))?;

        let raw = match owned {
            OwnedGrid::ThreeD(grid) => grid.interpolate_3d(x, y, z)?,
            OwnedGrid::TwoD(grid) => {
                let (sx, sy) = grid
                .desc
                .station_xyz
                .map(|(sx, sy, _)| (sx, sy))
                .unwrap_or((0.0, 0.0));
                let distance = nlloc_grid::interp::epicentral_distance(x, y, (sx, sy));
                grid.interpolate_2d(distance, z, global_mode)?
            },
        };

        if raw == INVALID_INTERP || raw <= GRID_INVALID_VALUE {
            return Ok(raw);
        }
        Ok(raw * arrival.tfact)
    }

    /// Follows the companion chain to the arrival that actually owns a
    /// grid buffer.
    fn owner_index(&self, arrivals: &[Arrival], index: usize) -> usize {
        let mut current = index;
        while let Some(parent) = arrivals[current].companion_of {
            current = parent;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlloc_grid::desc::{ElementType, GridDesc, GridType};
    use nlloc_grid::linspace::Linspace;
    use nlloc_obs::{Onset, StationCoords};

    fn linear_tt_grid() -> CascadingGrid {
        let desc = GridDesc {
            title: "STA.P.TIME".to_string(),
            x: Linspace::new(0.0, 1.0, 10).unwrap(),
            y: Linspace::new(0.0, 1.0, 10).unwrap(),
            z: Linspace::new(0.0, 1.0, 10).unwrap(),
            grid_type: GridType::Time3D,
            element: ElementType::Float32,
            cascade_levels: vec![],
            big_endian: false,
            station_xyz: None,
        };
        let mut grid = CascadingGrid::allocate(desc).unwrap();
        for iz in 0..10 {
            for iy in 0..10 {
                for ix in 0..10 {
                    grid.write(ix, iy, iz, 0.1 * (ix + iy + iz) as f64).unwrap();
                }
            }
        }
        grid
    }

    fn sample_arrival(companion_of: Option<usize>, tfact: f64) -> Arrival {
        Arrival {
            label: "STA".to_string(),
            component: "HHZ".to_string(),
            phase: "P".to_string(),
            phase_as_read: "P".to_string(),
            onset: Onset::Impulsive,
            station: StationCoords::default(),
            time_seconds: 0.0,
            sigma: 0.1,
            explicit_sigma: false,
            delay: 0.0,
            prior_weight: 1.0,
            weight: 1.0,
            tfact,
            ignore: false,
            companion_of,
            dd_event_ids: None,
            dd_dtime: None,
            predicted_travel_time: None,
            residual: None,
            distance_km: None,
            azimuth_deg: None,
            ray_azimuth_deg: None,
            ray_dip_deg: None,
            ray_quality: None,
        }
    }

    #[test]
    fn owner_lookup_applies_tfact() {
        let table = TravelTimeTable::new(vec![Some(OwnedGrid::ThreeD(linear_tt_grid()))]);
        let arrivals = vec![sample_arrival(None, 2.0)];
        let tt = table.travel_time(&arrivals, 0, 3.0, 3.0, 3.0, false).unwrap();
        assert!((tt - 2.0 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn companion_delegates_to_owner() {
        let table = TravelTimeTable::new(vec![Some(OwnedGrid::ThreeD(linear_tt_grid())), None]);
        let arrivals = vec![sample_arrival(None, 1.0), sample_arrival(Some(0), 1.0)];
        let direct = table.travel_time(&arrivals, 0, 1.0, 1.0, 1.0, false).unwrap();
        let companion = table.travel_time(&arrivals, 1, 1.0, 1.0, 1.0, false).unwrap();
        assert_eq!(direct, companion);
    }

    #[test]
    fn sentinel_results_are_not_scaled_by_tfact() {
        let table = TravelTimeTable::new(vec![Some(OwnedGrid::ThreeD(linear_tt_grid()))]);
        let arrivals = vec![sample_arrival(None, 3.0)];
        let tt = table.travel_time(&arrivals, 0, 500.0, 500.0, 500.0, false).unwrap();
        assert_eq!(tt, INVALID_INTERP);
    }
}
