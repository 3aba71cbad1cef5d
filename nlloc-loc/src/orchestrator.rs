//! Per-event location orchestrator: ties the
//! observation model, travel-time lookup, likelihood evaluator, search
//! method and posterior statistics together into one [`Location`]; also
//! the joint multi-event differential-time entry point.

use std::collections::{HashMap, HashSet};

#[cfg(feature = "logging")]
use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use nlloc_grid::{GRID_INVALID_VALUE, INVALID_INTERP};
use nlloc_obs::weighting::{distance_weight, station_weights, StationWeightConfig};
use nlloc_obs::Arrival;

use crate::diffloc::{DiffLocConfig, DiffLocDriver, DiffObservation, EventState};
use crate::hypocenter::{Hypocenter, LocationStatus};
use crate::likelihood::{self, LocMethConfig};
use crate::location::Location;
use crate::octree::{run_octree, OctreeOutcome};
use crate::metropolis::{run_metropolis, MetropolisOutcome};
use crate::search::SearchMethod;
use crate::stats;
use crate::tt_lookup::TravelTimeTable;
use crate::LocError;

/// Everything the orchestrator needs beyond the arrival set and the
/// travel-time table (steps 3-5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub loc_meth: LocMethConfig,
    pub search: crate::search::SearchConfig,
    pub station_weight: StationWeightConfig,
    pub rng_seed: u64,
}

/// Runs the full per-event workflow: weighting, search,
/// statistics, and the resulting [`Location`]. Reading observations and
/// opening travel-time grids (steps 1-2) happen upstream — the
/// caller supplies the already-filtered `arrivals` and an already-built
/// `tt` table (open via [`nlloc_grid::cache::GridCache`] plus
/// [`nlloc_grid::io`]).
pub fn locate_event(
    event_id: u64,
    mut arrivals: Vec<Arrival>,
    tt: &TravelTimeTable,
    cfg: &OrchestratorConfig,
) -> Result<Location, LocError> {
    let used_count = arrivals.iter().filter(|a| !a.ignore).count();
    if used_count < cfg.loc_meth.min_num_arr_loc {
        return Err(LocError::TooFewArrivals(used_count, cfg.loc_meth.min_num_arr_loc));
    }
    if used_count > cfg.loc_meth.max_num_arr_loc {
        #[cfg(feature = "logging")]
        warn!("event {event_id}: {used_count} readings exceeds the configured maximum; excess is kept but logged");
    }

    apply_weights(&mut arrivals, cfg);

    let bounds = cfg.search.grid.bounds();
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.rng_seed ^ event_id);

    let evaluate = |x: f64, y: f64, z: f64| -> f64 {
        likelihood::evaluate(&cfg.loc_meth, tt, &arrivals, x, y, z, 1.0, cfg.search.global_mode)
        .map(|e| e.log_likelihood)
        .unwrap_or(f64::NEG_INFINITY)
    };

    let (best_xyz, scatter, status, search_info) = match cfg.search.method {
        SearchMethod::Octree => run_octree_method(cfg, bounds, evaluate, &mut rng)?,
        SearchMethod::Metropolis => run_metropolis_method(cfg, bounds, evaluate, &mut rng)?,
        SearchMethod::GridExhaustive => run_grid_exhaustive_method(cfg, evaluate, &mut rng)?,
        SearchMethod::Differential => return Err(LocError::SearchAborted),
    };

    let (x, y, z) = best_xyz;
    finish_location(event_id, x, y, z, 0.0, arrivals, tt, cfg, status, scatter, search_info)
}

/// Evaluates the final candidate, fills per-arrival "save best" detail,
/// and reduces the scatter sample into the posterior statistics that
/// make up a [`Hypocenter`]. Shared by [`locate_event`] and
/// [`locate_events_differential`]; `time_offset` is the per-event
/// `delta_t` in the differential path, `0.0` otherwise.
#[allow(clippy::too_many_arguments)]
fn finish_location(
    event_id: u64,
    x: f64,
    y: f64,
    z: f64,
    time_offset: f64,
    mut arrivals: Vec<Arrival>,
    tt: &TravelTimeTable,
    cfg: &OrchestratorConfig,
    status: LocationStatus,
    scatter: Vec<(f64, f64, f64, f64)>,
    search_info: String,
) -> Result<Location, LocError> {
    let evaluation = likelihood::evaluate(&cfg.loc_meth, tt, &arrivals, x, y, z, 1.0, cfg.search.global_mode)?;
    let details = likelihood::arrival_details(tt, &arrivals, x, y, z, evaluation.origin_time, cfg.search.global_mode)?;
    for (arrival, detail) in arrivals.iter_mut().zip(details.iter()) {
        arrival.predicted_travel_time = detail.predicted_travel_time;
        arrival.residual = detail.residual;
        if let (Some(_), false) = (detail.predicted_travel_time, arrival.ignore) {
            let dx = x - arrival.station.x;
            let dy = y - arrival.station.y;
            let distance = (dx * dx + dy * dy).sqrt();
            arrival.distance_km = Some(distance);
            arrival.azimuth_deg = Some(dx.atan2(dy).to_degrees().rem_euclid(360.0));
        }
    }

    let mean = stats::expectation(&scatter);
    let covariance = stats::covariance(&scatter, mean);
    let rotation = cfg.search.geographic_rotation_deg;
    let ellipsoid = stats::error_ellipsoid(&covariance, if cfg.search.global_mode { rotation } else { 0.0 });
    let horizontal_ellipse = stats::horizontal_ellipse(&covariance, if cfg.search.global_mode { rotation } else { 0.0 });

    let grid_misfit_max = arrivals.iter().filter_map(|a| a.residual.map(f64::abs)).fold(0.0, f64::max);
    let gap_deg = azimuthal_gap(&arrivals);
    let probmax = evaluation.log_likelihood.exp();

    #[cfg(feature = "logging")]
    info!("event {event_id}: located with {} arrivals, rms={:.3}s, status={:?}", evaluation.nreadings, evaluation.rms, status);

    let hypocenter = Hypocenter {
        status,
        x,
        y,
        z,
        latitude: 0.0,
        longitude: 0.0,
        depth_km: z,
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        seconds: evaluation.origin_time + time_offset,
        rms: evaluation.rms,
        gap_deg,
        nreadings: evaluation.nreadings,
        grid_misfit_max,
        probmax,
        expectation: mean,
        covariance,
        ellipsoid,
        horizontal_ellipse,
        scatter_count: scatter.len(),
        search_info,
    };

    Ok(Location { event_id, hypocenter, arrivals, scatter })
}

/// One event's input to [`locate_events_differential`]: its arrivals and
/// already-opened travel-time table, plus whether it's a fixed reference
/// event (not perturbed by the search).
pub struct DiffEventInput {
    pub event_id: u64,
    pub arrivals: Vec<Arrival>,
    pub tt: TravelTimeTable,
    pub fixed: bool,
}

/// One differential-time observation's residual against the located
/// event pair, in the same shape [`crate::diffloc::DiffObservation`]
/// carries plus the computed double-difference residual and epicentral
/// distance.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResidual {
    pub station: String,
    pub event_i: u64,
    pub event_j: u64,
    pub dt_obs: f64,
    pub sigma_dt: f64,
    pub residual_s: f64,
    pub distance_km: f64,
}

/// Joint multi-event location: drives [`DiffLocDriver`]'s round-robin
/// Metropolis search (with an occasional common-move proposal) to
/// convergence, then reduces every event's final state and scatter
/// through [`finish_location`] exactly like the single-event path.
///
/// Matching a differential observation's station to a travel-time
/// lookup is by station label only (`DiffObservation` carries no phase),
/// taking the first arrival in that event with a matching label.
pub fn locate_events_differential(
    mut inputs: Vec<DiffEventInput>,
    observations: Vec<DiffObservation>,
    cfg: &OrchestratorConfig,
    diff_cfg: &DiffLocConfig,
) -> Result<(Vec<Location>, Vec<DiffResidual>), LocError> {
    let known_ids: HashSet<u64> = inputs.iter().map(|i| i.event_id).collect();
    if !observations.is_empty() && !observations.iter().any(|o| known_ids.contains(&o.event_i) && known_ids.contains(&o.event_j)) {
        let obs = &observations[0];
        let unknown = if known_ids.contains(&obs.event_i) { obs.event_j } else { obs.event_i };
        return Err(LocError::UnknownEventId(unknown));
    }

    for input in &mut inputs {
        apply_weights(&mut input.arrivals, cfg);
    }

    let bounds = cfg.search.grid.bounds();
    let start = ((bounds.x_min + bounds.x_max) / 2.0, (bounds.y_min + bounds.y_max) / 2.0, (bounds.z_min + bounds.z_max) / 2.0);

    let events: Vec<EventState> = inputs
    .iter()
    .map(|input| {
            let mut state = EventState::new(input.event_id, start.0, start.1, start.2);
            state.fixed = input.fixed;
            state
    })
    .collect();

    let mut driver = DiffLocDriver::new(events, observations);
    #[cfg(feature = "logging")]
    if driver.unmatched_observations() > 0 {
        warn!("differential search: {} observation(s) reference an unknown event id", driver.unmatched_observations());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(cfg.rng_seed);
    let common_step = diff_cfg.metropolis.step_init;
    let travel_time = |event_id: u64, station: &str, x: f64, y: f64, z: f64| -> Option<f64> {
        let input = inputs.iter().find(|i| i.event_id == event_id)?;
        let index = input.arrivals.iter().position(|a| a.label == station)?;
        let raw = input.tt.travel_time(&input.arrivals, index, x, y, z, cfg.search.global_mode).ok()?;
        if raw == INVALID_INTERP || raw <= GRID_INVALID_VALUE {
            None
        } else {
            Some(raw)
        }
    };

    let mut rounds = 0usize;
    while !driver.all_done() && rounds < diff_cfg.max_events.max(1) {
        if rng.gen::<f64>() < diff_cfg.common_move_probability {
            driver.try_common_move(common_step, travel_time, &mut rng);
        } else {
            driver.round_robin_step(diff_cfg, travel_time, &mut rng);
        }
        rounds += 1;
    }
    if !driver.all_done() {
        #[cfg(feature = "logging")]
        warn!("differential search: round cap ({}) reached before every event converged", diff_cfg.max_events);
        driver.abort_unfinished();
    }

    let events_by_id: HashMap<u64, &EventState> = driver.events().iter().map(|e| (e.event_id, e)).collect();
    let inputs_by_id: HashMap<u64, &DiffEventInput> = inputs.iter().map(|i| (i.event_id, i)).collect();
    let mut residuals = Vec::with_capacity(driver.observations().len());
    for obs in driver.observations() {
        let (Some(&ei), Some(&ej)) = (events_by_id.get(&obs.event_i), events_by_id.get(&obs.event_j)) else { continue };
        let (Some(&input_i), Some(&input_j)) = (inputs_by_id.get(&obs.event_i), inputs_by_id.get(&obs.event_j)) else { continue };
        let Some(idx_i) = input_i.arrivals.iter().position(|a| a.label == obs.station) else { continue };
        let Some(idx_j) = input_j.arrivals.iter().position(|a| a.label == obs.station) else { continue };
        let Ok(tt_i) = input_i.tt.travel_time(&input_i.arrivals, idx_i, ei.x, ei.y, ei.z, cfg.search.global_mode) else { continue };
        let Ok(tt_j) = input_j.tt.travel_time(&input_j.arrivals, idx_j, ej.x, ej.y, ej.z, cfg.search.global_mode) else { continue };
        if tt_i == INVALID_INTERP || tt_i <= GRID_INVALID_VALUE || tt_j == INVALID_INTERP || tt_j <= GRID_INVALID_VALUE {
            continue;
        }
        let residual_s = (obs.dt_obs - (ei.delta_t - ej.delta_t)) - (tt_i - tt_j);
        let station = input_i.arrivals[idx_i].station;
        let dx = ei.x - station.x;
        let dy = ei.y - station.y;
        residuals.push(DiffResidual {
            station: obs.station.clone(),
            event_i: obs.event_i,
            event_j: obs.event_j,
            dt_obs: obs.dt_obs,
            sigma_dt: obs.sigma_dt,
            residual_s,
            distance_km: (dx * dx + dy * dy).sqrt(),
        });
    }

    let mut locations = Vec::with_capacity(inputs.len());
    for (input, event) in inputs.into_iter().zip(driver.events().iter()) {
        let status = if event.aborted { LocationStatus::Aborted } else { LocationStatus::Located };
        let search_info = format!("DIFFERENTIAL accepted={} step={:.4}", event.accepted, event.step);
        let scatter = event.scatter.clone();
        let loc = finish_location(input.event_id, event.x, event.y, event.z, event.delta_t, input.arrivals, &input.tt, cfg, status, scatter, search_info)?;
        locations.push(loc);
    }

    Ok((locations, residuals))
}

/// Distance + station-density weighting, computed once against the
/// search volume's centroid: distance weighting is evaluated against a
/// fixed reference position rather than re-evaluated per candidate, so
/// the weight stays constant through the search.
fn apply_weights(arrivals: &mut [Arrival], cfg: &OrchestratorConfig) {
    let bounds = cfg.search.grid.bounds();
    let cx = (bounds.x_min + bounds.x_max) / 2.0;
    let cy = (bounds.y_min + bounds.y_max) / 2.0;

    let stations: Vec<_> = arrivals.iter().map(|a| a.station).collect();
    let sw = station_weights(&stations, &cfg.station_weight);

    for (arrival, station_weight) in arrivals.iter_mut().zip(sw.iter()) {
        let d = ((arrival.station.x - cx).powi(2) + (arrival.station.y - cy).powi(2)).sqrt();
        let dw = distance_weight(d, cfg.loc_meth.dist_weight_cutoff_km);
        arrival.weight = dw * station_weight * arrival.prior_weight;
    }
}

type SearchOutput = ((f64, f64, f64), Vec<(f64, f64, f64, f64)>, LocationStatus, String);

fn run_octree_method<F: FnMut(f64, f64, f64) -> f64>(
    cfg: &OrchestratorConfig,
    bounds: crate::octree::SearchBox,
    evaluate: F,
    rng: &mut ChaCha8Rng,
) -> Result<SearchOutput, LocError> {
    let result = run_octree(&cfg.search.octree, bounds, evaluate);
    let status = match result.outcome {
        OctreeOutcome::Aborted => return Err(LocError::SearchAborted),
        OctreeOutcome::Rejected => LocationStatus::Rejected,
        OctreeOutcome::Completed => LocationStatus::Located,
    };
    let best = result.best().ok_or(LocError::SearchAborted)?;
    let best_xyz = (best.x, best.y, best.z);
    let scatter = result.draw_scatter(cfg.search.octree.num_scatter, rng);
    let info = format!("OCTREE leaves={} volume={:.3}", result.leaves.len(), result.total_volume);
    Ok((best_xyz, scatter, status, info))
}

fn run_metropolis_method<F: FnMut(f64, f64, f64) -> f64>(
    cfg: &OrchestratorConfig,
    bounds: crate::octree::SearchBox,
    evaluate: F,
    rng: &mut ChaCha8Rng,
) -> Result<SearchOutput, LocError> {
    let start = ((bounds.x_min + bounds.x_max) / 2.0, (bounds.y_min + bounds.y_max) / 2.0, (bounds.z_min + bounds.z_max) / 2.0);
    let cos_lat = if cfg.search.global_mode { Some(start.1.to_radians().cos()) } else { None };
    let km_to_deg = nlloc_grid::interp::KM2DEG;
    let result = run_metropolis(&cfg.search.metropolis, bounds, start, cos_lat, km_to_deg, evaluate, rng);
    match result.outcome {
        MetropolisOutcome::Aborted => Err(LocError::MetropolisAborted(
                100.0 * result.accepted as f64 / cfg.search.metropolis.num_samples.max(1) as f64,
        )),
        MetropolisOutcome::Completed => {
            let best = result.best().ok_or(LocError::SearchAborted)?;
            let status = if on_box_boundary(best.x, best.y, best.z, &bounds) { LocationStatus::Rejected } else { LocationStatus::Located };
            let info = format!("METROPOLIS accepted={} rejected={} clipped={}", result.accepted, result.rejected, result.clipped);
            Ok(((best.x, best.y, best.z), result.scatter, status, info))
        },
    }
}

fn run_grid_exhaustive_method<F: FnMut(f64, f64, f64) -> f64>(
    cfg: &OrchestratorConfig,
    mut evaluate: F,
    rng: &mut ChaCha8Rng,
) -> Result<SearchOutput, LocError> {
    let grid = &cfg.search.grid;
    let mut best = None;
    let mut cells = Vec::with_capacity(grid.nx * grid.ny * grid.nz);
    for (x, y, z) in grid.cell_centers() {
        let ll = evaluate(x, y, z);
        if ll > f64::NEG_INFINITY {
            cells.push((x, y, z, ll));
        }
        match best {
            None => best = Some((x, y, z, ll)),
            Some((_, _, _, best_ll)) if ll > best_ll => best = Some((x, y, z, ll)),
            _ => {},
        }
    }
    let Some((x, y, z, ll)) = best else { return Err(LocError::SearchAborted) };
    if ll == f64::NEG_INFINITY {
        return Err(LocError::SearchAborted);
    }
    let bounds = grid.bounds();
    let status = if on_box_boundary(x, y, z, &bounds) { LocationStatus::Rejected } else { LocationStatus::Located };
    let info = format!("GRID cells={}", grid.nx * grid.ny * grid.nz);
    let scatter = draw_grid_scatter(&cells, cfg.search.octree.num_scatter, rng);
    Ok(((x, y, z), scatter, status, info))
}

/// Likelihood-weighted resample of every evaluated grid cell (weight
/// `exp(ll)`, cells share a uniform volume so it drops out), mirroring
/// `OctreeResult::draw_scatter` so GRID-exhaustive's posterior statistics
/// are computed on the same importance-sampled basis as octree/Metropolis.
fn draw_grid_scatter<R: Rng + ?Sized>(cells: &[(f64, f64, f64, f64)], num: usize, rng: &mut R) -> Vec<(f64, f64, f64, f64)> {
    let total: f64 = cells.iter().map(|c| c.3.exp()).sum();
    if total <= 0.0 || cells.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(num);
    for _ in 0..num {
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = cells[0];
        for cell in cells {
            target -= cell.3.exp();
            chosen = *cell;
            if target <= 0.0 {
                break;
            }
        }
        out.push(chosen);
    }
    out
}

fn on_box_boundary(x: f64, y: f64, z: f64, bounds: &crate::octree::SearchBox) -> bool {
    let eps = 1e-6 * (bounds.x_max - bounds.x_min).max(1.0);
    (x - bounds.x_min).abs() < eps
    || (bounds.x_max - x).abs() < eps
    || (y - bounds.y_min).abs() < eps
    || (bounds.y_max - y).abs() < eps
    || (z - bounds.z_min).abs() < eps
    || (bounds.z_max - z).abs() < eps
}

/// Largest azimuthal gap between stations, in degrees.
fn azimuthal_gap(arrivals: &[Arrival]) -> f64 {
    let mut azimuths: Vec<f64> = arrivals.iter().filter_map(|a| a.azimuth_deg).collect();
    if azimuths.len() < 2 {
        return 360.0;
    }
    azimuths.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut max_gap = 0.0f64;
    for i in 0..azimuths.len() {
        let next = azimuths[(i + 1) % azimuths.len()];
        let gap = if i + 1 == azimuths.len() { 360.0 - azimuths[i] + next } else { next - azimuths[i] };
        max_gap = max_gap.max(gap);
    }
    max_gap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metropolis::MetropolisConfig;
    use crate::octree::OctreeConfig;
    use crate::search::{SearchConfig, SearchGrid};
    use crate::tt_lookup::OwnedGrid;
    use nlloc_grid::cascading::CascadingGrid;
    use nlloc_grid::desc::{ElementType, GridDesc, GridType};
    use nlloc_grid::linspace::Linspace;
    use nlloc_obs::{Onset, StationCoords};

    fn distance_tt_grid(station: (f64, f64)) -> CascadingGrid {
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
                    let d = (((ix as f64 - station.0).powi(2) + (iy as f64 - station.1).powi(2) + (iz as f64).powi(2)).sqrt()) / 6.0;
                    grid.write(ix, iy, iz, d).unwrap();
                }
            }
        }
        grid
    }

    fn arrival(label: &str, station: StationCoords, time: f64) -> Arrival {
        Arrival {
            label: label.to_string(),
            component: "HHZ".to_string(),
            phase: "P".to_string(),
            phase_as_read: "P".to_string(),
            onset: Onset::Impulsive,
            station,
            time_seconds: time,
            sigma: 0.1,
            explicit_sigma: false,
            delay: 0.0,
            prior_weight: 1.0,
            weight: 1.0,
            tfact: 1.0,
            ignore: false,
            companion_of: None,
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
    fn grid_exhaustive_locates_a_trivial_event() {
        let sta1 = StationCoords { x: 2.0, y: 2.0, z: 0.0 };
        let sta2 = StationCoords { x: 8.0, y: 8.0, z: 0.0 };
        let tt = TravelTimeTable::new(vec![
                Some(OwnedGrid::ThreeD(distance_tt_grid((2.0, 2.0)))),
                Some(OwnedGrid::ThreeD(distance_tt_grid((8.0, 8.0)))),
        ]);
        let arrivals = vec![arrival("STA1", sta1, 1.0), arrival("STA2", sta2, 1.0)];

        let grid = SearchGrid { x0: 0.0, y0: 0.0, z0: 0.0, dx: 1.0, dy: 1.0, dz: 1.0, nx: 10, ny: 10, nz: 10 };
        let search = SearchConfig {
            method: SearchMethod::GridExhaustive,
            grid,
            octree: OctreeConfig::default(),
            metropolis: MetropolisConfig::default(),
            global_mode: false,
            geographic_rotation_deg: 0.0,
        };
        let cfg = OrchestratorConfig {
            loc_meth: LocMethConfig { min_num_arr_loc: 2,..LocMethConfig::default() },
            search,
            station_weight: StationWeightConfig::default(),
            rng_seed: 1,
        };

        let location = locate_event(1, arrivals, &tt, &cfg).unwrap();
        assert_eq!(location.hypocenter.status, LocationStatus::Located);
        assert!((location.hypocenter.x - 5.0).abs() < 1.5, "x={}", location.hypocenter.x);
        assert!((location.hypocenter.y - 5.0).abs() < 1.5, "y={}", location.hypocenter.y);
    }

    #[test]
    fn too_few_arrivals_is_rejected_before_search() {
        let sta1 = StationCoords { x: 2.0, y: 2.0, z: 0.0 };
        let tt = TravelTimeTable::new(vec![Some(OwnedGrid::ThreeD(distance_tt_grid((2.0, 2.0))))]);
        let arrivals = vec![arrival("STA1", sta1, 1.0)];
        let grid = SearchGrid { x0: 0.0, y0: 0.0, z0: 0.0, dx: 1.0, dy: 1.0, dz: 1.0, nx: 10, ny: 10, nz: 10 };
        let search = SearchConfig {
            method: SearchMethod::GridExhaustive,
            grid,
            octree: OctreeConfig::default(),
            metropolis: MetropolisConfig::default(),
            global_mode: false,
            geographic_rotation_deg: 0.0,
        };
        let cfg = OrchestratorConfig { loc_meth: LocMethConfig::default(), search, station_weight: StationWeightConfig::default(), rng_seed: 1 };
        let result = locate_event(1, arrivals, &tt, &cfg);
        assert!(matches!(result, Err(LocError::TooFewArrivals(1, 4))));
    }

    fn diff_cfg_for_tests() -> crate::diffloc::DiffLocConfig {
        crate::diffloc::DiffLocConfig {
            metropolis: MetropolisConfig { num_samples: 30, start_save: 5, skip: 1,..MetropolisConfig::default() },
            common_move_probability: 0.1,
            max_events: 500,
        }
    }

    fn base_cfg_for_diff_tests() -> OrchestratorConfig {
        let grid = SearchGrid { x0: 0.0, y0: 0.0, z0: 0.0, dx: 1.0, dy: 1.0, dz: 1.0, nx: 10, ny: 10, nz: 10 };
        let search = SearchConfig {
            method: SearchMethod::Differential,
            grid,
            octree: OctreeConfig::default(),
            metropolis: MetropolisConfig::default(),
            global_mode: false,
            geographic_rotation_deg: 0.0,
        };
        OrchestratorConfig { loc_meth: LocMethConfig { min_num_arr_loc: 1,..LocMethConfig::default() }, search, station_weight: StationWeightConfig::default(), rng_seed: 7 }
    }

    #[test]
    fn locate_events_differential_locates_every_non_fixed_event() {
        let sta = StationCoords { x: 2.0, y: 2.0, z: 0.0 };
        let tt1 = TravelTimeTable::new(vec![Some(OwnedGrid::ThreeD(distance_tt_grid((2.0, 2.0))))]);
        let tt2 = TravelTimeTable::new(vec![Some(OwnedGrid::ThreeD(distance_tt_grid((2.0, 2.0))))]);
        let inputs = vec![
            DiffEventInput { event_id: 1, arrivals: vec![arrival("STA", sta, 1.0)], tt: tt1, fixed: false },
            DiffEventInput { event_id: 2, arrivals: vec![arrival("STA", sta, 1.3)], tt: tt2, fixed: false },
        ];
        let observations = vec![DiffObservation { station: "STA".to_string(), event_i: 1, event_j: 2, dt_obs: 0.3, sigma_dt: 0.05 }];

        let cfg = base_cfg_for_diff_tests();
        let diff_cfg = diff_cfg_for_tests();
        let (locations, residuals) = locate_events_differential(inputs, observations, &cfg, &diff_cfg).unwrap();

        assert_eq!(locations.len(), 2);
        assert_eq!(residuals.len(), 1);
        assert_eq!(residuals[0].event_i, 1);
        assert_eq!(residuals[0].event_j, 2);
    }

    #[test]
    fn locate_events_differential_rejects_a_fully_disconnected_observation_set() {
        let sta = StationCoords { x: 2.0, y: 2.0, z: 0.0 };
        let tt1 = TravelTimeTable::new(vec![Some(OwnedGrid::ThreeD(distance_tt_grid((2.0, 2.0))))]);
        let inputs = vec![DiffEventInput { event_id: 1, arrivals: vec![arrival("STA", sta, 1.0)], tt: tt1, fixed: false }];
        let observations = vec![DiffObservation { station: "STA".to_string(), event_i: 41, event_j: 42, dt_obs: 0.1, sigma_dt: 0.05 }];

        let cfg = base_cfg_for_diff_tests();
        let diff_cfg = diff_cfg_for_tests();
        let result = locate_events_differential(inputs, observations, &cfg, &diff_cfg);
        assert!(matches!(result, Err(LocError::UnknownEventId(_))));
    }
}
