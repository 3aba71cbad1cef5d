//! Batch driver: for every event block in the observation file, resolves
//! arrivals against travel-time grids, runs the orchestrator, and writes
//! the phase/scatter outputs.

use std::fs;
use std::path::Path;

use log::{info, warn};

use nlloc_grid::GridCache;
use nlloc_io::control::Control;
use nlloc_io::diff_time_file::read_diff_observations;
use nlloc_io::obs_file::read_obs_blocks;
use nlloc_io::phase_output::format_phase_block;
use nlloc_io::projection::finalize_hypocenter;
use nlloc_io::residual_file::{format_residual_file, ResidualRow};
use nlloc_io::scatter_file::{write_scatter_file, ScatterSample};
use nlloc_loc::hypocenter::LocationStatus;
use nlloc_loc::likelihood::LocMethConfig;
use nlloc_loc::octree::OctreeConfig;
use nlloc_loc::orchestrator::{locate_event, locate_events_differential, DiffEventInput, OrchestratorConfig};
use nlloc_loc::search::{SearchConfig, SearchMethod};
use nlloc_loc::tt_lookup::{OwnedGrid, TravelTimeTable};
use nlloc_obs::reader::{reject_duplicates, resolve_arrival, RawPick};
use nlloc_obs::{Arrival, PhaseIdTable, StationCoords};

use crate::grids::{load_travel_time_grid_cached, station_xyz};
use crate::CliError;

/// Runs every event found in `obs_text` against `control`, writing
/// outputs under `output_dir`. Returns the count of successfully located
/// events.
pub fn run_batch(control: &Control, obs_text: &str, output_dir: &Path) -> Result<usize, CliError> {
    fs::create_dir_all(output_dir).map_err(|e| CliError::Io(e.to_string()))?;

    let grid_root = Path::new(&control.loc_files.travel_time_grid_root);
    let phase_ids = PhaseIdTable::new(
        control
        .phase_id
        .iter()
        .map(|(canonical, synonyms)| (canonical.clone(), synonyms.clone())),
    );

    let search_method = control.search_method.unwrap_or(SearchMethod::Octree);
    let loc_grid = control.loc_grid.clone().ok_or_else(|| CliError::Control("missing LOCGRID".to_string()))?;

    let orchestrator_cfg = OrchestratorConfig {
        loc_meth: control.loc_meth,
        search: SearchConfig {
            method: search_method,
            grid: loc_grid,
            octree: control.octree,
            metropolis: control.metropolis,
            global_mode: control.trans.is_global(),
            geographic_rotation_deg: control.trans.rotation_deg(),
        },
        station_weight: control.station_weight,
        rng_seed: control.control.rng_seed,
    };

    if search_method == SearchMethod::Differential {
        return run_differential_batch(control, obs_text, output_dir, grid_root, &phase_ids, &orchestrator_cfg);
    }

    let blocks = read_obs_blocks(obs_text);
    let mut located = 0usize;
    // One cache for the whole batch: a station+phase grid opened for one
    // event is still in memory (keyed by `grid_key`) for the next event
    // that needs it, not just for companion arrivals within the same event.
    let mut grid_cache = GridCache::new(0);

    for (block_index, block) in blocks.iter().enumerate() {
        let event_id = block_index as u64 + 1;
        let arrivals = match build_arrivals(&block.picks, grid_root, &phase_ids, control) {
            Ok(arrivals) => arrivals,
            Err(err) => {
                warn!("event {event_id}: failed to resolve arrivals: {err}");
                continue;
            },
        };
        let (mut arrivals, dup_count) = reject_duplicates(arrivals, 0.01);
        if dup_count > 0 {
            info!("event {event_id}: rejected {dup_count} duplicate picks");
        }
        assign_companions(&mut arrivals);

        let reference_date = block
        .picks
        .iter()
        .map(|p| (p.year, p.month, p.day))
        .min()
        .unwrap_or((1970, 1, 1));

        let owned_grids: Vec<_> = arrivals
        .iter()
        .map(|a| {
                if !a.owns_grid() {
                    return None;
                }
                match load_travel_time_grid_cached(&mut grid_cache, grid_root, &a.phase, &a.label) {
                    Ok((grid, _)) => Some(OwnedGrid::ThreeD(grid)),
                    Err(err) => {
                        warn!("event {event_id}: {err}");
                        None
                    },
                }
        })
        .collect();
        let tt = TravelTimeTable::new(owned_grids);

        match locate_event(event_id, arrivals, &tt, &orchestrator_cfg) {
            Ok(mut location) => {
                if let Err(err) = finalize_hypocenter(&mut location.hypocenter, &control.trans, reference_date) {
                    warn!("event {event_id}: failed to finalize geographic/calendar fields: {err}");
                }
                write_location(event_id, &location, output_dir, control)?;
                if location.hypocenter.status == LocationStatus::Located {
                    located += 1;
                }
            },
            Err(err) => warn!("event {event_id}: location failed: {err}"),
        }
    }

    Ok(located)
}

/// Joint multi-event location path for `LOCSEARCH DIFFERENTIAL`: builds
/// one [`DiffEventInput`] per event block found in the observation file,
/// reads the differential-time observation file referenced by
/// `LOCFILES`'s sixth token, and drives
/// [`locate_events_differential`] instead of the per-event loop.
fn run_differential_batch(
    control: &Control,
    obs_text: &str,
    output_dir: &Path,
    grid_root: &Path,
    phase_ids: &PhaseIdTable,
    orchestrator_cfg: &OrchestratorConfig,
) -> Result<usize, CliError> {
    let diff_path = control
    .loc_files
    .diff_time_file
    .as_ref()
    .ok_or_else(|| CliError::Control("LOCSEARCH DIFFERENTIAL requires a differential-time file (LOCFILES 6th argument)".to_string()))?;
    let diff_text = fs::read_to_string(diff_path).map_err(|e| CliError::Io(format!("reading {diff_path}: {e}")))?;
    let (observations, skipped) = read_diff_observations(&diff_text);
    if skipped > 0 {
        warn!("differential time file {diff_path}: {skipped} malformed line(s) skipped");
    }

    let blocks = read_obs_blocks(obs_text);
    let mut grid_cache = GridCache::new(0);
    let mut inputs = Vec::with_capacity(blocks.len());
    let mut reference_dates: std::collections::HashMap<u64, (i32, u32, u32)> = std::collections::HashMap::new();

    for (block_index, block) in blocks.iter().enumerate() {
        let event_id = block_index as u64 + 1;
        let arrivals = match build_arrivals(&block.picks, grid_root, phase_ids, control) {
            Ok(arrivals) => arrivals,
            Err(err) => {
                warn!("event {event_id}: failed to resolve arrivals: {err}");
                continue;
            },
        };
        reference_dates.insert(
            event_id,
            block
            .picks
            .iter()
            .map(|p| (p.year, p.month, p.day))
            .min()
            .unwrap_or((1970, 1, 1)),
        );
        let (mut arrivals, dup_count) = reject_duplicates(arrivals, 0.01);
        if dup_count > 0 {
            info!("event {event_id}: rejected {dup_count} duplicate picks");
        }
        assign_companions(&mut arrivals);

        let owned_grids: Vec<_> = arrivals
        .iter()
        .map(|a| {
                if !a.owns_grid() {
                    return None;
                }
                match load_travel_time_grid_cached(&mut grid_cache, grid_root, &a.phase, &a.label) {
                    Ok((grid, _)) => Some(OwnedGrid::ThreeD(grid)),
                    Err(err) => {
                        warn!("event {event_id}: {err}");
                        None
                    },
                }
        })
        .collect();
        let tt = TravelTimeTable::new(owned_grids);

        inputs.push(DiffEventInput { event_id, arrivals, tt, fixed: false });
    }

    let event_count = inputs.len();
    let (locations, residuals) = locate_events_differential(inputs, observations, orchestrator_cfg, &control.diff_loc)
    .map_err(|e| CliError::Control(format!("differential location failed: {e}")))?;

    let mut located = 0usize;
    for mut location in locations {
        let reference_date = reference_dates.get(&location.event_id).copied().unwrap_or((1970, 1, 1));
        if let Err(err) = finalize_hypocenter(&mut location.hypocenter, &control.trans, reference_date) {
            warn!("event {}: failed to finalize geographic/calendar fields: {err}", location.event_id);
        }
        write_location(location.event_id, &location, output_dir, control)?;
        if location.hypocenter.status == LocationStatus::Located {
            located += 1;
        }
    }

    if control.hyp_out.residual_file {
        let rows: Vec<ResidualRow> = residuals
        .into_iter()
        .map(|r| ResidualRow {
                station: r.station,
                event_i: r.event_i,
                event_j: r.event_j,
                dt_obs: r.dt_obs,
                weight: 1.0 / r.sigma_dt.max(1e-6),
                residual_ms: r.residual_s * 1000.0,
                distance_km: r.distance_km,
        })
        .collect();
        let path = output_dir.join("differential.res");
        fs::write(&path, format_residual_file(&rows)).map_err(|e| CliError::Io(e.to_string()))?;
        info!("wrote {}", path.display());
    }

    info!("differential batch: {event_count} event(s) fed to the joint search, {located} located");
    Ok(located)
}

fn build_arrivals(
    picks: &[RawPick],
    grid_root: &Path,
    phase_ids: &PhaseIdTable,
    control: &Control,
) -> Result<Vec<Arrival>, CliError> {
    let mut arrivals = Vec::with_capacity(picks.len());
    for pick in picks {
        let xyz = station_xyz(grid_root, &phase_ids.canonical(&pick.phase), &pick.label)?;
        let station = match xyz {
            Some((x, y, z)) => StationCoords { x, y, z },
            None => StationCoords::default(),
        };
        let delay = control.delays.get(&pick.label).copied().unwrap_or(0.0);
        let mut arrival = resolve_arrival(pick.clone(), station, phase_ids, &control.qual2err, delay);
        arrival.ignore = control.exclude_stations.contains(&arrival.label)
        || (!control.include_stations.is_empty() && !control.include_stations.contains(&arrival.label));
        arrivals.push(arrival);
    }
    Ok(arrivals)
}

/// Marks every arrival past the first seen for a given station+phase as a
/// companion of that first arrival's index, so the travel-time table opens
/// one grid per station+phase instead of one per arrival.
fn assign_companions(arrivals: &mut [Arrival]) {
    let mut owners: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for i in 0..arrivals.len() {
        let key = arrivals[i].station_phase_key();
        match owners.get(&key) {
            Some(&owner) => arrivals[i].companion_of = Some(owner),
            None => {
                arrivals[i].companion_of = None;
                owners.insert(key, i);
            },
        }
    }
}

fn write_location(
    event_id: u64,
    location: &nlloc_loc::location::Location,
    output_dir: &Path,
    control: &Control,
) -> Result<(), CliError> {
    if control.hyp_out.phase_file {
        let text = format_phase_block(event_id, &location.hypocenter, &location.arrivals);
        let path = output_dir.join(format!("event{event_id}.hyp"));
        fs::write(&path, text).map_err(|e| CliError::Io(e.to_string()))?;
        info!("event {event_id}: wrote {}", path.display());
    }
    if control.hyp_out.scatter_file {
        let samples: Vec<ScatterSample> = location
        .scatter
        .iter()
        .map(|&(x, y, z, ll)| ScatterSample { x: x as f32, y: y as f32, z: z as f32, log_likelihood: ll as f32 })
        .collect();
        let path = output_dir.join(format!("event{event_id}.scat"));
        let mut file = fs::File::create(&path).map_err(|e| CliError::Io(e.to_string()))?;
        write_scatter_file(&mut file, location.hypocenter.probmax as f32, &samples, control.loc_files.swap_bytes)
        .map_err(|e| CliError::Io(e.to_string()))?;
    }
    Ok(())
}
