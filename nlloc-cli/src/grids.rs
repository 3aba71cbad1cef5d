//! Loads travel-time grids off disk by the `<root>.<phase>.<station>.time`
//! naming convention.

use std::fs;
use std::path::Path;

use log::debug;

use nlloc_grid::desc::GridDesc;
use nlloc_grid::io::{parse_header, read_buffer};
use nlloc_grid::{CascadingGrid, GridCache, GridError};

use crate::CliError;

/// Cache key for a station+phase travel-time grid, matching the title a
/// header parses to.
pub fn grid_key(station: &str, phase: &str) -> String {
    format!("{station}.{phase}.TIME")
}

/// Reads just the header sidecar for `<root>.<phase>.<station>.time`,
/// returning the parsed description and the shared file stem (so a
/// caller can open the `.buf` file itself without re-reading the header).
fn read_header(root: &Path, phase: &str, station: &str) -> Result<(GridDesc, String), CliError> {
    let stem = format!("{}.{phase}.{station}.time", root.display());
    let header_path = format!("{stem}.hdr");
    let header_text = fs::read_to_string(&header_path)
    .map_err(|e| CliError::Grid(format!("reading {header_path}: {e}")))?;
    let desc: GridDesc = parse_header(&header_text, &grid_key(station, phase))
    .map_err(|e| CliError::Grid(e.to_string()))?;
    debug!("loaded grid header {header_path}: {}x{}x{}", desc.x.count(), desc.y.count(), desc.z.count());
    Ok((desc, stem))
}

/// Station position only, from the header sidecar alone (no `.buf` read);
/// used while building the arrival list, before it's known which arrivals
/// actually own a grid.
pub fn station_xyz(root: &Path, phase: &str, station: &str) -> Result<Option<(f64, f64, f64)>, CliError> {
    let (desc, _) = read_header(root, phase, station)?;
    Ok(desc.station_xyz)
}

/// Reads the header, then `acquire`s the grid through `cache` keyed by
/// `grid_key(station, phase)`. A second call for the same station+phase,
/// whether a companion arrival in this event or any arrival in a later
/// event, is served from memory and never touches the `.buf` file.
pub fn load_travel_time_grid_cached(
    cache: &mut GridCache,
    root: &Path,
    phase: &str,
    station: &str,
) -> Result<(CascadingGrid, Option<(f64, f64, f64)>), CliError> {
    let (desc, stem) = read_header(root, phase, station)?;
    let station_xyz = desc.station_xyz;
    let buffer_path = format!("{stem}.buf");
    let grid = cache
    .acquire_or_load(&desc, || {
            let buffer_file = fs::File::open(&buffer_path).map_err(|e| GridError::Io(format!("reading {buffer_path}: {e}")))?;
            read_buffer(&desc, buffer_file)
    })
    .map_err(|e| CliError::Grid(e.to_string()))?;
    Ok((grid, station_xyz))
}
