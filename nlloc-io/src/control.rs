//! Control-file semantics, modeled as a
//! `Control` struct tree after `gnss_rtk::cfg::RTKConfig`'s
//! one-function-per-default pattern, plus a line-oriented textual
//! reader. Textual spelling of the original directives is irrelevant
//!; only the semantic parameters are modeled.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::warn;

use nlloc_loc::diffloc::DiffLocConfig;
use nlloc_loc::likelihood::{LikelihoodMethod, LocMethConfig};
use nlloc_loc::metropolis::MetropolisConfig;
use nlloc_loc::octree::OctreeConfig;
use nlloc_loc::search::{SearchGrid, SearchMethod};
use nlloc_obs::weighting::StationWeightConfig;
use nlloc_obs::LocQual2Err;

fn default_message_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

fn default_rng_seed() -> u64 {
    1
}

/// `CONTROL`: message verbosity and RNG seed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlStatement {
    #[cfg_attr(feature = "serde", serde(default = "default_message_level", with = "level_filter_serde"))]
    pub message_level: log::LevelFilter,
    #[cfg_attr(feature = "serde", serde(default = "default_rng_seed"))]
    pub rng_seed: u64,
}

impl Default for ControlStatement {
    fn default() -> Self {
        Self { message_level: default_message_level(), rng_seed: default_rng_seed() }
    }
}

#[cfg(feature = "serde")]
mod level_filter_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(level: &log::LevelFilter, s: S) -> Result<S::Ok, S::Error> {
        level.to_string().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<log::LevelFilter, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `TRANS`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Projection {
    Simple { lat0: f64, long0: f64, rotation_deg: f64 },
    Lambert { std_parallel_1: f64, std_parallel_2: f64, lat0: f64, long0: f64, rotation_deg: f64 },
    TransMerc { lat0: f64, long0: f64, rotation_deg: f64 },
    AzimuthalEquidist { lat0: f64, long0: f64, rotation_deg: f64 },
    Global,
}

impl Default for Projection {
    fn default() -> Self {
        Self::Global
    }
}

impl Projection {
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    pub fn rotation_deg(&self) -> f64 {
        match self {
            Self::Simple { rotation_deg,.. }
            | Self::Lambert { rotation_deg,.. }
            | Self::TransMerc { rotation_deg,.. }
            | Self::AzimuthalEquidist { rotation_deg,.. } => *rotation_deg,
            Self::Global => 0.0,
        }
    }
}

/// `LOCFILES`: I/O file patterns and the global byte-swap flag.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocFiles {
    pub obs_file_pattern: String,
    pub obs_format: String,
    pub travel_time_grid_root: String,
    pub output_root: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub swap_bytes: bool,
    /// Path to the differential-time observation file, required only
    /// when `LOCSEARCH DIFFERENTIAL` is in effect.
    #[cfg_attr(feature = "serde", serde(default))]
    pub diff_time_file: Option<String>,
}

/// `LOCGAU`: the Gaussian error-model base correlation length.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocGau {
    pub sigma_time_s: f64,
    pub correlation_length_km: f64,
}

impl Default for LocGau {
    fn default() -> Self {
        Self { sigma_time_s: 0.1, correlation_length_km: 0.0 }
    }
}

/// `LOCMAG`: Richter/duration magnitude parameters. The
/// site-specific (SED/ETH) magnitude path stays out of scope;
/// this carries only the generic Richter/duration coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocMag {
    pub richter_a: f64,
    pub richter_b: f64,
    pub richter_c: f64,
    pub duration_a: f64,
    pub duration_b: f64,
    pub duration_c: f64,
}

/// `LOCPHSTAT`: post-location residual-statistics parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocPhStat {
    pub rms_max_s: f64,
    pub num_readings_min: usize,
    pub residual_max_s: f64,
}

impl Default for LocPhStat {
    fn default() -> Self {
        Self { rms_max_s: 1.0, num_readings_min: 1, residual_max_s: 10.0 }
    }
}

/// `LOCHYPOUT`: which outputs to write.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocHypOut {
    pub phase_file: bool,
    pub scatter_file: bool,
    pub residual_file: bool,
}

impl Default for LocHypOut {
    fn default() -> Self {
        Self { phase_file: true, scatter_file: true, residual_file: false }
    }
}

/// The full semantic control-file tree.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Control {
    #[cfg_attr(feature = "serde", serde(default))]
    pub control: ControlStatement,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trans: Projection,
    #[cfg_attr(feature = "serde", serde(default))]
    pub loc_files: LocFiles,
    pub loc_grid: Option<SearchGrid>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub search_method: Option<SearchMethod>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub octree: OctreeConfig,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metropolis: MetropolisConfig,
    #[cfg_attr(feature = "serde", serde(default))]
    pub diff_loc: DiffLocConfig,
    #[cfg_attr(feature = "serde", serde(default))]
    pub loc_meth: LocMethConfig,
    #[cfg_attr(feature = "serde", serde(default))]
    pub loc_gau: LocGau,
    /// `LOCPHASEID`: canonical phase -> synonym list.
    #[cfg_attr(feature = "serde", serde(default))]
    pub phase_id: HashMap<String, Vec<String>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub qual2err: LocQual2Err,
    #[cfg_attr(feature = "serde", serde(default))]
    pub loc_mag: LocMag,
    /// `LOCCOMP`: component description, keyed by station.
    #[cfg_attr(feature = "serde", serde(default))]
    pub components: HashMap<String, String>,
    /// `LOCDELAY`: station delay table, seconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub delays: HashMap<String, f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub include_stations: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub exclude_stations: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub phase_stat: LocPhStat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub hyp_out: LocHypOut,
    #[cfg_attr(feature = "serde", serde(default))]
    pub station_weight: StationWeightConfig,
}

/// Builds a [`Control`] from a line-oriented control file: one directive
/// per non-comment, non-blank line, first whitespace-separated token is
/// the directive keyword, the remainder are its parameters. Unknown
/// directives are logged and skipped rather than treated as fatal.
pub fn parse_control_text(text: &str) -> Control {
    let mut control = Control::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else { continue };
        let rest: Vec<&str> = tokens.collect();
        apply_directive(&mut control, keyword, &rest);
    }
    control
}

/// Parses a whitespace-separated slice of `f64` tokens starting at
/// `args[start]`, returning `None` (and leaving `control` unchanged) if
/// any of them fails to parse — a malformed numeric directive is
/// skipped like an unrecognized one rather than panicking.
fn parse_f64s<const N: usize>(args: &[&str], start: usize) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    for i in 0..N {
        out[i] = args.get(start + i)?.parse().ok()?;
    }
    Some(out)
}

fn apply_directive(control: &mut Control, keyword: &str, args: &[&str]) {
    match keyword.to_uppercase().as_str() {
        "CONTROL" => {
            if let Some(level) = args.first().and_then(|s| s.parse().ok()) {
                control.control.message_level = level;
            }
            if let Some(seed) = args.get(1).and_then(|s| s.parse().ok()) {
                control.control.rng_seed = seed;
            }
        },
        "TRANS" => apply_trans(control, args),
        "LOCFILES" => {
            if args.len() >= 4 {
                control.loc_files = LocFiles {
                    obs_file_pattern: args[0].to_string(),
                    obs_format: args[1].to_string(),
                    travel_time_grid_root: args[2].to_string(),
                    output_root: args[3].to_string(),
                    swap_bytes: args.get(4).map(|s| *s == "1").unwrap_or(false),
                    diff_time_file: args.get(5).map(|s| s.to_string()),
                };
            } else {
                warn!("LOCFILES requires 4 arguments, got {}", args.len());
            }
        },
        "LOCGRID" => {
            if let Some([x0, y0, z0, dx, dy, dz]) = parse_f64s::<6>(args, 0) {
                let counts = (args.get(6).and_then(|s| s.parse::<usize>().ok()), args.get(7).and_then(|s| s.parse::<usize>().ok()), args.get(8).and_then(|s| s.parse::<usize>().ok()));
                if let (Some(nx), Some(ny), Some(nz)) = counts {
                    control.loc_grid = Some(SearchGrid { x0, y0, z0, dx, dy, dz, nx, ny, nz });
                } else {
                    warn!("LOCGRID counts missing or malformed, directive skipped");
                }
            } else {
                warn!("LOCGRID origin/step missing or malformed, directive skipped");
            }
        },
        "LOCSEARCH" => apply_locsearch(control, args),
        "LOCMETH" => apply_locmeth(control, args),
        "LOCGAU" => {
            if let Some([sigma_time_s, correlation_length_km]) = parse_f64s::<2>(args, 0) {
                control.loc_gau = LocGau { sigma_time_s, correlation_length_km };
            } else {
                warn!("LOCGAU requires 2 numeric arguments, directive skipped");
            }
        },
        "LOCPHASEID" => {
            if let Some((canonical, synonyms)) = args.split_first() {
                control
                .phase_id
                .entry(canonical.to_string())
                .or_default()
                .extend(synonyms.iter().map(|s| s.to_string()));
            }
        },
        "LOCQUAL2ERR" => {
            if let Some(classes) = parse_f64s::<5>(args, 0) {
                control.qual2err = LocQual2Err { classes };
            } else {
                warn!("LOCQUAL2ERR requires 5 numeric arguments, directive skipped");
            }
        },
        "LOCMAG" => {
            if let Some([richter_a, richter_b, richter_c, duration_a, duration_b, duration_c]) = parse_f64s::<6>(args, 0) {
                control.loc_mag = LocMag { richter_a, richter_b, richter_c, duration_a, duration_b, duration_c };
            } else {
                warn!("LOCMAG requires 6 numeric arguments, directive skipped");
            }
        },
        "LOCCOMP" => {
            if let Some((station, description)) = args.split_first() {
                control.components.insert(station.to_string(), description.join(" "));
            }
        },
        "LOCPHSTAT" => {
            if let Some([rms_max_s, residual_max_s]) = parse_f64s::<2>(args, 0) {
                let num_readings_min = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1);
                control.phase_stat = LocPhStat { rms_max_s, num_readings_min, residual_max_s };
            } else {
                warn!("LOCPHSTAT requires at least 2 numeric arguments, directive skipped");
            }
        },
        "LOCHYPOUT" => {
            if args.len() >= 3 {
                control.hyp_out = LocHypOut {
                    phase_file: args[0] == "1",
                    scatter_file: args[1] == "1",
                    residual_file: args[2] == "1",
                };
            } else {
                warn!("LOCHYPOUT requires 3 flag arguments, directive skipped");
            }
        },
        "LOCSTAWT" => {
            if let Some([radius_km, decay_km]) = parse_f64s::<2>(args, 0) {
                control.station_weight = StationWeightConfig { radius_km, decay_km };
            } else {
                warn!("LOCSTAWT requires 2 numeric arguments, directive skipped");
            }
        },
        "LOCEXCLUDE" => control.exclude_stations.extend(args.iter().map(|s| s.to_string())),
        "LOCINCLUDE" => control.include_stations.extend(args.iter().map(|s| s.to_string())),
        "LOCDELAY" => {
            if let (Some(station), Some(delay)) = (args.first(), args.get(1).and_then(|s| s.parse::<f64>().ok())) {
                control.delays.insert(station.to_string(), delay);
            }
        },
        _ => {
            warn!("unrecognized control directive '{keyword}', skipped");
            let _ = args;
        },
    }
}

/// `TRANS <mode> <params...>`. Parameter order
/// per mode: `SIMPLE lat0 long0 rotation_deg`; `LAMBERT std_parallel_1
/// std_parallel_2 lat0 long0 rotation_deg`; `TRANS_MERC lat0 long0
/// rotation_deg`; `AZIMUTHAL_EQUIDIST lat0 long0 rotation_deg`; `GLOBAL`.
fn apply_trans(control: &mut Control, args: &[&str]) {
    let Some(mode) = args.first() else {
        warn!("TRANS requires a mode keyword, directive skipped");
        return;
    };
    control.trans = match mode.to_uppercase().as_str() {
        "GLOBAL" => Projection::Global,
        "SIMPLE" => match parse_f64s::<3>(args, 1) {
            Some([lat0, long0, rotation_deg]) => Projection::Simple { lat0, long0, rotation_deg },
            None => {
                warn!("TRANS SIMPLE requires lat0 long0 rotation_deg, directive skipped");
                return;
            },
        },
        "LAMBERT" => match parse_f64s::<5>(args, 1) {
            Some([std_parallel_1, std_parallel_2, lat0, long0, rotation_deg]) => {
                Projection::Lambert { std_parallel_1, std_parallel_2, lat0, long0, rotation_deg }
            },
            None => {
                warn!("TRANS LAMBERT requires 5 numeric arguments, directive skipped");
                return;
            },
        },
        "TRANS_MERC" => match parse_f64s::<3>(args, 1) {
            Some([lat0, long0, rotation_deg]) => Projection::TransMerc { lat0, long0, rotation_deg },
            None => {
                warn!("TRANS TRANS_MERC requires lat0 long0 rotation_deg, directive skipped");
                return;
            },
        },
        "AZIMUTHAL_EQUIDIST" => match parse_f64s::<3>(args, 1) {
            Some([lat0, long0, rotation_deg]) => Projection::AzimuthalEquidist { lat0, long0, rotation_deg },
            None => {
                warn!("TRANS AZIMUTHAL_EQUIDIST requires lat0 long0 rotation_deg, directive skipped");
                return;
            },
        },
        other => {
            warn!("unrecognized TRANS mode '{other}', directive skipped");
            return;
        },
    };
}

/// `LOCSEARCH <method> <params...>`. `METROPOLIS num_samples
/// start_save skip step_init step_max velocity initial_temperature`;
/// `OCTREE nx_init ny_init nz_init min_node_size max_num_cells
/// coverage_fraction num_scatter`; `GRID`; `DIFFERENTIAL` optionally
/// takes the same seven `METROPOLIS` parameters plus
/// `common_move_probability max_events`; given with no parameters at
/// all it just selects the method and leaves `diff_loc` at its default.
fn apply_locsearch(control: &mut Control, args: &[&str]) {
    let Some(method) = args.first() else {
        warn!("LOCSEARCH requires a method keyword, directive skipped");
        return;
    };
    match method.to_uppercase().as_str() {
        "METROPOLIS" => {
            let num_samples = args.get(1).and_then(|s| s.parse().ok());
            let start_save = args.get(2).and_then(|s| s.parse().ok());
            let skip = args.get(3).and_then(|s| s.parse().ok());
            match (num_samples, start_save, skip, parse_f64s::<4>(args, 4)) {
                (Some(num_samples), Some(start_save), Some(skip), Some([step_init, step_max, velocity, initial_temperature])) => {
                    control.search_method = Some(SearchMethod::Metropolis);
                    control.metropolis = MetropolisConfig { num_samples, start_save, skip, step_init, step_max, velocity, initial_temperature };
                },
                _ => warn!("LOCSEARCH METROPOLIS has malformed arguments, directive skipped"),
            }
        },
        "OCTREE" => {
            let nx_init = args.get(1).and_then(|s| s.parse().ok());
            let ny_init = args.get(2).and_then(|s| s.parse().ok());
            let nz_init = args.get(3).and_then(|s| s.parse().ok());
            let max_num_cells = args.get(5).and_then(|s| s.parse().ok());
            let num_scatter = args.get(7).and_then(|s| s.parse().ok());
            match (nx_init, ny_init, nz_init, args.get(4).and_then(|s| s.parse::<f64>().ok()), max_num_cells, args.get(6).and_then(|s| s.parse::<f64>().ok()), num_scatter) {
                (Some(nx_init), Some(ny_init), Some(nz_init), Some(min_node_size), Some(max_num_cells), Some(coverage_fraction), Some(num_scatter)) => {
                    control.search_method = Some(SearchMethod::Octree);
                    control.octree = OctreeConfig { nx_init, ny_init, nz_init, min_node_size, max_num_cells, coverage_fraction, num_scatter };
                },
                _ => warn!("LOCSEARCH OCTREE has malformed arguments, directive skipped"),
            }
        },
        "GRID" => control.search_method = Some(SearchMethod::GridExhaustive),
        "DIFFERENTIAL" => {
            control.search_method = Some(SearchMethod::Differential);
            let num_samples = args.get(1).and_then(|s| s.parse().ok());
            let start_save = args.get(2).and_then(|s| s.parse().ok());
            let skip = args.get(3).and_then(|s| s.parse().ok());
            match (num_samples, start_save, skip, parse_f64s::<4>(args, 4)) {
                (Some(num_samples), Some(start_save), Some(skip), Some([step_init, step_max, velocity, initial_temperature])) => {
                    let metropolis = MetropolisConfig { num_samples, start_save, skip, step_init, step_max, velocity, initial_temperature };
                    let common_move_probability = args.get(8).and_then(|s| s.parse().ok()).unwrap_or(DiffLocConfig::default().common_move_probability);
                    let max_events = args.get(9).and_then(|s| s.parse().ok()).unwrap_or(DiffLocConfig::default().max_events);
                    control.diff_loc = DiffLocConfig { metropolis, common_move_probability, max_events };
                },
                (None, None, None, None) => {},
                _ => warn!("LOCSEARCH DIFFERENTIAL has malformed arguments, defaults kept"),
            }
        },
        other => warn!("unrecognized LOCSEARCH method '{other}', directive skipped"),
    }
}

/// `LOCMETH <method> <dist_weight_cutoff_km|-1> <min_num_arr_loc>
/// <max_num_arr_loc> <min_sigma> <reject_misfit_above_rms:0|1>
/// <weight_like_by_misfit:0|1>`. See [`LikelihoodMethod`] and
/// [`LocMethConfig`] for field semantics.
fn apply_locmeth(control: &mut Control, args: &[&str]) {
    let Some(method_token) = args.first() else {
        warn!("LOCMETH requires a method keyword, directive skipped");
        return;
    };
    let method = match method_token.to_uppercase().as_str() {
        "GAU_ANALYTIC" => LikelihoodMethod::GauAnalytic,
        "L1" => LikelihoodMethod::L1Norm,
        "EDT" => LikelihoodMethod::Edt,
        other => {
            warn!("unrecognized LOCMETH method '{other}', directive skipped");
            return;
        },
    };
    let dist_weight_cutoff_km = match args.get(1) {
        Some(&"-1") | None => None,
        Some(token) => match token.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("LOCMETH dist_weight_cutoff_km malformed, directive skipped");
                return;
            },
        },
    };
    let (min_num_arr_loc, max_num_arr_loc, min_sigma) = (
        args.get(2).and_then(|s| s.parse().ok()),
        args.get(3).and_then(|s| s.parse().ok()),
        args.get(4).and_then(|s| s.parse::<f64>().ok()),
    );
    match (min_num_arr_loc, max_num_arr_loc, min_sigma) {
        (Some(min_num_arr_loc), Some(max_num_arr_loc), Some(min_sigma)) => {
            control.loc_meth = LocMethConfig {
                method,
                dist_weight_cutoff_km,
                min_num_arr_loc,
                max_num_arr_loc,
                min_sigma,
                reject_misfit_above_rms: args.get(5).map(|s| *s == "1").unwrap_or(false),
                weight_like_by_misfit: args.get(6).map(|s| *s == "1").unwrap_or(false),
            };
        },
        _ => warn!("LOCMETH has malformed arguments, directive skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_directives_are_skipped_not_fatal() {
        let control = parse_control_text("FROBNICATE foo bar\nLOCEXCLUDE STA9\n");
        assert_eq!(control.exclude_stations, vec!["STA9".to_string()]);
    }

    #[test]
    fn locfiles_directive_is_parsed() {
        let control = parse_control_text("LOCFILES obs.txt NLLOC_OBS ttgrids/ out/ 0\n");
        assert_eq!(control.loc_files.obs_format, "NLLOC_OBS");
        assert!(!control.loc_files.swap_bytes);
    }

    #[test]
    fn include_takes_precedence_is_a_reader_concern_not_parsed_here() {
        let control = parse_control_text("LOCINCLUDE STA1 STA2\n");
        assert_eq!(control.include_stations.len(), 2);
    }

    #[test]
    fn locgrid_directive_populates_the_search_grid() {
        let control = parse_control_text("LOCGRID -20.0 -20.0 0.0 1.0 1.0 1.0 41 41 21\n");
        let grid = control.loc_grid.expect("LOCGRID should be parsed");
        assert_eq!(grid.nx, 41);
        assert_eq!(grid.dz, 1.0);
    }

    #[test]
    fn locgrid_malformed_is_skipped_not_fatal() {
        let control = parse_control_text("LOCGRID -20.0 -20.0\n");
        assert!(control.loc_grid.is_none());
    }

    #[test]
    fn trans_simple_is_parsed() {
        let control = parse_control_text("TRANS SIMPLE 46.5 7.3 15.0\n");
        match control.trans {
            Projection::Simple { lat0, long0, rotation_deg } => {
                assert_eq!(lat0, 46.5);
                assert_eq!(long0, 7.3);
                assert_eq!(rotation_deg, 15.0);
            },
            other => panic!("expected Simple, got {other:?}"),
        }
    }

    #[test]
    fn trans_global_is_parsed() {
        let control = parse_control_text("TRANS GLOBAL\n");
        assert!(control.trans.is_global());
    }

    #[test]
    fn trans_lambert_is_parsed() {
        let control = parse_control_text("TRANS LAMBERT 40.0 50.0 45.0 10.0 0.0\n");
        match control.trans {
            Projection::Lambert { std_parallel_1, std_parallel_2,.. } => {
                assert_eq!(std_parallel_1, 40.0);
                assert_eq!(std_parallel_2, 50.0);
            },
            other => panic!("expected Lambert, got {other:?}"),
        }
    }

    #[test]
    fn locsearch_octree_is_parsed() {
        let control = parse_control_text("LOCSEARCH OCTREE 10 10 6 0.02 30000 0.001 6000\n");
        assert_eq!(control.search_method, Some(SearchMethod::Octree));
        assert_eq!(control.octree.nx_init, 10);
        assert_eq!(control.octree.num_scatter, 6000);
    }

    #[test]
    fn locsearch_metropolis_is_parsed() {
        let control = parse_control_text("LOCSEARCH METROPOLIS 5000 200 2 0.5 15.0 1.0 8.0\n");
        assert_eq!(control.search_method, Some(SearchMethod::Metropolis));
        assert_eq!(control.metropolis.num_samples, 5000);
        assert_eq!(control.metropolis.initial_temperature, 8.0);
    }

    #[test]
    fn locsearch_grid_and_differential_set_the_method_only() {
        let control = parse_control_text("LOCSEARCH GRID\n");
        assert_eq!(control.search_method, Some(SearchMethod::GridExhaustive));
        let control = parse_control_text("LOCSEARCH DIFFERENTIAL\n");
        assert_eq!(control.search_method, Some(SearchMethod::Differential));
    }

    #[test]
    fn locsearch_differential_parses_metropolis_and_diff_specific_params() {
        let control = parse_control_text("LOCSEARCH DIFFERENTIAL 4000 100 2 0.4 12.0 1.0 6.0 0.1 2000\n");
        assert_eq!(control.search_method, Some(SearchMethod::Differential));
        assert_eq!(control.diff_loc.metropolis.num_samples, 4000);
        assert_eq!(control.diff_loc.metropolis.start_save, 100);
        assert_eq!(control.diff_loc.common_move_probability, 0.1);
        assert_eq!(control.diff_loc.max_events, 2000);
    }

    #[test]
    fn locfiles_sixth_token_sets_the_diff_time_file() {
        let control = parse_control_text("LOCFILES obs.txt NLLOC_OBS time/root out/root 0 diff.dat\n");
        assert_eq!(control.loc_files.diff_time_file.as_deref(), Some("diff.dat"));
    }

    #[test]
    fn locmeth_is_parsed_with_defaults_for_missing_flags() {
        let control = parse_control_text("LOCMETH EDT -1 6 999 0.02\n");
        assert_eq!(control.loc_meth.method, LikelihoodMethod::Edt);
        assert_eq!(control.loc_meth.dist_weight_cutoff_km, None);
        assert_eq!(control.loc_meth.min_num_arr_loc, 6);
        assert!(!control.loc_meth.reject_misfit_above_rms);
    }

    #[test]
    fn locmeth_parses_a_finite_distance_cutoff_and_flags() {
        let control = parse_control_text("LOCMETH GAU_ANALYTIC 150.0 4 999 0.01 1 1\n");
        assert_eq!(control.loc_meth.dist_weight_cutoff_km, Some(150.0));
        assert!(control.loc_meth.reject_misfit_above_rms);
        assert!(control.loc_meth.weight_like_by_misfit);
    }

    #[test]
    fn locgau_is_parsed() {
        let control = parse_control_text("LOCGAU 0.2 5.0\n");
        assert_eq!(control.loc_gau.sigma_time_s, 0.2);
        assert_eq!(control.loc_gau.correlation_length_km, 5.0);
    }

    #[test]
    fn locphaseid_accumulates_synonyms_per_canonical_phase() {
        let control = parse_control_text("LOCPHASEID P Pg Pn\nLOCPHASEID P Pb\n");
        assert_eq!(control.phase_id["P"], vec!["Pg".to_string(), "Pn".to_string(), "Pb".to_string()]);
    }

    #[test]
    fn locqual2err_is_parsed() {
        let control = parse_control_text("LOCQUAL2ERR 0.02 0.1 0.3 1.0 5.0\n");
        assert_eq!(control.qual2err.classes, [0.02, 0.1, 0.3, 1.0, 5.0]);
    }

    #[test]
    fn locmag_is_parsed() {
        let control = parse_control_text("LOCMAG 1.0 0.0010 -0.87 1.2 0.0 0.0\n");
        assert_eq!(control.loc_mag.richter_a, 1.0);
        assert_eq!(control.loc_mag.duration_a, 1.2);
    }

    #[test]
    fn loccomp_joins_the_remaining_tokens_as_the_description() {
        let control = parse_control_text("LOCCOMP STA1 short period vertical\n");
        assert_eq!(control.components["STA1"], "short period vertical");
    }

    #[test]
    fn locphstat_is_parsed() {
        let control = parse_control_text("LOCPHSTAT 0.5 8.0 3\n");
        assert_eq!(control.phase_stat.rms_max_s, 0.5);
        assert_eq!(control.phase_stat.residual_max_s, 8.0);
        assert_eq!(control.phase_stat.num_readings_min, 3);
    }

    #[test]
    fn lochypout_is_parsed() {
        let control = parse_control_text("LOCHYPOUT 1 0 1\n");
        assert!(control.hyp_out.phase_file);
        assert!(!control.hyp_out.scatter_file);
        assert!(control.hyp_out.residual_file);
    }

    #[test]
    fn locstawt_is_parsed() {
        let control = parse_control_text("LOCSTAWT 15.0 8.0\n");
        assert_eq!(control.station_weight.radius_km, 15.0);
        assert_eq!(control.station_weight.decay_km, 8.0);
    }

    #[test]
    fn a_full_control_file_populates_every_section() {
        let text = "\
        CONTROL info 42\n\
        TRANS SIMPLE 46.0 8.0 0.0\n\
        LOCFILES obs.txt NLLOC_OBS grids/ts out/ev 0\n\
        LOCGRID -10 -10 0 1 1 1 21 21 11\n\
        LOCSEARCH OCTREE 8 8 8 0.05 20000 0.0001 5000\n\
        LOCMETH GAU_ANALYTIC -1 4 999 0.01 0 0\n\
        LOCGAU 0.1 0.0\n\
        LOCPHASEID P Pg Pn\n\
        LOCQUAL2ERR 0.01 0.05 0.1 0.5 2.0\n\
        LOCEXCLUDE STA9\n\
        LOCINCLUDE STA1 STA2\n\
        LOCDELAY STA1 0.05\n\
        LOCPHSTAT 1.0 10.0 1\n\
        LOCHYPOUT 1 1 0\n\
        LOCSTAWT 10.0 10.0\n\
        ";
        let control = parse_control_text(text);
        assert_eq!(control.control.rng_seed, 42);
        assert!(control.loc_grid.is_some());
        assert_eq!(control.search_method, Some(SearchMethod::Octree));
        assert_eq!(control.loc_meth.method, LikelihoodMethod::GauAnalytic);
        assert_eq!(control.phase_id["P"].len(), 2);
        assert_eq!(control.delays["STA1"], 0.05);
    }
}
