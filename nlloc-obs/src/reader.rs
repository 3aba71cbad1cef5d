//! `NLLOC_OBS` phase-pick reader and pre-search filtering.

use crate::arrival::{Arrival, Onset, StationCoords};
use crate::phase_id::PhaseIdTable;
use crate::quality::{resolve_sigma, LocQual2Err};
use crate::ObsError;

#[cfg(feature = "logging")]
use log::{info, warn};

/// One un-filtered record straight off the wire, before station
/// coordinates (looked up externally by label) or phase-ID resolution
/// are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPick {
    pub label: String,
    pub component: String,
    pub onset: Onset,
    pub phase: String,
    /// Calendar day the pick's `YYYYMMDD` field names (year, month, day).
    /// [`Self::time_seconds`] is seconds-of-that-day; the caller uses
    /// this to reconstruct an absolute origin time once an event is
    /// located.
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub time_seconds: f64,
    pub explicit_error: Option<f64>,
    pub prior_weight: f64,
}

fn parse_onset(token: &str) -> Onset {
    match token.trim() {
        "i" | "I" => Onset::Impulsive,
        "e" | "E" => Onset::Emergent,
        _ => Onset::Questionable,
    }
}

/// Parses one `NLLOC_OBS` record line. Fields beyond the ones
/// this engine needs (first-motion, coda-duration, amplitude, period)
/// are accepted but not retained on [`RawPick`]; unknown/malformed lines
/// are reported via `Err` so the caller can log and skip the item
/// rather than abort the whole read.
pub fn parse_obs_line(line: &str) -> Result<RawPick, ObsError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    // station instrument component onset phase first_motion date hhmm
    // sec.dec error_type error coda amplitude period prior_weight
    if tokens.len() < 15 {
        return Err(ObsError::BadRecord(format!(
                    "expected >= 15 whitespace separated fields, got {}",
                    tokens.len()
        )));
    }
    let label = tokens[0].to_string();
    let component = tokens[2].to_string();
    let onset = parse_onset(tokens[3]);
    let phase = tokens[4].to_string();

    let date = tokens[6];
    let hhmm = tokens[7];
    let secs: f64 = tokens[8]
    .parse()
    .map_err(|_| ObsError::BadRecord(format!("bad seconds field '{}'", tokens[8])))?;
    let (year, month, day) = decode_date(date)?;
    let time_seconds = decode_time(date, hhmm, secs)?;

    let error_type = tokens[9];
    let error_value: f64 = tokens[10]
    .parse()
    .map_err(|_| ObsError::BadRecord(format!("bad error field '{}'", tokens[10])))?;
    let explicit_error = match error_type {
        "GAU" => Some(error_value),
        _ => None,
    };

    let prior_weight: f64 = tokens[14].parse().unwrap_or(1.0);

    Ok(RawPick {
            label,
            component,
            onset,
            phase,
            year,
            month,
            day,
            time_seconds,
            explicit_error,
            prior_weight,
    })
}

/// Parses the `YYYYMMDD` field into (year, month, day). Kept separate
/// from [`RawPick::time_seconds`] (seconds-of-day) so the caller can
/// reconstruct an absolute origin time after location without this
/// reader needing any calendar-arithmetic dependency of its own.
fn decode_date(date: &str) -> Result<(i32, u32, u32), ObsError> {
    if date.len() < 8 {
        return Err(ObsError::BadRecord(format!("malformed date '{date}'")));
    }
    let year: i32 = date[0..4].parse().map_err(|_| ObsError::BadRecord(format!("bad year in '{date}'")))?;
    let month: u32 = date[4..6].parse().map_err(|_| ObsError::BadRecord(format!("bad month in '{date}'")))?;
    let day: u32 = date[6..8].parse().map_err(|_| ObsError::BadRecord(format!("bad day in '{date}'")))?;
    Ok((year, month, day))
}

/// Decodes `HHMM` and fractional seconds into seconds-of-day. This
/// engine only ever differences arrival times within one event, so the
/// day itself is tracked separately by [`decode_date`] rather than
/// folded into this value.
fn decode_time(date: &str, hhmm: &str, secs: f64) -> Result<f64, ObsError> {
    if date.len() < 8 || hhmm.len() < 4 {
        return Err(ObsError::BadRecord(format!(
                    "malformed date/time '{date}' '{hhmm}'"
        )));
    }
    let hour: f64 = hhmm[0..2]
    .parse()
    .map_err(|_| ObsError::BadRecord(format!("bad hour in '{hhmm}'")))?;
    let minute: f64 = hhmm[2..4]
    .parse()
    .map_err(|_| ObsError::BadRecord(format!("bad minute in '{hhmm}'")))?;
    Ok(hour * 3600.0 + minute * 60.0 + secs)
}

/// Builds a fully resolved [`Arrival`] from a [`RawPick`] plus the
/// context the orchestrator supplies: station coordinates, the
/// phase-ID table, the quality-class table and the station delay.
pub fn resolve_arrival(
    pick: RawPick,
    station: StationCoords,
    phase_ids: &PhaseIdTable,
    qual2err: &LocQual2Err,
    delay: f64,
) -> Arrival {
    let phase = phase_ids.canonical(&pick.phase);
    let (sigma, explicit_sigma) = resolve_sigma(qual2err, pick.onset, pick.explicit_error);
    Arrival {
        label: pick.label,
        component: pick.component,
        phase,
        phase_as_read: pick.phase,
        onset: pick.onset,
        station,
        time_seconds: pick.time_seconds + delay,
        sigma,
        explicit_sigma,
        delay,
        prior_weight: pick.prior_weight,
        weight: pick.prior_weight,
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

/// Rejects duplicate arrivals: same station+phase within `tolerance_s`,
/// keeping the first-seen occurrence and discarding the rest. Returns
/// the filtered list and the count of rejected duplicates.
pub fn reject_duplicates(arrivals: Vec<Arrival>, tolerance_s: f64) -> (Vec<Arrival>, usize) {
    let mut kept: Vec<Arrival> = Vec::with_capacity(arrivals.len());
    let mut rejected = 0usize;
    for arrival in arrivals {
        let is_duplicate = kept.iter().any(|k| {
                k.label == arrival.label
                && k.phase == arrival.phase
                && (k.time_seconds - arrival.time_seconds).abs() <= tolerance_s
        });
        if is_duplicate {
            rejected += 1;
            #[cfg(feature = "logging")]
            warn!(
                "rejecting duplicate arrival {}.{} @ {}",
                arrival.label, arrival.phase, arrival.time_seconds
            );
        } else {
            kept.push(arrival);
        }
    }
    #[cfg(feature = "logging")]
    if rejected > 0 {
        info!("rejected {rejected} duplicate arrival(s)");
    }
    (kept, rejected)
}

/// Station include/exclude filtering (`LOCEXCLUDE`/`LOCINCLUDE`).
/// `include` takes precedence when non-empty (an allow-list);
/// otherwise stations in `exclude` are dropped.
pub fn filter_stations(arrivals: Vec<Arrival>, include: &[String], exclude: &[String]) -> Vec<Arrival> {
    arrivals
    .into_iter()
    .filter(|a| {
            if !include.is_empty() {
                include.iter().any(|s| s == &a.label)
            } else {
                !exclude.iter().any(|s| s == &a.label)
            }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line() -> &'static str {
        "STA1 ? HHZ i P ? 20230615 1203 05.1200 GAU 0.05 -1.00 -1.00 -1.00 1.00"
    }

    #[test]
    fn parses_canonical_obs_line() {
        let pick = parse_obs_line(sample_line()).unwrap();
        assert_eq!(pick.label, "STA1");
        assert_eq!(pick.phase, "P");
        assert_eq!((pick.year, pick.month, pick.day), (2023, 6, 15));
        assert_eq!(pick.onset, Onset::Impulsive);
        assert_eq!(pick.explicit_error, Some(0.05));
        assert!((pick.time_seconds - (12.0 * 3600.0 + 3.0 * 60.0 + 5.12)).abs() < 1e-9);
    }

    #[test]
    fn rejects_short_line() {
        assert!(parse_obs_line("STA1 only a few tokens").is_err());
    }

    #[test]
    fn duplicate_rejection_keeps_first() {
        let phase_ids = PhaseIdTable::default();
        let qual2err = LocQual2Err::default();
        let station = StationCoords::default();
        let pick1 = parse_obs_line(sample_line()).unwrap();
        let mut pick2 = pick1.clone();
        pick2.time_seconds += 0.01;
        let a1 = resolve_arrival(pick1, station, &phase_ids, &qual2err, 0.0);
        let a2 = resolve_arrival(pick2, station, &phase_ids, &qual2err, 0.0);
        let (kept, rejected) = reject_duplicates(vec![a1.clone(), a2], 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(rejected, 1);
        assert_eq!(kept[0], a1);
    }

    #[test]
    fn include_list_takes_precedence_over_exclude() {
        let phase_ids = PhaseIdTable::default();
        let qual2err = LocQual2Err::default();
        let pick = parse_obs_line(sample_line()).unwrap();
        let arrival = resolve_arrival(pick, StationCoords::default(), &phase_ids, &qual2err, 0.0);
        let kept = filter_stations(vec![arrival], &["STA1".to_string()], &["STA1".to_string()]);
        assert_eq!(kept.len(), 1);
    }
}
