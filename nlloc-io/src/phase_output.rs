//! Hypocenter-phase text output:
//! SIGNATURE/GEOGRAPHIC/QUALITY/STATISTICS/STAT_GEOG blocks, one
//! per-phase line per retained arrival, terminated by `END_NLLOC`.

use std::fmt::Write as _;

use nlloc_loc::hypocenter::{Hypocenter, LocationStatus};
use nlloc_obs::Arrival;

/// Renders one [`Hypocenter`] plus its arrivals as the textual
/// hypocenter-phase block. `event_id` and `program_version`
/// are embedded in the `SIGNATURE` line.
pub fn format_phase_block(event_id: u64, hyp: &Hypocenter, arrivals: &[Arrival]) -> String {
    let mut out = String::new();

    writeln!(out, "NLLOC \"EVENT{event_id}\" \"{}\"", status_label(hyp.status)).unwrap();
    writeln!(
        out,
        "SIGNATURE \"EVENT{event_id}\" RUN {}",
        hyp.search_info
    )
    .unwrap();
    writeln!(
        out,
        "GEOGRAPHIC OT {:04} {:02} {:02} {:02} {:02} {:07.4} Lat {:.6} Long {:.6} Depth {:.4}",
        hyp.year, hyp.month, hyp.day, hyp.hour, hyp.minute, hyp.seconds, hyp.latitude, hyp.longitude, hyp.depth_km
    )
    .unwrap();
    writeln!(
        out,
        "QUALITY Pmax {:.6e} MFmin {:.6} RMS {:.6} Nphs {} Gap {:.2}",
        hyp.probmax, hyp.grid_misfit_max, hyp.rms, hyp.nreadings, hyp.gap_deg
    )
    .unwrap();
    writeln!(
        out,
        "STATISTICS ExpectX {:.4} Y {:.4} Z {:.4} CovXX {:.6} XY {:.6} XZ {:.6} YY {:.6} YZ {:.6} ZZ {:.6}",
        hyp.expectation[0],
        hyp.expectation[1],
        hyp.expectation[2],
        hyp.covariance.xx,
        hyp.covariance.xy,
        hyp.covariance.xz,
        hyp.covariance.yy,
        hyp.covariance.yz,
        hyp.covariance.zz
    )
    .unwrap();
    writeln!(
        out,
        "STAT_GEOG ErrEllipse Az1 {:.2} Dip1 {:.2} Len1 {:.4} Az2 {:.2} Dip2 {:.2} Len2 {:.4} Len3 {:.4}",
        hyp.ellipsoid.az1,
        hyp.ellipsoid.dip1,
        hyp.ellipsoid.len1,
        hyp.ellipsoid.az2,
        hyp.ellipsoid.dip2,
        hyp.ellipsoid.len2,
        hyp.ellipsoid.len3
    )
    .unwrap();
    writeln!(
        out,
        "QUALITY_LOC HorizEllipse AzMax {:.2} LenMax {:.4} LenMin {:.4}",
        hyp.horizontal_ellipse.az_max, hyp.horizontal_ellipse.len_max, hyp.horizontal_ellipse.len_min
    )
    .unwrap();
    // No moment-tensor/focal-mechanism search; the line is present but
    // always empty.
    writeln!(out, "FOCALMECH").unwrap();
    if hyp.search_info.starts_with("DIFFERENTIAL") {
        writeln!(out, "DIFFERENTIAL {}", hyp.search_info).unwrap();
    }

    writeln!(out, "PHASE ID Ins Cmp On Pha FM Date HrMn Sec Err ErrMag Coda Amp Per > TTpred Res Weight StaX StaY StaZ Dist Az RAz RDip RQual").unwrap();
    for arrival in arrivals {
        if arrival.ignore {
            continue;
        }
        writeln!(
            out,
            "{:<6} ? {:<4} {} {:<6} > {:.4} {:>7.4} {:>8.4} {:>8.4} {:>8.3} {:>8.3} {:>8.3} {:>6.2} {:>6.2} {:>6.2} {:>2}",
            arrival.label,
            arrival.component,
            onset_token(arrival.onset),
            arrival.phase,
            arrival.predicted_travel_time.unwrap_or(0.0),
            arrival.residual.unwrap_or(0.0),
            arrival.weight,
            arrival.station.x,
            arrival.station.y,
            arrival.station.z,
            arrival.distance_km.unwrap_or(0.0),
            arrival.azimuth_deg.unwrap_or(0.0),
            arrival.ray_azimuth_deg.unwrap_or(-1.0),
            arrival.ray_dip_deg.unwrap_or(-1.0),
            arrival.ray_quality.unwrap_or(0),
        )
        .unwrap();
    }
    writeln!(out, "END_PHASE").unwrap();
    writeln!(out, "END_NLLOC").unwrap();
    out
}

fn status_label(status: LocationStatus) -> &'static str {
    match status {
        LocationStatus::Uninitialized => "UNINITIALIZED",
        LocationStatus::Located => "LOCATED",
        LocationStatus::Rejected => "REJECTED",
        LocationStatus::Aborted => "ABORTED",
    }
}

fn onset_token(onset: nlloc_obs::Onset) -> &'static str {
    match onset {
        nlloc_obs::Onset::Impulsive => "i",
        nlloc_obs::Onset::Emergent => "e",
        nlloc_obs::Onset::Questionable => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlloc_obs::reader::{parse_obs_line, resolve_arrival};
    use nlloc_obs::{LocQual2Err, PhaseIdTable, StationCoords};

    fn sample_arrival() -> Arrival {
        let pick = parse_obs_line(
            "STA1 ? HHZ i P ? 20230615 1203 05.1200 GAU 0.05 -1.00 -1.00 -1.00 1.00",
        )
        .unwrap();
        resolve_arrival(pick, StationCoords { x: 1.0, y: 2.0, z: 0.0 }, &PhaseIdTable::default(), &LocQual2Err::default(), 0.0)
    }

    #[test]
    fn block_carries_the_event_signature_and_status() {
        let hyp = Hypocenter::uninitialized();
        let block = format_phase_block(42, &hyp, &[]);
        assert!(block.contains("EVENT42"));
        assert!(block.contains("UNINITIALIZED"));
        assert!(block.ends_with("END_NLLOC\n"));
    }

    #[test]
    fn ignored_arrivals_are_omitted_from_the_phase_lines() {
        let hyp = Hypocenter::uninitialized();
        let mut arrival = sample_arrival();
        arrival.ignore = true;
        let block = format_phase_block(1, &hyp, &[arrival]);
        assert!(!block.contains("STA1"));
    }

    #[test]
    fn retained_arrivals_appear_with_their_station_label() {
        let hyp = Hypocenter::uninitialized();
        let block = format_phase_block(1, &hyp, &[sample_arrival()]);
        assert!(block.contains("STA1"));
    }

    #[test]
    fn focalmech_line_is_always_present() {
        let hyp = Hypocenter::uninitialized();
        let block = format_phase_block(1, &hyp, &[]);
        assert!(block.lines().any(|l| l == "FOCALMECH"));
    }

    #[test]
    fn differential_line_appears_only_for_differential_search_info() {
        let mut hyp = Hypocenter::uninitialized();
        let absolute = format_phase_block(1, &hyp, &[]);
        assert!(!absolute.contains("\nDIFFERENTIAL"));

        hyp.search_info = "DIFFERENTIAL accepted=50 step=0.2500".to_string();
        let differential = format_phase_block(1, &hyp, &[]);
        assert!(differential.lines().any(|l| l.starts_with("DIFFERENTIAL ") && l.contains("accepted=50")));
    }
}
