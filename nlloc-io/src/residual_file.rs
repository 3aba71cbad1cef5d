//! hypoDD-style residual file: one line per differential-time
//! observation with its residual against the located event pair.

use std::fmt::Write as _;

/// One row of the residual table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualRow {
    pub station: String,
    pub event_i: u64,
    pub event_j: u64,
    pub dt_obs: f64,
    pub weight: f64,
    /// Observed minus predicted double-difference, milliseconds.
    pub residual_ms: f64,
    pub distance_km: f64,
}

/// Formats `rows` as whitespace-separated columns: station, dt_obs,
/// id1, id2, weight, residual_ms, distance_km. One header line, then one
/// row per observation, in input order.
pub fn format_residual_file(rows: &[ResidualRow]) -> String {
    let mut out = String::new();
    writeln!(out, "# STA DT_OBS ID1 ID2 WGHT RES_MS DIST_KM").unwrap();
    for row in rows {
        writeln!(
            out,
            "{:<8} {:>12.6} {:>10} {:>10} {:>8.4} {:>10.3} {:>10.3}",
            row.station, row.dt_obs, row.event_i, row.event_j, row.weight, row.residual_ms, row.distance_km
        )
        .unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_row_per_observation_after_the_header() {
        let rows = vec![
            ResidualRow { station: "STA1".into(), event_i: 1, event_j: 2, dt_obs: 0.12, weight: 1.0, residual_ms: 3.5, distance_km: 12.0 },
            ResidualRow { station: "STA2".into(), event_i: 1, event_j: 2, dt_obs: -0.04, weight: 0.5, residual_ms: -1.1, distance_km: 8.0 },
        ];
        let text = format_residual_file(&rows);
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().contains("STA1"));
        assert!(text.lines().nth(2).unwrap().contains("STA2"));
    }

    #[test]
    fn empty_input_yields_only_the_header() {
        let text = format_residual_file(&[]);
        assert_eq!(text.lines().count(), 1);
    }
}
