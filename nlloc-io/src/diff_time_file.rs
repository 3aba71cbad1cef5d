//! Differential-time observation file reader: one double-difference
//! pick per line, `STA EVENT_I EVENT_J DT_OBS SIGMA_DT`.
//!
//! Tolerant in the same spirit as [`crate::obs_file`]: blank and
//! `#`-comment lines are skipped, a malformed line is counted and
//! logged rather than failing the whole file.

use log::warn;

use nlloc_loc::diffloc::DiffObservation;

/// Parses `text` into [`DiffObservation`]s plus a count of lines that
/// failed to parse. Order matches the input file.
pub fn read_diff_observations(text: &str) -> (Vec<DiffObservation>, usize) {
    let mut observations = Vec::new();
    let mut skipped = 0;

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_diff_time_line(line) {
            Some(obs) => observations.push(obs),
            None => {
                warn!("differential time file line {}: malformed, skipped", lineno + 1);
                skipped += 1;
            },
        }
    }
    (observations, skipped)
}

fn parse_diff_time_line(line: &str) -> Option<DiffObservation> {
    let mut tokens = line.split_whitespace();
    let station = tokens.next()?.to_string();
    let event_i: u64 = tokens.next()?.parse().ok()?;
    let event_j: u64 = tokens.next()?.parse().ok()?;
    let dt_obs: f64 = tokens.next()?.parse().ok()?;
    let sigma_dt: f64 = tokens.next()?.parse().ok()?;
    Some(DiffObservation { station, event_i, event_j, dt_obs, sigma_dt })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_observation_per_line() {
        let text = "STA1 1 2 0.120 0.010\nSTA2 1 3 -0.050 0.020\n";
        let (obs, skipped) = read_diff_observations(text);
        assert_eq!(obs.len(), 2);
        assert_eq!(skipped, 0);
        assert_eq!(obs[0].station, "STA1");
        assert_eq!(obs[0].event_i, 1);
        assert_eq!(obs[0].event_j, 2);
        assert_eq!(obs[1].dt_obs, -0.05);
    }

    #[test]
    fn comment_and_blank_lines_are_ignored() {
        let text = "# header\n\nSTA1 1 2 0.1 0.01\n";
        let (obs, skipped) = read_diff_observations(text);
        assert_eq!(obs.len(), 1);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let text = "STA1 1 2 0.1 0.01\nSTA2 one two three\n";
        let (obs, skipped) = read_diff_observations(text);
        assert_eq!(obs.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (obs, skipped) = read_diff_observations("");
        assert!(obs.is_empty());
        assert_eq!(skipped, 0);
    }
}
