//! Multi-event `NLLOC_OBS` file reader: splits a file on blank lines
//! into per-event blocks and drives
//! [`nlloc_obs::reader::parse_obs_line`] over each one.

use log::warn;

use nlloc_obs::reader::parse_obs_line;
use nlloc_obs::ObsError;

/// One event's worth of raw picks, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObsBlock {
    pub picks: Vec<nlloc_obs::reader::RawPick>,
    /// Lines that failed to parse, kept for diagnostics (:
    /// malformed records are skipped, not fatal).
    pub skipped: Vec<(usize, ObsError)>,
}

/// Splits `text` into blocks separated by one or more blank lines and
/// parses every non-blank, non-comment line of each block with
/// [`parse_obs_line`]. A trailing `END_OBS` style sentinel line, if
/// present, terminates a block and is itself discarded.
pub fn read_obs_blocks(text: &str) -> Vec<ObsBlock> {
    let mut blocks = Vec::new();
    let mut current = ObsBlock::default();
    let mut any_line_in_block = false;

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            if any_line_in_block {
                blocks.push(std::mem::take(&mut current));
                any_line_in_block = false;
            }
            continue;
        }
        if line.starts_with('#') || line.eq_ignore_ascii_case("END_OBS") {
            continue;
        }
        any_line_in_block = true;
        match parse_obs_line(line) {
            Ok(pick) => current.picks.push(pick),
            Err(err) => {
                warn!("obs file line {}: {err}, skipped", lineno + 1);
                current.skipped.push((lineno + 1, err));
            },
        }
    }
    if any_line_in_block {
        blocks.push(current);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_line() -> &'static str {
        "STA1 ? HHZ i P ? 20230615 1203 05.1200 GAU 0.05 -1.00 -1.00 -1.00 1.00"
    }

    #[test]
    fn blank_lines_separate_events() {
        let text = format!("{}\n{}\n\n{}\n{}\n", good_line(), good_line(), good_line(), good_line());
        let blocks = read_obs_blocks(&text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].picks.len(), 2);
        assert_eq!(blocks[1].picks.len(), 2);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let text = format!("{}\ntoo short\n{}\n", good_line(), good_line());
        let blocks = read_obs_blocks(&text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].picks.len(), 2);
        assert_eq!(blocks[0].skipped.len(), 1);
        assert_eq!(blocks[0].skipped[0].0, 2);
    }

    #[test]
    fn comment_and_sentinel_lines_are_ignored() {
        let text = format!("# comment\n{}\nEND_OBS\n", good_line());
        let blocks = read_obs_blocks(&text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].picks.len(), 1);
    }

    #[test]
    fn empty_input_yields_no_blocks() {
        assert!(read_obs_blocks("").is_empty());
        assert!(read_obs_blocks("\n\n\n").is_empty());
    }
}
