//! Control-file parsing and the external file formats: the
//! phase-observation reader, the differential-time observation reader,
//! the hypocenter-phase text writer, the binary scatter file, and the
//! hypoDD-style residual file.
//!
//! Plays the role `rinex`'s header/production/epoch-parsing modules play
//! for RINEX: fixed-token textual formats plus one binary payload,
//! generalized from GNSS observation records to seismic phase picks and
//! location results.

pub mod control;
pub mod diff_time_file;
pub mod obs_file;
pub mod phase_output;
pub mod projection;
pub mod residual_file;
pub mod scatter_file;

use thiserror::Error;

/// Errors raised while reading or writing any of the external formats.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("malformed control statement: {0}")]
    BadControl(String),
    #[error("observation error: {0}")]
    Obs(#[from] nlloc_obs::ObsError),
    #[error("grid error: {0}")]
    Grid(#[from] nlloc_grid::GridError),
    #[error("malformed scatter file: {0}")]
    BadScatterFile(String),
    #[error("invalid reference date: {0}")]
    BadReferenceDate(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod prelude {
    pub use crate::control::Control;
    pub use crate::IoError;
}
