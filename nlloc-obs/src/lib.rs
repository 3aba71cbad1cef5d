//! Observation model: per-arrival data, phase-ID equivalence, quality to
//! error mapping, and distance/station weighting.
//!
//! Plays the role `gnss-rtk::candidate` plays for a GNSS solver: a
//! per-observation struct filled in stages (loader -> orchestrator ->
//! evaluator), generalized from one pseudo-range per satellite to one
//! phase pick per station+phase, with companion sharing of travel-time
//! grids instead of per-candidate ephemeris interpolation.

pub mod arrival;
pub mod phase_id;
pub mod quality;
pub mod reader;
pub mod weighting;

pub use arrival::{Arrival, Onset, StationCoords};
pub use phase_id::PhaseIdTable;
pub use quality::{ErrorSource, LocQual2Err};
pub use weighting::{distance_weight, station_weights, StationWeightConfig};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ObsError {
    #[error("malformed observation record: {0}")]
    BadRecord(String),
    #[error("unknown phase '{0}' with no equivalence mapping")]
    UnknownPhase(String),
    #[error("no arrivals survived filtering for this event")]
    NoArrivalsRemain,
}

pub mod prelude {
    pub use crate::arrival::{Arrival, Onset, StationCoords};
    pub use crate::phase_id::PhaseIdTable;
    pub use crate::quality::{ErrorSource, LocQual2Err};
    pub use crate::weighting::{distance_weight, station_weights, StationWeightConfig};
    pub use crate::ObsError;
}
