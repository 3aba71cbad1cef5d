//! Non-linear hypocenter location engine: the TT lookup, likelihood
//! evaluator, octree and Metropolis samplers, posterior statistics, the
//! differential-time driver, the per-event orchestrator and the
//! in-memory location list.
//!
//! Plays the role `gnss_rtk::Solver` plays for a GNSS fix: a
//! `Config`-parametrized iterative search that turns a pool of
//! observations into a position (here: a posterior PDF over a 3-D
//! volume plus an origin time), generalized from one linear
//! least-squares solve per epoch to a global, non-linear Monte-Carlo /
//! octree search per event.

pub mod diffloc;
pub mod hypocenter;
pub mod likelihood;
pub mod location;
pub mod metropolis;
pub mod octree;
pub mod orchestrator;
pub mod search;
pub mod stats;
pub mod tt_lookup;

pub use hypocenter::{Hypocenter, LocationStatus};
pub use likelihood::{LikelihoodMethod, LocMethConfig};
pub use location::{Location, LocationList};
pub use search::{SearchConfig, SearchMethod};

use thiserror::Error;

/// Errors surfaced by the search/orchestration layer. Per-sample and
/// per-cell numerical failures inside the search loops are represented
/// as sentinels (`f64::NEG_INFINITY`, `Option::None`), never as `Err`;
/// `LocError` is reserved for conditions that abort the whole event.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocError {
    #[error("fewer than the minimum number of arrivals remain after filtering ({0} < {1})")]
    TooFewArrivals(usize, usize),
    #[error("every initial octree cell evaluated to -infinity")]
    SearchAborted,
    #[error("Metropolis search aborted: retry budget exhausted with {0:.1}% of target samples accepted")]
    MetropolisAborted(f64),
    #[error("grid error: {0}")]
    Grid(#[from] nlloc_grid::GridError),
    #[error("observation error: {0}")]
    Obs(#[from] nlloc_obs::ObsError),
    #[error("differential observation references unknown event id {0}")]
    UnknownEventId(u64),
}

pub mod prelude {
    pub use crate::diffloc::{DiffLocConfig, DiffLocDriver, DiffObservation, EventState};
    pub use crate::hypocenter::{Hypocenter, LocationStatus};
    pub use crate::likelihood::{LikelihoodMethod, LocMethConfig};
    pub use crate::location::{Location, LocationList};
    pub use crate::metropolis::MetropolisConfig;
    pub use crate::octree::OctreeConfig;
    pub use crate::orchestrator::{locate_event, locate_events_differential, DiffEventInput, DiffResidual, OrchestratorConfig};
    pub use crate::search::{SearchConfig, SearchGrid, SearchMethod};
    pub use crate::LocError;
}
