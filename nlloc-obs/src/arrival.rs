//! The [`Arrival`] record.

/// Onset class, mapped to an a-priori error in seconds via
/// [`crate::quality::LocQual2Err`] unless an explicit error was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Onset {
    Impulsive,
    Emergent,
    Questionable,
}

/// Station coordinates, already projected into the search frame (x, y in
/// km or degrees depending on projection mode; z in km, positive down).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationCoords {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One observed phase pick.
///
/// Filled in stages: the loader ([`crate::reader`]) sets the raw fields;
/// the orchestrator fills `weight`, `companion_of` and the a-priori
/// `sigma` before the search; the evaluator fills the `predicted_*`
/// fields during the final "save best" pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arrival {
    /// Station label, e.g. "PHOB".
    pub label: String,
    /// Instrument/component code, e.g. "HHZ".
    pub component: String,
    /// Canonical phase name after equivalence resolution.
    pub phase: String,
    /// Phase name exactly as read, kept for fault-tolerant re-formatting.
    pub phase_as_read: String,
    pub onset: Onset,
    pub station: StationCoords,
    /// Observed absolute time, in fractional seconds past an
    /// engine-chosen epoch shared by every arrival of the same event.
    pub time_seconds: f64,
    /// A-priori observation error (seconds), from onset class or an
    /// explicit per-phase error; explicit always wins.
    pub sigma: f64,
    /// True when `sigma` came from an explicit per-phase error rather
    /// than the onset-class table.
    pub explicit_sigma: bool,
    /// Station delay / total phase correction, added to the observed
    /// time.
    pub delay: f64,
    /// A-priori weight supplied in the observation record (e.g. from
    /// amplitude/period quality), multiplied into the final weight.
    pub prior_weight: f64,
    /// Final weight = distance weight * station weight * prior weight.
    pub weight: f64,
    /// Multiplicative travel-time scale factor, generalized beyond the
    /// Vp/Vs special case. Defaults to 1.
    pub tfact: f64,
    /// When set, this arrival is skipped by the evaluator and excluded
    /// from `nreadings`.
    pub ignore: bool,
    /// Index, within the event's arrival array, of the earlier
    /// companion arrival this one shares a travel-time grid with;
    /// `None` means this arrival owns its grid.
    pub companion_of: Option<usize>,
    /// Differential-time companion event ids (differential mode only).
    pub dd_event_ids: Option<(u64, u64)>,
    pub dd_dtime: Option<f64>,

    // Filled by the evaluator's "save best" pass (last
    // paragraph):
    pub predicted_travel_time: Option<f64>,
    pub residual: Option<f64>,
    pub distance_km: Option<f64>,
    pub azimuth_deg: Option<f64>,
    pub ray_azimuth_deg: Option<f64>,
    pub ray_dip_deg: Option<f64>,
    pub ray_quality: Option<u8>,
}

impl Arrival {
    /// True when this is the first registered arrival for its
    /// station+phase within the current event (i.e. it owns its
    /// travel-time grid rather than delegating through a companion).
    pub fn owns_grid(&self) -> bool {
        self.companion_of.is_none()
    }

    /// Station+phase identity used for companion detection and grid
    /// cache keys.
    pub fn station_phase_key(&self) -> String {
        format!("{}.{}", self.label, self.phase)
    }
}
