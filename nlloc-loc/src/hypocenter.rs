//! The [`Hypocenter`] record and [`LocationStatus`] lifecycle.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of a single event's search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LocationStatus {
    /// Allocated but not yet searched.
    Uninitialized,
    /// Search completed and the result is trustworthy.
    Located,
    /// Max-likelihood sample sits on the search-box boundary; still
    /// written out.
    Rejected,
    /// Every candidate evaluated to -infinity, or the retry budget was
    /// exhausted before enough samples were accepted.
    Aborted,
}

/// Three semi-axis vectors of an error ellipsoid, each encoded as
/// (azimuth_deg, dip_deg, length_km).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ellipsoid {
    pub az1: f64,
    pub dip1: f64,
    pub len1: f64,
    pub az2: f64,
    pub dip2: f64,
    pub len2: f64,
    pub len3: f64,
}

/// 2-D (x,y) error ellipse, derived from the covariance's upper-left block
///.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HorizontalEllipse {
    pub az_max: f64,
    pub len_max: f64,
    pub len_min: f64,
}

/// Symmetric 3x3 covariance, stored as its 6 independent entries (
/// "covariance (6 independent entries)"): xx, xy, xz, yy, yz, zz.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Covariance {
    pub xx: f64,
    pub xy: f64,
    pub xz: f64,
    pub yy: f64,
    pub yz: f64,
    pub zz: f64,
}

/// One event's located hypocenter and its posterior summary (
/// "Hypocenter"). Owns no grid references directly; the orchestrator
/// keeps the PDF grid/octree/scatter alive only as long as needed to
/// compute these fields, then drops them once [`Location`](crate::location::Location)
/// is appended.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hypocenter {
    pub status: LocationStatus,

    // Projected search-frame position.
    pub x: f64,
    pub y: f64,
    pub z: f64,

    // Geographic position (degrees, degrees, km).
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,

    // Origin time, split the way the reference splits it: an integer
    // calendar part plus a fractional-seconds remainder, since the
    // engine never needs sub-field arithmetic on the whole timestamp.
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub seconds: f64,

    pub rms: f64,
    pub gap_deg: f64,
    pub nreadings: usize,
    pub grid_misfit_max: f64,
    pub probmax: f64,

    pub expectation: [f64; 3],
    pub covariance: Covariance,
    pub ellipsoid: Ellipsoid,
    pub horizontal_ellipse: HorizontalEllipse,

    pub scatter_count: usize,
    pub search_info: String,
}

impl Hypocenter {
    /// A freshly allocated, not-yet-searched hypocenter (
    /// "lifecycle: allocated per event").
    pub fn uninitialized() -> Self {
        Self {
            status: LocationStatus::Uninitialized,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            latitude: 0.0,
            longitude: 0.0,
            depth_km: 0.0,
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
            seconds: 0.0,
            rms: 0.0,
            gap_deg: 0.0,
            nreadings: 0,
            grid_misfit_max: 0.0,
            probmax: 0.0,
            expectation: [0.0; 3],
            covariance: Covariance::default(),
            ellipsoid: Ellipsoid { az1: 0.0, dip1: 0.0, len1: 0.0, az2: 0.0, dip2: 0.0, len2: 0.0, len3: 0.0 },
            horizontal_ellipse: HorizontalEllipse { az_max: 0.0, len_max: 0.0, len_min: 0.0 },
            scatter_count: 0,
            search_info: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_has_the_right_status() {
        let h = Hypocenter::uninitialized();
        assert_eq!(h.status, LocationStatus::Uninitialized);
        assert_eq!(h.scatter_count, 0);
    }
}
