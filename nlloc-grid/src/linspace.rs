//! Linear axis description, as used by [`crate::desc::GridDesc`] and by
//! each depth level of a [`crate::cascading::CascadingGrid`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::GridError;

/// A regularly spaced 1-D axis: `count` samples starting at `origin`,
/// `step` units apart. Unlike `rinex::linspace::Linspace` (which stores
/// start/end/spacing and is used for IONEX lat/lon/alt spans), a search
/// grid axis is naturally expressed as origin + step + integer count,
/// which is how `LOCGRID` and travel-time grid headers describe it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Linspace {
    /// First sample, in grid-native units (km, or degrees in GLOBAL mode).
    pub origin: f64,
    /// Spacing between consecutive samples. Must be strictly positive.
    pub step: f64,
    /// Number of samples along this axis (>= 1).
    count: usize,
}

impl Linspace {
    /// Builds a new axis, rejecting non-positive step or zero count.
    pub fn new(origin: f64, step: f64, count: usize) -> Result<Self, GridError> {
        if step <= 0.0 {
            return Err(GridError::BadHeader(format!(
                        "axis step must be positive, got {step}"
            )));
        }
        if count == 0 {
            return Err(GridError::BadHeader("axis count must be >= 1".to_string()));
        }
        Ok(Self { origin, step, count })
    }

    /// Number of samples along this axis.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Value of the last sample (inclusive).
    pub fn end(&self) -> f64 {
        self.origin + self.step * (self.count.saturating_sub(1)) as f64
    }

    /// True when this axis carries a single sample (e.g. a 2-D grid's Y
    /// axis, or a cascading grid level collapsed to one lateral cell).
    pub fn is_single_point(&self) -> bool {
        self.count <= 1
    }

    /// Real-valued index of `value` along this axis (may be negative or
    /// larger than `count - 1`; callers clamp or reject as needed).
    pub fn real_index(&self, value: f64) -> f64 {
        (value - self.origin) / self.step
    }

    /// Nearest sample at or below `value`.
    pub fn floor_index(&self, value: f64) -> i64 {
        self.real_index(value).floor() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_axis() {
        assert!(Linspace::new(0.0, 0.0, 10).is_err());
        assert!(Linspace::new(0.0, 1.0, 0).is_err());
    }

    #[test]
    fn end_and_index() {
        let axis = Linspace::new(-5.0, 0.5, 21).unwrap();
        assert_eq!(axis.end(), 5.0);
        assert_eq!(axis.real_index(-5.0), 0.0);
        assert_eq!(axis.real_index(-4.5), 1.0);
        assert_eq!(axis.floor_index(-4.6), 0);
    }

    #[test]
    fn single_point_axis() {
        let axis = Linspace::new(0.0, 1.0, 1).unwrap();
        assert!(axis.is_single_point());
    }
}
