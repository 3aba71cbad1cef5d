//! Distance weighting and station-density de-weighting
//! (`LOCSTAWT`,;).

use crate::arrival::StationCoords;

/// Distance weighting: `w(d) = exp(-((d - cutoff) / cutoff)^2)` beyond
/// `cutoff`, else 1.
pub fn distance_weight(distance_km: f64, cutoff_km: Option<f64>) -> f64 {
    match cutoff_km {
        None => 1.0,
        Some(cutoff) if cutoff <= 0.0 => 1.0,
        Some(cutoff) if distance_km <= cutoff => 1.0,
        Some(cutoff) => (-((distance_km - cutoff) / cutoff).powi(2)).exp(),
    }
}

/// `LOCSTAWT` parameters: de-weight stations that sit in a dense cluster
/// so the posterior isn't biased toward regions with many closely spaced
/// stations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationWeightConfig {
    /// Radius (km) within which other stations count toward a station's
    /// local density.
    pub radius_km: f64,
    /// Decay length (km) of the exponential de-weighting kernel.
    pub decay_km: f64,
}

impl Default for StationWeightConfig {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            decay_km: 10.0,
        }
    }
}

/// Computes a per-station weight for each of `stations`, reduced by an
/// exponential kernel of the count of other stations within
/// `cfg.radius_km`, then renormalized so the mean weight is 1.
pub fn station_weights(stations: &[StationCoords], cfg: &StationWeightConfig) -> Vec<f64> {
    if stations.is_empty() {
        return Vec::new();
    }
    let mut raw = Vec::with_capacity(stations.len());
    for (i, s) in stations.iter().enumerate() {
        let mut nearby = 0usize;
        for (j, other) in stations.iter().enumerate() {
            if i == j {
                continue;
            }
            let d = ((s.x - other.x).powi(2) + (s.y - other.y).powi(2)).sqrt();
            if d <= cfg.radius_km {
                nearby += 1;
            }
        }
        raw.push((-(nearby as f64) / cfg.decay_km.max(1e-9)).exp());
    }
    let mean: f64 = raw.iter().sum::<f64>() / raw.len() as f64;
    if mean > 0.0 {
        raw.iter().map(|w| w / mean).collect()
    } else {
        vec![1.0; stations.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_weight_is_one_below_cutoff() {
        assert_eq!(distance_weight(5.0, Some(10.0)), 1.0);
        assert_eq!(distance_weight(5.0, None), 1.0);
    }

    #[test]
    fn distance_weight_decays_beyond_cutoff() {
        let w = distance_weight(30.0, Some(10.0));
        assert!(w < 1.0 && w > 0.0);
    }

    #[test]
    fn isolated_station_outweighs_clustered_ones() {
        let stations = vec![
            StationCoords { x: 0.0, y: 0.0, z: 0.0 },
            StationCoords { x: 1.0, y: 0.0, z: 0.0 },
            StationCoords { x: 2.0, y: 0.0, z: 0.0 },
            StationCoords { x: 500.0, y: 0.0, z: 0.0 },
        ];
        let cfg = StationWeightConfig::default();
        let weights = station_weights(&stations, &cfg);
        assert!(weights[3] > weights[0]);
        assert!(weights[0] > weights[1] || weights[0] == weights[1]);
    }

    #[test]
    fn mean_weight_is_normalized_to_one() {
        let stations = vec![
            StationCoords { x: 0.0, y: 0.0, z: 0.0 },
            StationCoords { x: 100.0, y: 0.0, z: 0.0 },
            StationCoords { x: 200.0, y: 0.0, z: 0.0 },
        ];
        let weights = station_weights(&stations, &StationWeightConfig::default());
        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        assert!((mean - 1.0).abs() < 1e-9);
    }
}
