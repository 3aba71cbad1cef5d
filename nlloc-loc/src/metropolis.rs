//! Metropolis-Hastings random-walk search.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rand::Rng;

use crate::octree::SearchBox;

/// `LOCSEARCH MET` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetropolisConfig {
    pub num_samples: usize,
    pub start_save: usize,
    pub skip: usize,
    pub step_init: f64,
    pub step_max: f64,
    /// Scales the time component of a proposal relative to space; unused
    /// by the absolute (single-event) search, which marginalizes origin
    /// time analytically, but shared with [`crate::diffloc`] where δt is
    /// an explicit free parameter.
    pub velocity: f64,
    pub initial_temperature: f64,
}

impl Default for MetropolisConfig {
    fn default() -> Self {
        Self {
            num_samples: 10_000,
            start_save: 100,
            skip: 1,
            step_init: 1.0,
            step_max: 20.0,
            velocity: 1.0,
            initial_temperature: 10.0,
        }
    }
}

/// Acceptance retries allowed before the step shrinks.
const TARGET_RETRIES: u32 = 4;
/// Probability threshold under which a state counts as "near zero".
const PROB_NEAR_ZERO: f64 = 1e-300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetropolisOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub log_likelihood: f64,
    pub probmax: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetropolisResult {
    pub outcome: MetropolisOutcome,
    /// (x, y, z, log_likelihood) samples saved after `start_save`, every
    /// `skip`-th accepted sample.
    pub scatter: Vec<(f64, f64, f64, f64)>,
    pub best: Option<BestSample>,
    pub accepted: usize,
    pub rejected: usize,
    pub clipped: usize,
}

fn clamp_to_box(x: f64, y: f64, z: f64, search_box: &SearchBox) -> (f64, f64, bool) {
    let cx = x.clamp(search_box.x_min, search_box.x_max);
    let cy = y.clamp(search_box.y_min, search_box.y_max);
    let _ = z;
    (cx, cy, cx != x || cy != y)
}

/// Runs the Metropolis search for one event. `evaluate`
/// returns the log-likelihood at a candidate (x, y, z); `cos_latitude`
/// is `Some(cos(lat))` in GLOBAL mode (horizontal step scaled from km to
/// degrees, "Step proposal"), `None` otherwise.
pub fn run_metropolis<F, R>(
    cfg: &MetropolisConfig,
    search_box: SearchBox,
    start: (f64, f64, f64),
    cos_latitude: Option<f64>,
    km_to_deg: f64,
    mut evaluate: F,
    rng: &mut R,
) -> MetropolisResult
where
F: FnMut(f64, f64, f64) -> f64,
R: Rng + ?Sized,
{
    let (mut x, mut y, mut z) = start;
    let mut current_ll = evaluate(x, y, z);

    let mut step = cfg.step_init;
    let mut retries_since_accept: u32 = 0;
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut clipped = 0usize;
    let mut scatter = Vec::new();
    let mut best: Option<BestSample> = None;
    let mut probmax = 0.0f64;

    let upper_retry_bound = 2 * TARGET_RETRIES - 1;

    loop {
        if accepted >= cfg.num_samples {
            return MetropolisResult { outcome: MetropolisOutcome::Completed, scatter, best, accepted, rejected, clipped };
        }

        let tau = if accepted < cfg.start_save && cfg.start_save > 0 {
            cfg.initial_temperature + (1.0 - cfg.initial_temperature) * (accepted as f64 / cfg.start_save as f64)
        } else {
            1.0
        };

        // Random unit 3-vector, scaled to length tau*step.
        let (mut vx, mut vy, vz) = unit_vector_3d(rng);
        if let Some(cos_lat) = cos_latitude {
            vx *= km_to_deg / cos_lat.max(1e-6);
            vy *= km_to_deg;
        }
        let length = tau * step;
        let (px, py, pz) = (x + vx * length, y + vy * length, z + vz * length);
        let (px, py, clipped_now) = clamp_to_box(px, py, pz, &search_box);
        let pz = pz.clamp(search_box.z_min, search_box.z_max);
        if clipped_now {
            clipped += 1;
        }

        let proposed_ll = evaluate(px, py, pz);
        let current_prob = current_ll.exp();
        let proposed_prob = proposed_ll.exp();

        let accept = if current_prob < PROB_NEAR_ZERO {
            true
        } else if proposed_prob < PROB_NEAR_ZERO {
            false
        } else if proposed_ll >= current_ll {
            true
        } else {
            rng.gen::<f64>() < (proposed_ll - current_ll).exp()
        };

        if accept {
            x = px;
            y = py;
            z = pz;
            current_ll = proposed_ll;

            if retries_since_accept <= TARGET_RETRIES && step < cfg.step_max {
                step *= 1.01;
            }
            retries_since_accept = 0;
            accepted += 1;

            if accepted > cfg.start_save {
                if accepted % cfg.skip.max(1) == 0 {
                    scatter.push((x, y, z, current_ll));
                }
                let prob = current_ll.exp();
                if prob > probmax {
                    probmax = prob;
                    best = Some(BestSample { x, y, z, log_likelihood: current_ll, probmax });
                }
            }
        } else {
            rejected += 1;
            retries_since_accept += 1;
            if retries_since_accept > TARGET_RETRIES {
                step = (step / 1.1).max(tau * cfg.step_init);
            }

            if retries_since_accept > upper_retry_bound {
                let fraction_done = accepted as f64 / cfg.num_samples.max(1) as f64;
                if fraction_done < 0.6 || probmax < PROB_NEAR_ZERO {
                    return MetropolisResult { outcome: MetropolisOutcome::Aborted, scatter, best, accepted, rejected, clipped };
                }
                retries_since_accept = 0;
            }
        }
    }
}

fn unit_vector_3d<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64, f64) {
    loop {
        let x = rng.gen::<f64>() * 2.0 - 1.0;
        let y = rng.gen::<f64>() * 2.0 - 1.0;
        let z = rng.gen::<f64>() * 2.0 - 1.0;
        let norm2 = x * x + y * y + z * z;
        if norm2 > 1e-9 && norm2 <= 1.0 {
            let norm = norm2.sqrt();
            return (x / norm, y / norm, z / norm);
        }
    }
}
