//! Differential-time driver: joint multi-event location
//! from absolute arrivals plus inter-event differential-time
//! observations.

use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rand::Rng;

use crate::metropolis::MetropolisConfig;

/// Acceptance retries allowed before the per-event step shrinks, mirrored
/// from [`crate::metropolis`].
const TARGET_RETRIES: u32 = 4;
/// Probability threshold under which a state counts as "near zero".
const PROB_NEAR_ZERO: f64 = 1e-300;

/// One `dt_ij^k` observation: a differential arrival time between events
/// `event_i`/`event_j` at station `station`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiffObservation {
    pub station: String,
    pub event_i: u64,
    pub event_j: u64,
    pub dt_obs: f64,
    pub sigma_dt: f64,
}

/// Per-event search state (position, delta-t, misfit,
/// likelihood, step, accepted-sample count, scatter buffer, frozen/aborted
/// flags).
#[derive(Debug, Clone, PartialEq)]
pub struct EventState {
    pub event_id: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub delta_t: f64,
    pub log_likelihood: f64,
    pub step: f64,
    /// Rejections since the last accepted step, driving step grow/shrink.
    pub retries_since_accept: u32,
    pub accepted: usize,
    pub scatter: Vec<(f64, f64, f64, f64)>,
    /// Not perturbed by the search (a fixed reference event).
    pub fixed: bool,
    /// Has reached its own accepted-sample target and is skipped in the
    /// round-robin schedule.
    pub frozen: bool,
    pub aborted: bool,
}

impl EventState {
    pub fn new(event_id: u64, x: f64, y: f64, z: f64) -> Self {
        Self {
            event_id,
            x,
            y,
            z,
            delta_t: 0.0,
            log_likelihood: f64::NEG_INFINITY,
            step: 1.0,
            retries_since_accept: 0,
            accepted: 0,
            scatter: Vec::new(),
            fixed: false,
            frozen: false,
            aborted: false,
        }
    }
}

/// `LOCSEARCH DIFF` parameters plus the differential-specific "common
/// move" option.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiffLocConfig {
    pub metropolis: MetropolisConfig,
    /// Probability, per round, of attempting a common-move proposal
    /// instead of per-event steps. Useful only after warm-up.
    pub common_move_probability: f64,
    pub max_events: usize,
}

impl Default for DiffLocConfig {
    fn default() -> Self {
        Self { metropolis: MetropolisConfig::default(), common_move_probability: 0.02, max_events: 1000 }
    }
}

/// Joint multi-event driver. Holds each event's state and
/// the differential observations already matched to event-index pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffLocDriver {
    events: Vec<EventState>,
    observations: Vec<DiffObservation>,
    unmatched_observations: usize,
}

impl DiffLocDriver {
    /// Matches each observation to its two event indices by id;
    /// observations referencing an unknown event are dropped and
    /// counted rather than causing a hard failure.
    pub fn new(events: Vec<EventState>, observations: Vec<DiffObservation>) -> Self {
        let known: HashSet<u64> = events.iter().map(|e| e.event_id).collect();
        let mut unmatched = 0usize;
        let observations: Vec<DiffObservation> = observations
        .into_iter()
        .filter(|o| {
                let ok = known.contains(&o.event_i) && known.contains(&o.event_j);
                if !ok {
                    unmatched += 1;
                }
                ok
        })
        .collect();
        Self { events, observations, unmatched_observations: unmatched }
    }

    pub fn events(&self) -> &[EventState] {
        &self.events
    }

    pub fn unmatched_observations(&self) -> usize {
        self.unmatched_observations
    }

    /// Observations that matched two known event ids, in input order.
    pub fn observations(&self) -> &[DiffObservation] {
        &self.observations
    }

    /// Marks every event that is neither frozen nor fixed as aborted.
    /// Used when a round-robin loop hits its round cap before every
    /// event reaches its accepted-sample target.
    pub fn abort_unfinished(&mut self) {
        for e in &mut self.events {
            if !e.frozen && !e.fixed {
                e.aborted = true;
            }
        }
    }

    fn index_of(&self, id: u64) -> Option<usize> {
        self.events.iter().position(|e| e.event_id == id)
    }

    /// Double-difference log-likelihood for event `n` at a candidate
    /// `(x, y, z, delta_t)`, holding every other event at its current
    /// state.
    /// `travel_time(event_id, station, x, y, z)` looks up `TT_station(x,y,z)`
    /// for that event's arrival set; `None` marks an invalid lookup, which
    /// drops just that differential pair from the sample.
    pub fn event_log_likelihood<F>(&self, n: usize, candidate: (f64, f64, f64, f64), mut travel_time: F) -> f64
    where
    F: FnMut(u64, &str, f64, f64, f64) -> Option<f64>,
    {
        let event = &self.events[n];
        let (cx, cy, cz, cdt) = candidate;
        let mut log_likelihood = 0.0;
        let mut used_any = false;

        for obs in &self.observations {
            if obs.event_i != event.event_id && obs.event_j != event.event_id {
                continue;
            }
            let other_id = if obs.event_i == event.event_id { obs.event_j } else { obs.event_i };
            let Some(other_idx) = self.index_of(other_id) else { continue };
            let other = &self.events[other_idx];

            let (pos_i, dt_i) = if obs.event_i == event.event_id { ((cx, cy, cz), cdt) } else { ((other.x, other.y, other.z), other.delta_t) };
            let (pos_j, dt_j) = if obs.event_j == event.event_id { ((cx, cy, cz), cdt) } else { ((other.x, other.y, other.z), other.delta_t) };

            let Some(tt_i) = travel_time(obs.event_i, &obs.station, pos_i.0, pos_i.1, pos_i.2) else { continue };
            let Some(tt_j) = travel_time(obs.event_j, &obs.station, pos_j.0, pos_j.1, pos_j.2) else { continue };

            let ddr = (obs.dt_obs - (dt_i - dt_j)) - (tt_i - tt_j);
            log_likelihood += -0.5 * (ddr / obs.sigma_dt).powi(2);
            used_any = true;
        }

        if used_any {
            log_likelihood
        } else {
            f64::NEG_INFINITY
        }
    }

    /// True once every event is either frozen, aborted, or fixed.
    pub fn all_done(&self) -> bool {
        self.events.iter().all(|e| e.frozen || e.aborted || e.fixed)
    }

    /// One round-robin pass: a single Metropolis step for every event
    /// not fixed/frozen/aborted, in event order.
    pub fn round_robin_step<F, R>(&mut self, cfg: &DiffLocConfig, mut travel_time: F, rng: &mut R)
    where
    F: FnMut(u64, &str, f64, f64, f64) -> Option<f64>,
    R: Rng + ?Sized,
    {
        for n in 0..self.events.len() {
            if self.events[n].fixed || self.events[n].frozen || self.events[n].aborted {
                continue;
            }
            self.step_event(n, cfg, &mut travel_time, rng);
        }
    }

    fn step_event<F, R>(&mut self, n: usize, cfg: &DiffLocConfig, travel_time: &mut F, rng: &mut R)
    where
    F: FnMut(u64, &str, f64, f64, f64) -> Option<f64>,
    R: Rng + ?Sized,
    {
        let current = &self.events[n];
        if current.log_likelihood == f64::NEG_INFINITY && current.accepted == 0 {
            let ll = self.event_log_likelihood(n, (current.x, current.y, current.z, current.delta_t), &mut *travel_time);
            self.events[n].log_likelihood = ll;
        }

        let current = self.events[n].clone();
        let tau = if current.accepted < cfg.metropolis.start_save && cfg.metropolis.start_save > 0 {
            cfg.metropolis.initial_temperature
                + (1.0 - cfg.metropolis.initial_temperature) * (current.accepted as f64 / cfg.metropolis.start_save as f64)
        } else {
            1.0
        };

        let (vx, vy, vz, vt) = unit_vector_4d(rng);
        let length = tau * current.step;
        let candidate = (
            current.x + vx * length,
            current.y + vy * length,
            current.z + vz * length,
            current.delta_t + vt * length * cfg.metropolis.velocity,
        );
        let candidate_ll = self.event_log_likelihood(n, candidate, &mut *travel_time);

        let current_prob = current.log_likelihood.exp();
        let candidate_prob = candidate_ll.exp();
        let accept = if current_prob < PROB_NEAR_ZERO {
            true
        } else if candidate_prob < PROB_NEAR_ZERO {
            false
        } else if candidate_ll >= current.log_likelihood {
            true
        } else {
            rng.gen::<f64>() < (candidate_ll - current.log_likelihood).exp()
        };

        let e = &mut self.events[n];
        if accept {
            e.x = candidate.0;
            e.y = candidate.1;
            e.z = candidate.2;
            e.delta_t = candidate.3;
            e.log_likelihood = candidate_ll;
            e.accepted += 1;
            if e.retries_since_accept <= TARGET_RETRIES && e.step < cfg.metropolis.step_max {
                e.step *= 1.01;
            }
            e.retries_since_accept = 0;
            if e.accepted > cfg.metropolis.start_save && e.accepted % cfg.metropolis.skip.max(1) == 0 {
                e.scatter.push((e.x, e.y, e.z, e.log_likelihood));
            }
            if e.accepted >= cfg.metropolis.num_samples {
                e.frozen = true;
            }
        } else {
            e.retries_since_accept += 1;
            if e.retries_since_accept > TARGET_RETRIES {
                e.step = (e.step / 1.1).max(tau * cfg.metropolis.step_init);
            }
        }
    }

    /// A rare proposal of the same (Δx, Δy, Δz, Δt) for every
    /// non-fixed event simultaneously, accepted/rejected on the product
    /// of per-event likelihoods.
    pub fn try_common_move<F, R>(&mut self, step: f64, mut travel_time: F, rng: &mut R)
    where
    F: FnMut(u64, &str, f64, f64, f64) -> Option<f64>,
    R: Rng + ?Sized,
    {
        let (dx, dy, dz, dt) = unit_vector_4d(rng);
        let (dx, dy, dz, dt) = (dx * step, dy * step, dz * step, dt * step);

        let movable: Vec<usize> = (0..self.events.len()).filter(|&i| !self.events[i].fixed).collect();
        let mut total_delta = 0.0;
        let mut candidates = Vec::with_capacity(movable.len());
        for &i in &movable {
            let e = &self.events[i];
            let candidate = (e.x + dx, e.y + dy, e.z + dz, e.delta_t + dt);
            let candidate_ll = self.event_log_likelihood(i, candidate, &mut travel_time);
            total_delta += candidate_ll - e.log_likelihood;
            candidates.push((i, candidate, candidate_ll));
        }

        let accept = total_delta >= 0.0 || rng.gen::<f64>() < total_delta.exp();
        if accept {
            for (i, candidate, ll) in candidates {
                let e = &mut self.events[i];
                e.x = candidate.0;
                e.y = candidate.1;
                e.z = candidate.2;
                e.delta_t = candidate.3;
                e.log_likelihood = ll;
            }
        }
    }
}

fn unit_vector_4d<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64, f64, f64) {
    loop {
        let v = [rng.gen::<f64>() * 2.0 - 1.0, rng.gen::<f64>() * 2.0 - 1.0, rng.gen::<f64>() * 2.0 - 1.0, rng.gen::<f64>() * 2.0 - 1.0];
        let norm2: f64 = v.iter().map(|x| x * x).sum();
        if norm2 > 1e-9 && norm2 <= 1.0 {
            let norm = norm2.sqrt();
            return (v[0] / norm, v[1] / norm, v[2] / norm, v[3] / norm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn straight_line_tt(_event_id: u64, _station: &str, x: f64, y: f64, z: f64) -> Option<f64> {
        Some((x * x + y * y + z * z).sqrt() / 6.0)
    }

    #[test]
    fn unknown_event_references_are_dropped_and_counted() {
        let events = vec![EventState::new(1, 0.0, 0.0, 0.0), EventState::new(2, 2.0, 0.0, 0.0)];
        let obs = vec![
            DiffObservation { station: "STA".to_string(), event_i: 1, event_j: 2, dt_obs: 0.1, sigma_dt: 0.01 },
            DiffObservation { station: "STA".to_string(), event_i: 1, event_j: 99, dt_obs: 0.1, sigma_dt: 0.01 },
        ];
        let driver = DiffLocDriver::new(events, obs);
        assert_eq!(driver.unmatched_observations(), 1);
    }

    #[test]
    fn round_robin_step_moves_a_non_frozen_event() {
        let events = vec![EventState::new(1, 0.0, 0.0, 0.0), EventState::new(2, 2.0, 0.0, 0.0)];
        let obs = vec![DiffObservation { station: "STA".to_string(), event_i: 1, event_j: 2, dt_obs: 0.05, sigma_dt: 0.02 }];
        let mut driver = DiffLocDriver::new(events, obs);
        let cfg = DiffLocConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..50 {
            driver.round_robin_step(&cfg, straight_line_tt, &mut rng);
        }
        assert!(driver.events()[0].accepted > 0 || driver.events()[1].accepted > 0);
    }
}
