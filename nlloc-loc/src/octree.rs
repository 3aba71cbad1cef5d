//! Adaptive octree search: importance-sampled subdivision
//! of the search box, keyed by cell value times cell volume.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rand::Rng;

/// `LOCSEARCH OCT` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OctreeConfig {
    pub nx_init: usize,
    pub ny_init: usize,
    pub nz_init: usize,
    /// Largest edge length (km) below which a leaf is never refined
    /// further.
    pub min_node_size: f64,
    /// Hard cap on the total number of cells ever inserted (
    /// "configured maximum total node count").
    pub max_num_cells: usize,
    /// Early-stop once the best remaining queue entry's weight drops
    /// below this fraction of the cumulative recorded mass (an
    /// approximation of "posterior coverage", "(b) an
    /// early-stop criterion based on posterior coverage").
    pub coverage_fraction: f64,
    pub num_scatter: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            nx_init: 8,
            ny_init: 8,
            nz_init: 8,
            min_node_size: 0.05,
            max_num_cells: 20_000,
            coverage_fraction: 1e-4,
            num_scatter: 5000,
        }
    }
}

/// Axis-aligned search box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl SearchBox {
    pub fn volume(&self) -> f64 {
        (self.x_max - self.x_min) * (self.y_max - self.y_min) * (self.z_max - self.z_min)
    }
}

/// One octree cell: center, half-extents, evaluated log-likelihood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeNode {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// Log-likelihood evaluated at the cell center.
    pub value: f64,
    /// `false` for a center that fell outside a needed travel-time grid
    ///: pushed with a fixed very-low value and
    /// never subdivided.
    pub refinable: bool,
    insertion_index: usize,
}

impl OctreeNode {
    pub fn volume(&self) -> f64 {
        self.dx * self.dy * self.dz
    }

    pub fn bounds(&self) -> SearchBox {
        SearchBox {
            x_min: self.x - self.dx / 2.0,
            x_max: self.x + self.dx / 2.0,
            y_min: self.y - self.dy / 2.0,
            y_max: self.y + self.dy / 2.0,
            z_min: self.z - self.dz / 2.0,
            z_max: self.z + self.dz / 2.0,
        }
    }

    fn score(&self) -> f64 {
        if self.value == f64::NEG_INFINITY {
            f64::NEG_INFINITY
        } else {
            self.value + self.volume().ln()
        }
    }
}

/// Queue entry: ordered by score, older insertion wins ties (
/// "Tie-breaking": deterministic for given inputs).
struct QueueEntry(OctreeNode);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.score() == other.0.score() && self.0.insertion_index == other.0.insertion_index
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
        .score()
        .partial_cmp(&other.0.score())
        .unwrap_or(Ordering::Equal)
        .then_with(|| other.0.insertion_index.cmp(&self.0.insertion_index))
    }
}

/// Outcome of a full octree run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OctreeOutcome {
    Completed,
    /// Every initial cell returned -infinity.
    Aborted,
    /// The top-ranked leaf lies on the search-box boundary.
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OctreeResult {
    pub outcome: OctreeOutcome,
    pub leaves: Vec<OctreeNode>,
    pub total_volume: f64,
}

impl OctreeResult {
    /// The best (highest log-likelihood) recorded leaf, if any.
    pub fn best(&self) -> Option<&OctreeNode> {
        self.leaves
        .iter()
        .filter(|l| l.value > f64::NEG_INFINITY)
        .max_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal))
    }

    /// Draws `cfg.num_scatter` (x, y, z, log_likelihood) samples
    /// proportional to leaf weight.
    pub fn draw_scatter<R: Rng + ?Sized>(&self, num: usize, rng: &mut R) -> Vec<(f64, f64, f64, f64)> {
        let weighted: Vec<(f64, &OctreeNode)> = self
        .leaves
        .iter()
        .filter(|l| l.value > f64::NEG_INFINITY)
        .map(|l| ((l.value.exp()) * l.volume(), l))
        .collect();
        let total: f64 = weighted.iter().map(|(w, _)| *w).sum();
        if total <= 0.0 || weighted.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(num);
        for _ in 0..num {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = weighted[0].1;
            for (w, node) in &weighted {
                target -= *w;
                chosen = node;
                if target <= 0.0 {
                    break;
                }
            }
            let bounds = chosen.bounds();
            let x = rng.gen_range(bounds.x_min..=bounds.x_max);
            let y = rng.gen_range(bounds.y_min..=bounds.y_max);
            let z = rng.gen_range(bounds.z_min..=bounds.z_max);
            out.push((x, y, z, chosen.value));
        }
        out
    }
}

/// Runs the octree search. `evaluate` computes the
/// log-likelihood at a candidate center; it returns `f64::NEG_INFINITY`
/// for a point the evaluator cannot score (out-of-grid for some needed
/// arrival), which this search treats as a sentinel value rather than
/// an error.
pub fn run_octree<F>(cfg: &OctreeConfig, search_box: SearchBox, mut evaluate: F) -> OctreeResult
where
F: FnMut(f64, f64, f64) -> f64,
{
    let mut insertion_index = 0usize;
    let mut queue: BinaryHeap<QueueEntry> = BinaryHeap::new();
    let mut leaves: Vec<OctreeNode> = Vec::new();
    let mut total_cells = 0usize;
    let mut recorded_mass = 0.0f64;

    let dx0 = (search_box.x_max - search_box.x_min) / cfg.nx_init as f64;
    let dy0 = (search_box.y_max - search_box.y_min) / cfg.ny_init as f64;
    let dz0 = (search_box.z_max - search_box.z_min) / cfg.nz_init as f64;

    let mut any_finite = false;
    for iz in 0..cfg.nz_init {
        for iy in 0..cfg.ny_init {
            for ix in 0..cfg.nx_init {
                let x = search_box.x_min + (ix as f64 + 0.5) * dx0;
                let y = search_box.y_min + (iy as f64 + 0.5) * dy0;
                let z = search_box.z_min + (iz as f64 + 0.5) * dz0;
                let value = evaluate(x, y, z);
                any_finite |= value > f64::NEG_INFINITY;
                let node = OctreeNode {
                    x,
                    y,
                    z,
                    dx: dx0,
                    dy: dy0,
                    dz: dz0,
                    value,
                    refinable: value > f64::NEG_INFINITY,
                    insertion_index,
                };
                insertion_index += 1;
                total_cells += 1;
                queue.push(QueueEntry(node));
            }
        }
    }

    if !any_finite {
        return OctreeResult { outcome: OctreeOutcome::Aborted, leaves, total_volume: 0.0 };
    }

    while let Some(QueueEntry(node)) = queue.pop() {
        let max_edge = node.dx.max(node.dy).max(node.dz);
        let too_small = max_edge < cfg.min_node_size;
        if too_small || !node.refinable || total_cells >= cfg.max_num_cells {
            if node.value > f64::NEG_INFINITY {
                recorded_mass += node.value.exp() * node.volume();
            }
            leaves.push(node);
            if total_cells >= cfg.max_num_cells {
                break;
            }
            continue;
        }

        let top_score = node.score();
        if recorded_mass > 0.0 && top_score.exp() < cfg.coverage_fraction * recorded_mass {
            leaves.push(node);
            break;
        }

        let (hx, hy, hz) = (node.dx / 2.0, node.dy / 2.0, node.dz / 2.0);
        for sx in [-0.25, 0.25] {
            for sy in [-0.25, 0.25] {
                for sz in [-0.25, 0.25] {
                    let cx = node.x + sx * node.dx;
                    let cy = node.y + sy * node.dy;
                    let cz = node.z + sz * node.dz;
                    let value = evaluate(cx, cy, cz);
                    let child = OctreeNode {
                        x: cx,
                        y: cy,
                        z: cz,
                        dx: hx,
                        dy: hy,
                        dz: hz,
                        value,
                        refinable: value > f64::NEG_INFINITY,
                        insertion_index,
                    };
                    insertion_index += 1;
                    total_cells += 1;
                    queue.push(QueueEntry(child));
                }
            }
        }
    }

    // drain remaining queue entries into leaves so volume conservation holds exactly
    while let Some(QueueEntry(node)) = queue.pop() {
        leaves.push(node);
    }

    let outcome = match leaves.iter().max_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal)) {
        Some(best) if on_boundary(best, &search_box) => OctreeOutcome::Rejected,
        _ => OctreeOutcome::Completed,
    };
    let total_volume = leaves.iter().map(|l| l.volume()).sum();

    OctreeResult { outcome, leaves, total_volume }
}

fn on_boundary(node: &OctreeNode, search_box: &SearchBox) -> bool {
    let eps = node.dx.min(node.dy).min(node.dz) * 0.01;
    (node.x - search_box.x_min).abs() < eps
    || (search_box.x_max - node.x).abs() < eps
    || (node.y - search_box.y_min).abs() < eps
    || (search_box.y_max - node.y).abs() < eps
    || (node.z - search_box.z_min).abs() < eps
    || (search_box.z_max - node.z).abs() < eps
}
