extern crate criterion;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use nlloc_loc::octree::{run_octree, OctreeConfig, SearchBox};

/// A smooth unimodal log-likelihood surface, cheap enough that the
/// benchmark measures the octree's own bookkeeping rather than the
/// evaluator.
fn synthetic_log_likelihood(x: f64, y: f64, z: f64) -> f64 {
    let (dx, dy, dz) = (x - 5.0, y - 5.0, z - 5.0);
    -(dx * dx + dy * dy + dz * dz)
}

fn octree_benchmark(c: &mut Criterion) {
    let bounds = SearchBox { x_min: 0.0, x_max: 10.0, y_min: 0.0, y_max: 10.0, z_min: 0.0, z_max: 10.0 };

    let mut group = c.benchmark_group("octree");
    for &max_num_cells in &[2_000usize, 20_000] {
        let cfg = OctreeConfig { max_num_cells, ..OctreeConfig::default() };
        group.bench_function(format!("max_num_cells={max_num_cells}"), |b| {
            b.iter(|| run_octree(&cfg, bounds, |x, y, z| black_box(synthetic_log_likelihood(x, y, z))))
        });
    }
    group.finish();
}

criterion_group!(benches, octree_benchmark);
criterion_main!(benches);
