//! Pathfinding and reachability benchmarks for tactics_core.
//!
//! Run with: `cargo bench -p tactics_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tactics_core::grid::{Cell, TerrainMap, Tile};
use tactics_core::pathfinding::find_path;
use tactics_core::reachability::compute_reachable;

/// Square map with a wall every fourth column, each broken by one gap.
fn maze(size: u32) -> TerrainMap {
    let mut terrain = TerrainMap::open(size, size);
    let edge = size as i32;
    for x in (3..edge).step_by(4) {
        let gap = if (x / 4) % 2 == 0 { edge - 1 } else { 0 };
        for y in 0..edge {
            if y != gap {
                terrain.set_tile(Cell::new(x, y), Tile::Obstacle);
            }
        }
    }
    terrain
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_path");
    for size in [16u32, 32, 64] {
        let open = TerrainMap::open(size, size);
        let walled = maze(size);
        let goal = Cell::new(size as i32 - 1, size as i32 - 1);

        group.bench_with_input(BenchmarkId::new("open", size), &open, |b, terrain| {
            b.iter(|| find_path(black_box(Cell::new(0, 0)), goal, |c| !terrain.is_walkable(c)));
        });
        group.bench_with_input(BenchmarkId::new("maze", size), &walled, |b, terrain| {
            b.iter(|| find_path(black_box(Cell::new(0, 0)), goal, |c| !terrain.is_walkable(c)));
        });
    }
    group.finish();
}

pub fn reachability_benchmark(c: &mut Criterion) {
    let terrain = maze(32);
    let mut group = c.benchmark_group("compute_reachable");
    for budget in [3u32, 8, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(budget), &budget, |b, &budget| {
            b.iter(|| compute_reachable(black_box(Cell::new(16, 16)), budget, |c| !terrain.is_walkable(c)));
        });
    }
    group.finish();
}

criterion_group!(benches, pathfinding_benchmark, reachability_benchmark);
criterion_main!(benches);
