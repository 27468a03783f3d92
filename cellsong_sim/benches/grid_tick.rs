// Benchmarks for the automaton tick and the random fill generators.
//
// Grids are sized by column count the way a session sizes them (6 cells per
// column), from the default 8 columns up to the 16-column maximum.

use cellsong_sim::fill::FillAlgorithm;
use cellsong_sim::grid::Grid;
use cellsong_sim::prng::CellRng;
use cellsong_sim::rule::Rule;
use cellsong_sim::types::grid_size_for_columns;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_tick");
    for columns in [8, 16] {
        for rule in [Rule::Conway, Rule::BriansBrain] {
            let mut grid = Grid::new(grid_size_for_columns(columns), rule);
            grid.random_fill(0.35, FillAlgorithm::Uniform, &mut CellRng::new(42));
            let id = BenchmarkId::new(rule.name(), grid.size());
            group.bench_with_input(id, &grid, |b, grid| {
                let mut grid = grid.clone();
                b.iter(|| {
                    grid.tick();
                    black_box(grid.alive_count())
                });
            });
        }
    }
    group.finish();
}

fn bench_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_fill");
    let size = grid_size_for_columns(16);
    for algorithm in FillAlgorithm::ALL {
        group.bench_function(algorithm.name(), |b| {
            let mut grid = Grid::new(size, Rule::Conway);
            let mut rng = CellRng::new(7);
            b.iter(|| black_box(grid.random_fill(0.35, algorithm, &mut rng)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tick, bench_fill);
criterion_main!(benches);
