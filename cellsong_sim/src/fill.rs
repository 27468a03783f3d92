// Randomized fill generators.
//
// Three ways to choose `target` distinct cell indices in a `size x size`
// grid (indices are row-major, always in `0..size*size`):
//
// - Uniform:  shuffle all indices and take a prefix.
// - Clusters: random-walk blobs. Each blob starts at a random seed cell and
//             takes up to `max(6, target / 8)` steps of a random offset in
//             [-2, 2] on each axis, clamped to the grid, until `target`
//             distinct cells are lit.
// - Noise:    score every cell with a sum of sine/cosine waves seeded at a
//             random phase, plus a little jitter, and keep the `target`
//             highest scores. The wave frequency rises with density so dense
//             fills break into smaller islands.
//
// `Grid::random_fill` in `grid.rs` is the caller; it clamps density and
// computes `target` before handing off here.

use cellsong_prng::{RandomSource, shuffle_prefix};
use serde::{Deserialize, Serialize};

/// Which position generator `random_fill` uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillAlgorithm {
    #[default]
    Uniform,
    Clusters,
    Noise,
}

impl FillAlgorithm {
    pub const ALL: [FillAlgorithm; 3] = [
        FillAlgorithm::Uniform,
        FillAlgorithm::Clusters,
        FillAlgorithm::Noise,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FillAlgorithm::Uniform => "uniform",
            FillAlgorithm::Clusters => "clusters",
            FillAlgorithm::Noise => "noise",
        }
    }
}

/// Smallest random-walk blob in the cluster fill.
const MIN_CLUSTER_SIZE: usize = 6;

/// Largest per-axis step of the cluster random walk.
const CLUSTER_STEP: isize = 2;

/// Upper bound of the uniform jitter added to each noise score.
const NOISE_JITTER: f64 = 0.35;

/// Choose `target` distinct cell indices (capped at `size * size`).
pub fn fill_positions<R: RandomSource + ?Sized>(
    size: usize,
    target: usize,
    density: f64,
    algorithm: FillAlgorithm,
    rng: &mut R,
) -> Vec<usize> {
    let target = target.min(size * size);
    if target == 0 {
        return Vec::new();
    }
    match algorithm {
        FillAlgorithm::Uniform => uniform_fill(size, target, rng),
        FillAlgorithm::Clusters => cluster_fill(size, target, rng),
        FillAlgorithm::Noise => noise_fill(size, target, density, rng),
    }
}

fn uniform_fill<R: RandomSource + ?Sized>(size: usize, target: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..size * size).collect();
    shuffle_prefix(rng, &mut indices, target);
    indices.truncate(target);
    indices
}

fn cluster_fill<R: RandomSource + ?Sized>(size: usize, target: usize, rng: &mut R) -> Vec<usize> {
    let mut lit = vec![false; size * size];
    let mut selected = Vec::with_capacity(target);
    let mut add = |row: usize, col: usize, selected: &mut Vec<usize>| {
        let i = row * size + col;
        if !lit[i] {
            lit[i] = true;
            selected.push(i);
        }
    };

    let cluster_size = MIN_CLUSTER_SIZE.max(target / 8);
    let max_index = size - 1;
    while selected.len() < target {
        let mut row = rng.range_usize(0, size);
        let mut col = rng.range_usize(0, size);
        add(row, col, &mut selected);
        for _ in 0..cluster_size {
            if selected.len() >= target {
                break;
            }
            row = walk(row, rng, max_index);
            col = walk(col, rng, max_index);
            add(row, col, &mut selected);
        }
    }
    selected
}

/// One clamped random-walk step along an axis.
fn walk<R: RandomSource + ?Sized>(pos: usize, rng: &mut R, max_index: usize) -> usize {
    let offset = rng.range_usize(0, (2 * CLUSTER_STEP + 1) as usize) as isize - CLUSTER_STEP;
    pos.saturating_add_signed(offset).min(max_index)
}

fn noise_fill<R: RandomSource + ?Sized>(
    size: usize,
    target: usize,
    density: f64,
    rng: &mut R,
) -> Vec<usize> {
    let seed_x = rng.next_f64() * 1000.0;
    let seed_y = rng.next_f64() * 1000.0;
    let freq = 0.05 + density * 0.35;

    let mut scored: Vec<(usize, f64)> = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            let (r, c) = (row as f64, col as f64);
            let combined = ((r + seed_x) * freq).sin() + ((c + seed_y) * freq * 0.9).cos();
            let diagonal = ((r + c + seed_x - seed_y) * freq * 0.5).sin();
            let jitter = rng.next_f64() * NOISE_JITTER;
            scored.push((row * size + col, combined + diagonal + jitter));
        }
    }
    // Stable, so equal scores keep row-major order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(target).map(|(i, _)| i).collect()
}
