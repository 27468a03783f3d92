// The automaton grid (Grid Engine).
//
// A square `size x size` matrix of `CellState`, stored as two flat row-major
// buffers: `current` is the live generation, read by rendering and by the
// music scheduler's density sampling; `next` is scratch space that `tick()`
// writes into before swapping the two. Because `tick()` takes `&mut self` and
// swaps only after every cell has been computed, no reader can ever observe a
// half-computed generation.
//
// Boundaries are fixed, not toroidal: out-of-bounds neighbors read as dead.
// Out-of-bounds writes are no-ops.
//
// Besides the tick, the grid supports the seed brush (`seed`), `clear`, a
// wholesale `resize` when the music column count changes, and `random_fill`
// (the position generators live in `fill.rs`).
//
// See also: `rule.rs` for the transition functions, `scheduler.rs` for the
// only other reader (`alive_in_block`), `session.rs` which owns the grid and
// its repeating tick timer.

use crate::fill::{self, FillAlgorithm};
use crate::rule::Rule;
use crate::types::{Brush, CellCoord, CellState};
use cellsong_prng::RandomSource;

/// Probability that each non-center cell of the 3x3 brush is affected.
pub const BRUSH_NEIGHBOR_CHANCE: f64 = 0.6;

/// Double-buffered automaton grid.
#[derive(Clone, Debug)]
pub struct Grid {
    size: usize,
    /// Live generation, row-major: index = row * size + col.
    current: Vec<CellState>,
    /// Scratch buffer for the generation being computed.
    next: Vec<CellState>,
    generation: u64,
    rule: Rule,
}

impl Grid {
    /// An all-dead grid at generation 0.
    pub fn new(size: usize, rule: Rule) -> Self {
        Self {
            size,
            current: vec![CellState::Dead; size * size],
            next: vec![CellState::Dead; size * size],
            generation: 0,
            rule,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cell_count(&self) -> usize {
        self.size * self.size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    /// Select the rule used by the next `tick()`.
    pub fn set_rule(&mut self, rule: Rule) {
        self.rule = rule;
    }

    /// The live generation, row-major.
    pub fn cells(&self) -> &[CellState] {
        &self.current
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        self.in_bounds(row, col).then_some(row * self.size + col)
    }

    /// Read a cell. Out-of-bounds reads are `Dead`.
    pub fn get(&self, row: usize, col: usize) -> CellState {
        self.index(row, col)
            .map_or(CellState::Dead, |i| self.current[i])
    }

    /// Write a cell in the live buffer. No-op out of bounds.
    pub fn set(&mut self, row: usize, col: usize, state: CellState) {
        if let Some(i) = self.index(row, col) {
            self.current[i] = state;
        }
    }

    pub fn alive_count(&self) -> usize {
        self.current.iter().filter(|c| c.is_alive()).count()
    }

    /// Count of the 8 neighbors of `(row, col)` that are in `reference` state.
    pub fn count_neighbors(&self, row: usize, col: usize, reference: CellState) -> u8 {
        let mut count = 0;
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let (Some(r), Some(c)) = (row.checked_add_signed(dr), col.checked_add_signed(dc))
                else {
                    continue;
                };
                if self.in_bounds(r, c) && self.current[r * self.size + c] == reference {
                    count += 1;
                }
            }
        }
        count
    }

    /// Number of `Alive` cells in the block starting at `(row, col)`,
    /// clipped to the grid.
    pub fn alive_in_block(&self, row: usize, col: usize, height: usize, width: usize) -> u32 {
        let row_end = row.saturating_add(height).min(self.size);
        let col_end = col.saturating_add(width).min(self.size);
        let mut count = 0;
        for r in row..row_end {
            let line = &self.current[r * self.size..(r + 1) * self.size];
            count += line[col.min(col_end)..col_end]
                .iter()
                .filter(|c| c.is_alive())
                .count() as u32;
        }
        count
    }

    /// Advance one generation under the current rule and swap buffers.
    pub fn tick(&mut self) {
        let size = self.size;
        for row in 0..size {
            for col in 0..size {
                let i = row * size + col;
                let neighbors = self.count_neighbors(row, col, CellState::Alive);
                self.next[i] = self.rule.next_state(self.current[i], neighbors);
            }
        }
        std::mem::swap(&mut self.current, &mut self.next);
        self.generation += 1;
    }

    /// Paint or erase a 3x3 neighborhood around `center`.
    ///
    /// The center cell is always affected; each of the eight surrounding cells
    /// independently with probability `BRUSH_NEIGHBOR_CHANCE`. Cells outside
    /// the grid are skipped without consuming a random draw.
    pub fn seed<R: RandomSource + ?Sized>(&mut self, center: CellCoord, brush: Brush, rng: &mut R) {
        let state = match brush {
            Brush::Draw => CellState::Alive,
            Brush::Erase => CellState::Dead,
        };
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                let (Some(r), Some(c)) = (
                    center.row.checked_add_signed(dr),
                    center.col.checked_add_signed(dc),
                ) else {
                    continue;
                };
                if !self.in_bounds(r, c) {
                    continue;
                }
                let is_center = dr == 0 && dc == 0;
                if is_center || rng.chance(BRUSH_NEIGHBOR_CHANCE) {
                    self.set(r, c, state);
                }
            }
        }
    }

    /// Reset both buffers to dead and the generation counter to 0.
    pub fn clear(&mut self) {
        self.current.fill(CellState::Dead);
        self.next.fill(CellState::Dead);
        self.generation = 0;
    }

    /// Replace the grid with a fresh all-dead one of a new side length.
    pub fn resize(&mut self, size: usize) {
        *self = Grid::new(size, self.rule);
    }

    /// Replace the live generation with a random pattern.
    ///
    /// `density` is clamped to [0, 1]; at least one cell is lit. Generation
    /// resets to 0. Returns the number of live cells placed.
    pub fn random_fill<R: RandomSource + ?Sized>(
        &mut self,
        density: f64,
        algorithm: FillAlgorithm,
        rng: &mut R,
    ) -> usize {
        self.clear();
        let total = self.cell_count();
        if total == 0 {
            return 0;
        }
        let density = if density.is_finite() { density.clamp(0.0, 1.0) } else { 0.0 };
        let target = ((total as f64 * density).floor() as usize).clamp(1, total);
        let positions = fill::fill_positions(self.size, target, density, algorithm, rng);
        for &i in &positions {
            self.current[i] = CellState::Alive;
        }
        positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellsong_prng::{CellRng, ScriptedRng};

    fn glider(grid: &mut Grid) {
        for (r, c) in [(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)] {
            grid.set(r, c, CellState::Alive);
        }
    }

    #[test]
    fn new_grid_is_all_dead() {
        let grid = Grid::new(12, Rule::Conway);
        assert_eq!(grid.cell_count(), 144);
        assert_eq!(grid.alive_count(), 0);
        assert_eq!(grid.generation(), 0);
    }

    #[test]
    fn out_of_bounds_reads_dead_and_writes_ignored() {
        let mut grid = Grid::new(4, Rule::Conway);
        grid.set(4, 0, CellState::Alive);
        grid.set(0, 99, CellState::Alive);
        assert_eq!(grid.alive_count(), 0);
        assert_eq!(grid.get(10, 10), CellState::Dead);
    }

    #[test]
    fn corner_neighbors_do_not_wrap() {
        let mut grid = Grid::new(4, Rule::Conway);
        grid.set(3, 3, CellState::Alive);
        grid.set(0, 3, CellState::Alive);
        grid.set(3, 0, CellState::Alive);
        assert_eq!(grid.count_neighbors(0, 0, CellState::Alive), 0);
        grid.set(1, 1, CellState::Alive);
        assert_eq!(grid.count_neighbors(0, 0, CellState::Alive), 1);
    }

    #[test]
    fn blinker_oscillates() {
        let mut grid = Grid::new(5, Rule::Conway);
        for c in 1..4 {
            grid.set(2, c, CellState::Alive);
        }
        grid.tick();
        for r in 1..4 {
            assert_eq!(grid.get(r, 2), CellState::Alive);
        }
        assert_eq!(grid.get(2, 1), CellState::Dead);
        assert_eq!(grid.generation(), 1);
        grid.tick();
        assert_eq!(grid.get(2, 1), CellState::Alive);
        assert_eq!(grid.get(1, 2), CellState::Dead);
    }

    #[test]
    fn glider_translates_after_four_generations() {
        let mut grid = Grid::new(10, Rule::Conway);
        glider(&mut grid);
        for _ in 0..4 {
            grid.tick();
        }
        for (r, c) in [(1, 2), (2, 3), (3, 1), (3, 2), (3, 3)] {
            assert_eq!(grid.get(r, c), CellState::Alive, "({r}, {c})");
        }
        assert_eq!(grid.alive_count(), 5);
    }

    #[test]
    fn tick_is_deterministic() {
        let mut rng = CellRng::new(42);
        let mut seeded = Grid::new(24, Rule::HighLife);
        seeded.random_fill(0.4, FillAlgorithm::Uniform, &mut rng);

        let mut a = seeded.clone();
        let mut b = seeded.clone();
        for _ in 0..10 {
            a.tick();
            b.tick();
        }
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn brians_brain_leaves_dying_trail() {
        let mut grid = Grid::new(6, Rule::BriansBrain);
        grid.set(2, 2, CellState::Alive);
        grid.set(2, 3, CellState::Alive);
        grid.tick();
        assert_eq!(grid.get(2, 2), CellState::Dying);
        assert_eq!(grid.get(2, 3), CellState::Dying);
        // Cells touching exactly two live cells are born.
        assert_eq!(grid.get(1, 2), CellState::Alive);
        grid.tick();
        assert_eq!(grid.get(2, 2), CellState::Dead);
    }

    #[test]
    fn rule_change_applies_on_next_tick() {
        let mut grid = Grid::new(5, Rule::Conway);
        grid.set(2, 2, CellState::Alive);
        grid.set(2, 3, CellState::Alive);
        grid.set_rule(Rule::Seeds);
        grid.tick();
        assert_eq!(grid.get(2, 2), CellState::Dead);
        assert_eq!(grid.get(1, 2), CellState::Alive);
    }

    #[test]
    fn clear_then_tick_counts_from_zero() {
        let mut grid = Grid::new(8, Rule::Conway);
        glider(&mut grid);
        grid.tick();
        grid.clear();
        assert_eq!(grid.generation(), 0);
        assert_eq!(grid.alive_count(), 0);
        grid.tick();
        assert_eq!(grid.generation(), 1);
        assert_eq!(grid.alive_count(), 0);
    }

    #[test]
    fn brush_always_hits_center() {
        let mut grid = Grid::new(8, Rule::Conway);
        let mut never = ScriptedRng::constant(0.99);
        grid.seed(CellCoord::new(4, 4), Brush::Draw, &mut never);
        assert_eq!(grid.alive_count(), 1);
        assert_eq!(grid.get(4, 4), CellState::Alive);
    }

    #[test]
    fn brush_fills_neighborhood_when_every_flip_succeeds() {
        let mut grid = Grid::new(8, Rule::Conway);
        let mut always = ScriptedRng::constant(0.0);
        grid.seed(CellCoord::new(4, 4), Brush::Draw, &mut always);
        assert_eq!(grid.alive_count(), 9);
        assert_eq!(grid.alive_in_block(3, 3, 3, 3), 9);
    }

    #[test]
    fn brush_at_corner_skips_outside_cells() {
        let mut grid = Grid::new(8, Rule::Conway);
        let mut always = ScriptedRng::constant(0.0);
        grid.seed(CellCoord::new(0, 0), Brush::Draw, &mut always);
        assert_eq!(grid.alive_count(), 4);
        // Only the three in-bounds neighbors draw a coin flip.
        assert_eq!(always.draws(), 3);
    }

    #[test]
    fn erase_brush_clears_cells() {
        let mut grid = Grid::new(8, Rule::Conway);
        let mut always = ScriptedRng::constant(0.0);
        grid.seed(CellCoord::new(4, 4), Brush::Draw, &mut always);
        grid.seed(CellCoord::new(4, 4), Brush::Erase, &mut always);
        assert_eq!(grid.alive_count(), 0);
    }

    #[test]
    fn alive_in_block_clips_at_edges() {
        let mut grid = Grid::new(6, Rule::Conway);
        grid.set(5, 5, CellState::Alive);
        grid.set(4, 4, CellState::Alive);
        grid.set(0, 0, CellState::Alive);
        assert_eq!(grid.alive_in_block(3, 3, 6, 6), 2);
        assert_eq!(grid.alive_in_block(0, 0, 6, 6), 3);
        assert_eq!(grid.alive_in_block(6, 0, 6, 6), 0);
    }

    #[test]
    fn resize_starts_fresh() {
        let mut grid = Grid::new(24, Rule::Diamoeba);
        glider(&mut grid);
        grid.tick();
        grid.resize(36);
        assert_eq!(grid.size(), 36);
        assert_eq!(grid.alive_count(), 0);
        assert_eq!(grid.generation(), 0);
        assert_eq!(grid.rule(), Rule::Diamoeba);
    }

    #[test]
    fn full_uniform_fill_lights_every_cell() {
        let mut rng = CellRng::new(7);
        let mut grid = Grid::new(12, Rule::Conway);
        grid.tick();
        let placed = grid.random_fill(1.0, FillAlgorithm::Uniform, &mut rng);
        assert_eq!(placed, 144);
        assert_eq!(grid.alive_count(), 144);
        assert_eq!(grid.generation(), 0);
    }

    #[test]
    fn tiny_density_still_places_one_cell() {
        let mut rng = CellRng::new(7);
        let mut grid = Grid::new(4, Rule::Conway);
        assert_eq!(grid.random_fill(0.01, FillAlgorithm::Clusters, &mut rng), 1);
        assert_eq!(grid.alive_count(), 1);
    }
}
