// Core types shared across the session.
//
// Cell states, box and note identifiers, color tags, and the fixed geometry
// constants that tie the grid to the music boxes: every column of the music
// layout is `BOX_WIDTH` cells wide, every box is `BOX_HEIGHT` cells tall, and
// the square grid is `BOX_WIDTH * active_column_count` cells on a side.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of one music column, in cells. Boxes are exactly one column wide.
pub const BOX_WIDTH: usize = 6;

/// Height of one music box, in cells. A fall step moves a box this far.
pub const BOX_HEIGHT: usize = 6;

/// Fewest columns the music layout allows.
pub const MIN_COLUMNS: usize = 4;

/// Most columns the music layout allows.
pub const MAX_COLUMNS: usize = 16;

/// Concurrent boxes allowed in a single column.
pub const MAX_BOXES_PER_COLUMN: usize = 4;

/// Number of MIDI channels (wire channels 0..16).
pub const MIDI_CHANNELS: u8 = 16;

/// Side length of the grid for a given column count.
pub const fn grid_size_for_columns(columns: usize) -> usize {
    BOX_WIDTH * columns
}

/// Milliseconds spanned by `beats` at `bpm`.
pub fn beats_to_ms(bpm: f64, beats: f64) -> f64 {
    (60_000.0 / bpm) * beats
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// State of one grid cell. `Dying` only appears under Brian's Brain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Dead,
    Alive,
    Dying,
}

impl CellState {
    /// Numeric encoding used in snapshots: 0 dead, 1 alive, 2 dying.
    pub fn as_u8(self) -> u8 {
        match self {
            CellState::Dead => 0,
            CellState::Alive => 1,
            CellState::Dying => 2,
        }
    }

    pub fn is_alive(self) -> bool {
        self == CellState::Alive
    }
}

/// A cell position. Row 0 is the top of the grid, where boxes spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: usize,
    pub col: usize,
}

impl CellCoord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Whether the seed brush paints live cells or erases them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brush {
    #[default]
    Draw,
    Erase,
}

// ---------------------------------------------------------------------------
// Identifiers and tags
// ---------------------------------------------------------------------------

/// Monotonic music box identifier, unique within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxId(pub u64);

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box-{}", self.0)
    }
}

/// One of the twelve note colors (`note1` .. `note12`), 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColorTag(pub u8);

impl ColorTag {
    pub const PALETTE_LEN: u8 = 12;

    /// The palette color assigned to a column (wraps after twelve columns).
    pub fn for_column(column: usize) -> Self {
        ColorTag((column % Self::PALETTE_LEN as usize) as u8 + 1)
    }
}

impl fmt::Display for ColorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_size_tracks_columns() {
        assert_eq!(grid_size_for_columns(8), 48);
        assert_eq!(grid_size_for_columns(MAX_COLUMNS), 96);
    }

    #[test]
    fn beats_to_ms_at_common_tempos() {
        assert_eq!(beats_to_ms(60.0, 1.0), 1000.0);
        assert_eq!(beats_to_ms(75.0, 1.0), 800.0);
        assert_eq!(beats_to_ms(120.0, 0.25), 125.0);
    }

    #[test]
    fn column_colors_wrap_after_palette() {
        assert_eq!(ColorTag::for_column(0).to_string(), "note1");
        assert_eq!(ColorTag::for_column(11).to_string(), "note12");
        assert_eq!(ColorTag::for_column(12), ColorTag(1));
    }

    #[test]
    fn cell_state_encoding() {
        assert_eq!(CellState::Dead.as_u8(), 0);
        assert_eq!(CellState::Alive.as_u8(), 1);
        assert_eq!(CellState::Dying.as_u8(), 2);
        assert!(!CellState::Dying.is_alive());
    }
}
