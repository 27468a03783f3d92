// Session output events.
//
// `Session::frame()` and `Session::apply()` return the events produced while
// they ran, in order. A rendering sink can rebuild everything it needs from
// these plus `Session::snapshot()`: box highlights carry the previous row so
// the old footprint can be cleared incrementally, and `HighlightsCleared`
// tells it to drop every footprint at once.
//
// See also: `session.rs` which collects them, `scheduler.rs` which emits the
// box and note events.

use crate::types::{BoxId, CellCoord, ColorTag};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The automaton advanced one generation.
    GenerationAdvanced { generation: u64, alive: usize },
    /// The grid was rebuilt or replaced (clear, fill, resize). Redraw it all.
    GridReset { size: usize },
    /// A brush dab changed cells around `center`.
    CellsPainted { center: CellCoord },
    GridRunning { running: bool },
    MusicRunning { running: bool },
    /// A box now covers `row..row + BOX_HEIGHT` of its column. `color` is the
    /// triggered note's color, or `None` for a neutral highlight.
    BoxHighlighted {
        box_id: BoxId,
        column: usize,
        row: usize,
        previous_row: Option<usize>,
        alive: u32,
        color: Option<ColorTag>,
    },
    /// A box fell off the bottom. `last_row` is the footprint to clear.
    BoxRetired {
        box_id: BoxId,
        column: usize,
        last_row: usize,
    },
    NoteTriggered {
        box_id: BoxId,
        note_index: usize,
        pitch: u8,
        velocity: u8,
        /// Zero-based wire channel.
        channel: u8,
        duration_ms: f64,
    },
    /// Every box footprint should be un-highlighted.
    HighlightsCleared,
    KeyApplied { label: String },
    /// Human-readable output status (device lost, sink changed).
    OutputStatus { message: String },
}
