// Commands that mutate a session.
//
// Every user-surface action (buttons, sliders, selects, pointer strokes on
// the grid, the note editor) arrives as a `Command` and is applied with
// `Session::apply()`. Numeric arguments are clamped on the way in, and note
// indices past the end of the registry are ignored.
//
// Commands are serde-tagged so a host can script a session from JSON, e.g.
// `{"SetMusicBpm": {"bpm": 120}}` or `"StartMusic"`.
//
// See also: `session.rs` for `apply()`, which documents which commands
// restart a running loop.

use crate::fill::FillAlgorithm;
use crate::rule::Rule;
use crate::scale::{Scale, Tonic};
use crate::scheduler::SpawnMode;
use crate::types::{Brush, CellCoord};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    // Grid loop.
    StartGrid,
    StopGrid,
    /// Stop the grid loop and reset every cell and the generation counter.
    ClearGrid,
    /// One brush dab centered on `at`.
    Seed { at: CellCoord, brush: Brush },
    /// Replace the grid with a random pattern at the configured density and
    /// algorithm. Resets the generation counter.
    RandomFill,
    SetRule { rule: Rule },
    SetSimBpm { bpm: f64 },

    // Music loop.
    StartMusic,
    StopMusic,
    SetMusicBpm { bpm: f64 },
    SetSpawnRate { factor: f64 },
    SetSpawnMode { mode: SpawnMode },
    /// Rebuilds the grid at `6 * columns` cells on a side.
    SetColumnCount { columns: usize },
    SetFillPercent { percent: f64 },
    SetFillAlgorithm { algorithm: FillAlgorithm },

    // Key.
    SetKeyTonic { tonic: Tonic },
    SetKeyScale { scale: Scale },
    /// Rewrite note pitches for the configured key.
    ApplyKey,
    /// Pick a random key, store it, and apply it.
    RandomizeKey,

    // Note editor.
    SetNoteThreshold { index: usize, threshold: u8 },
    SetNoteActive { index: usize, active: bool },
    SetNoteDuration { index: usize, beats: f64 },
    SetNotePitch { index: usize, pitch: u8 },
    SetNoteChannel { index: usize, channel: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shapes() {
        assert_eq!(serde_json::to_string(&Command::StartMusic).unwrap(), "\"StartMusic\"");
        let cmd: Command = serde_json::from_str(r#"{"SetMusicBpm": {"bpm": 120}}"#).unwrap();
        assert_eq!(cmd, Command::SetMusicBpm { bpm: 120.0 });
        let cmd: Command = serde_json::from_str(
            r#"{"Seed": {"at": {"row": 3, "col": 4}, "brush": "erase"}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::Seed {
                at: CellCoord::new(3, 4),
                brush: Brush::Erase
            }
        );
    }

    #[test]
    fn script_roundtrip() {
        let script = vec![
            Command::SetSpawnMode {
                mode: SpawnMode::Scanning,
            },
            Command::SetKeyTonic { tonic: Tonic::FSharp },
            Command::SetNoteActive {
                index: 3,
                active: false,
            },
            Command::RandomFill,
        ];
        let json = serde_json::to_string(&script).unwrap();
        let back: Vec<Command> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
    }
}
