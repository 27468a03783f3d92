// Note registry and threshold-based note resolution.
//
// The registry is an ordered bank of `NoteDefinition`s (twelve by default).
// Ordinal position matters: the key resolver assigns pitches by index, and
// the trigger ordering breaks threshold ties by index.
//
// The scheduler never walks the registry directly. It asks a `TriggerOrder`
// to resolve an alive-cell count to a note. `TriggerOrder` keeps the active
// notes sorted by threshold (descending) and rebuilds that view whenever the
// registry's `revision` differs from the one it was built against. Every
// registry mutation bumps `revision`, so a stale ordering cannot survive an
// edit.
//
// Resolution rule: the first note (most demanding threshold) whose threshold
// is <= the alive count wins. If no threshold is met but there is at least
// one active note and one alive cell, the least demanding note fires, so any
// lit box always makes a sound.
//
// See also: `scale.rs` which rewrites pitches in bulk, `scheduler.rs` which
// owns the `TriggerOrder`.

use crate::types::ColorTag;
use serde::{Deserialize, Serialize};

pub const MIN_THRESHOLD: u8 = 1;
pub const MAX_THRESHOLD: u8 = 10;
pub const MIN_DURATION_BEATS: f64 = 1.0 / 16.0;
pub const MAX_DURATION_BEATS: f64 = 4.0;
pub const MIN_CHANNEL: u8 = 1;
pub const MAX_CHANNEL: u8 = 16;
pub const MAX_PITCH: u8 = 127;

/// One playable note slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteDefinition {
    pub id: String,
    pub label: String,
    pub color: ColorTag,
    pub duration_beats: f64,
    /// Minimum alive-cell count (1..=10) for this note to be chosen.
    pub trigger_threshold: u8,
    /// MIDI pitch, 0..=127.
    pub pitch: u8,
    /// 1-based MIDI channel, 1..=16. The wire channel is `channel - 1`.
    pub channel: u8,
    pub active: bool,
}

impl NoteDefinition {
    /// Zero-based channel as sent on the wire.
    pub fn wire_channel(&self) -> u8 {
        self.channel.saturating_sub(1)
    }
}

/// Default bank: label, threshold, duration in beats. Pitches run 45..=56 and
/// channels 1..=12 in order.
const DEFAULT_BANK: [(&str, u8, f64); 12] = [
    ("A", 8, 1.0),
    ("A#", 7, 1.0),
    ("B", 6, 1.0),
    ("C", 5, 1.0),
    ("C#", 4, 1.0),
    ("D", 3, 1.0),
    ("D#", 3, 0.5),
    ("E", 5, 0.5),
    ("F", 4, 0.5),
    ("F#", 3, 0.25),
    ("G", 2, 0.25),
    ("G#", 2, 0.25),
];

const DEFAULT_BASE_PITCH: u8 = 45;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoteRegistry {
    notes: Vec<NoteDefinition>,
    revision: u64,
}

impl Default for NoteRegistry {
    fn default() -> Self {
        Self::default_bank()
    }
}

impl NoteRegistry {
    /// A registry over arbitrary definitions. Values are clamped into range.
    pub fn new(notes: Vec<NoteDefinition>) -> Self {
        let notes = notes
            .into_iter()
            .map(|mut n| {
                n.trigger_threshold = clamp_threshold(n.trigger_threshold);
                n.duration_beats = clamp_duration(n.duration_beats);
                n.pitch = n.pitch.min(MAX_PITCH);
                n.channel = n.channel.clamp(MIN_CHANNEL, MAX_CHANNEL);
                n
            })
            .collect();
        Self { notes, revision: 0 }
    }

    /// The built-in twelve-note bank.
    pub fn default_bank() -> Self {
        let notes = DEFAULT_BANK
            .iter()
            .enumerate()
            .map(|(i, &(label, threshold, duration))| NoteDefinition {
                id: format!("note{}", i + 1),
                label: label.to_string(),
                color: ColorTag(i as u8 + 1),
                duration_beats: duration,
                trigger_threshold: threshold,
                pitch: DEFAULT_BASE_PITCH + i as u8,
                channel: i as u8 + 1,
                active: true,
            })
            .collect();
        Self::new(notes)
    }

    pub fn notes(&self) -> &[NoteDefinition] {
        &self.notes
    }

    pub fn get(&self, index: usize) -> Option<&NoteDefinition> {
        self.notes.get(index)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Bumped on every mutation. Derived views compare against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Unknown indices are ignored.
    pub fn set_threshold(&mut self, index: usize, threshold: u8) {
        self.edit(index, |n| n.trigger_threshold = clamp_threshold(threshold));
    }

    pub fn set_active(&mut self, index: usize, active: bool) {
        self.edit(index, |n| n.active = active);
    }

    pub fn set_duration(&mut self, index: usize, beats: f64) {
        self.edit(index, |n| n.duration_beats = clamp_duration(beats));
    }

    pub fn set_pitch(&mut self, index: usize, pitch: u8) {
        self.edit(index, |n| n.pitch = pitch.min(MAX_PITCH));
    }

    pub fn set_channel(&mut self, index: usize, channel: u8) {
        self.edit(index, |n| n.channel = channel.clamp(MIN_CHANNEL, MAX_CHANNEL));
    }

    /// Rewrite every pitch from its ordinal index in one revision bump.
    pub fn assign_pitches(&mut self, mut pitch_for: impl FnMut(usize) -> u8) {
        for (i, note) in self.notes.iter_mut().enumerate() {
            note.pitch = pitch_for(i).min(MAX_PITCH);
        }
        self.revision += 1;
    }

    fn edit(&mut self, index: usize, f: impl FnOnce(&mut NoteDefinition)) {
        if let Some(note) = self.notes.get_mut(index) {
            f(note);
            self.revision += 1;
        }
    }
}

fn clamp_threshold(threshold: u8) -> u8 {
    threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

fn clamp_duration(beats: f64) -> f64 {
    if beats.is_finite() {
        beats.clamp(MIN_DURATION_BEATS, MAX_DURATION_BEATS)
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Trigger ordering
// ---------------------------------------------------------------------------

/// Active note indices sorted by threshold, most demanding first.
#[derive(Clone, Debug, Default)]
pub struct TriggerOrder {
    built_at: Option<u64>,
    order: Vec<usize>,
}

impl TriggerOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry indices in trigger order, rebuilt if the registry changed.
    pub fn ordered(&mut self, registry: &NoteRegistry) -> &[usize] {
        if self.built_at != Some(registry.revision()) {
            let notes = registry.notes();
            self.order = (0..notes.len()).filter(|&i| notes[i].active).collect();
            // Stable: equal thresholds keep registry order.
            self.order
                .sort_by(|&a, &b| notes[b].trigger_threshold.cmp(&notes[a].trigger_threshold));
            self.built_at = Some(registry.revision());
        }
        &self.order
    }

    /// The registry index of the note an alive count triggers, if any.
    pub fn resolve(&mut self, registry: &NoteRegistry, alive: u32) -> Option<usize> {
        if alive == 0 {
            return None;
        }
        let order = self.ordered(registry);
        order
            .iter()
            .copied()
            .find(|&i| u32::from(registry.notes()[i].trigger_threshold) <= alive)
            .or_else(|| order.last().copied())
    }
}
