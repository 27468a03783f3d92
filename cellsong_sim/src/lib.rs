// cellsong_sim — automaton grid coupled to a falling music-box MIDI scheduler.
//
// A cellular automaton runs on its own timer while "music boxes" fall down
// the grid column by column. Each time a box lands on a new block of rows it
// counts the live cells underneath, turns that density into a note, and sends
// MIDI note-on/note-off messages to a pluggable output sink.
//
// Module overview:
// - `session.rs`:   Session controller: owns everything, applies commands, runs frames.
// - `grid.rs`:      Double-buffered automaton grid, brush, clear, resize, random fill.
// - `rule.rs`:      The six automaton rules (conway .. diamoeba).
// - `fill.rs`:      Uniform / cluster / noise position generators for random fill.
// - `notes.rs`:     NoteRegistry + TriggerOrder (threshold-sorted resolution).
// - `scale.rs`:     Tonics, built-in scales, key application and randomization.
// - `scheduler.rs`: MusicBoxScheduler: cascade and scanning spawn, fall steps.
// - `dispatch.rs`:  NoteDispatcher: timed note-offs, retrigger, stop-all.
// - `output.rs`:    MidiOutput trait, OutputSink variants, message encoding.
// - `timer.rs`:     TimerQueue: cancelable one-shot, repeating, and next-frame callbacks.
// - `command.rs`:   Command, every user-surface action.
// - `event.rs`:     SessionEvent, everything a renderer or log needs to hear.
// - `config.rs`:    SessionConfig and the clamp rules for every numeric option.
// - `types.rs`:     Cell states, IDs, color tags, geometry constants.
// - `prng`:         Re-exported from `cellsong_prng`.
//
// This crate has no clock, device, or rendering dependencies. Hosts supply
// time through `Session::frame(now_ms)` and output through `OutputSink`; see
// `cellsong_midi` for a real device backend and `cellsong_host` for a
// headless real-time driver.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod event;
pub mod fill;
pub mod grid;
pub mod notes;
pub mod output;
pub use cellsong_prng as prng;
pub mod rule;
pub mod scale;
pub mod scheduler;
pub mod session;
pub mod timer;
pub mod types;
