// cellsong_midi — hardware MIDI backend for cellsong sessions.
//
// Enumerates the system's MIDI output ports through `midir`, keeps track of
// which one the user prefers, and hands the session an `OutputSink` bound to
// it. The session itself never talks to `midir`; it only sees the
// `cellsong_sim::output::MidiOutput` trait.
//
// Module overview:
// - `device.rs`: DeviceSelection (preferred-or-first choice, loss detection),
//                DeviceManager (port enumeration, connect, rescan), and
//                DeviceOutput (a connected port as a `MidiOutput`).
// - `error.rs`:  MidiError.
//
// Selection logic lives in `DeviceSelection` and works on plain
// `DeviceInfo` lists, so it is tested without any MIDI hardware.

pub mod device;
pub mod error;

pub use device::{DeviceInfo, DeviceManager, DeviceOutput, DeviceSelection, Rescan, Selection};
pub use error::MidiError;
