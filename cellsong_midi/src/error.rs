// Errors from the MIDI device backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MidiError {
    /// The platform MIDI client could not be created at all.
    #[error("unable to initialize MIDI: {0}")]
    Init(String),
    #[error("no MIDI output named \"{0}\"")]
    UnknownDevice(String),
    #[error("unable to connect to \"{name}\": {reason}")]
    Connect { name: String, reason: String },
}
