// MIDI output capability and sink selection.
//
// Everything the dispatcher sends goes through an `OutputSink`:
// - `Null`:    no output bound; sends are silently dropped.
// - `Console`: logs each message through `tracing` (target `cellsong::midi`)
//              instead of sending it anywhere.
// - `Device`:  any `MidiOutput` implementation; the real backend lives in the
//              `cellsong_midi` crate, tests use `MessageRecorder`.
//
// Message bytes are produced with `midly`'s live-event encoder, so every
// message on the wire is a plain 3-byte channel message
// (status | channel, data1, data2).

use midly::MidiMessage;
use midly::live::LiveEvent;
use midly::num::{u4, u7};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::info;

/// Controller number for "all notes off".
pub const ALL_NOTES_OFF: u8 = 123;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("MIDI output \"{0}\" is disconnected")]
    Disconnected(String),
    #[error("failed to send MIDI message: {0}")]
    Send(String),
    #[error("failed to encode MIDI message: {0}")]
    Encode(#[from] std::io::Error),
}

/// A destination for raw MIDI messages.
pub trait MidiOutput {
    fn name(&self) -> &str;
    fn send(&mut self, message: &[u8]) -> Result<(), OutputError>;
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode(channel: u8, message: MidiMessage) -> Result<Vec<u8>, OutputError> {
    let event = LiveEvent::Midi {
        channel: u4::new(channel & 0x0f),
        message,
    };
    let mut buf = Vec::with_capacity(3);
    event.write_std(&mut buf)?;
    Ok(buf)
}

pub fn note_on(channel: u8, pitch: u8, velocity: u8) -> Result<Vec<u8>, OutputError> {
    encode(
        channel,
        MidiMessage::NoteOn {
            key: u7::new(pitch & 0x7f),
            vel: u7::new(velocity & 0x7f),
        },
    )
}

pub fn note_off(channel: u8, pitch: u8) -> Result<Vec<u8>, OutputError> {
    encode(
        channel,
        MidiMessage::NoteOff {
            key: u7::new(pitch & 0x7f),
            vel: u7::new(0),
        },
    )
}

pub fn all_notes_off(channel: u8) -> Result<Vec<u8>, OutputError> {
    encode(
        channel,
        MidiMessage::Controller {
            controller: u7::new(ALL_NOTES_OFF),
            value: u7::new(0),
        },
    )
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub enum OutputSink {
    #[default]
    Null,
    Console,
    Device(Box<dyn MidiOutput>),
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSink::Null => f.write_str("Null"),
            OutputSink::Console => f.write_str("Console"),
            OutputSink::Device(out) => write!(f, "Device({:?})", out.name()),
        }
    }
}

impl OutputSink {
    pub fn device(output: impl MidiOutput + 'static) -> Self {
        OutputSink::Device(Box::new(output))
    }

    /// Whether sends go anywhere at all.
    pub fn is_bound(&self) -> bool {
        !matches!(self, OutputSink::Null)
    }

    pub fn name(&self) -> &str {
        match self {
            OutputSink::Null => "none",
            OutputSink::Console => "console",
            OutputSink::Device(out) => out.name(),
        }
    }

    pub fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        match self {
            OutputSink::Null => Ok(()),
            OutputSink::Console => {
                info!(target: "cellsong::midi", bytes = ?message, "send");
                Ok(())
            }
            OutputSink::Device(out) => out.send(message),
        }
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Captures every message it is sent. Clones share one log, so a test can
/// keep a handle after moving the recorder into a sink.
#[derive(Clone, Debug, Default)]
pub struct MessageRecorder {
    log: Rc<RefCell<Vec<Vec<u8>>>>,
    disconnected: Rc<Cell<bool>>,
}

impl MessageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Vec<u8>> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Make every later send fail, as if the device was unplugged.
    pub fn disconnect(&self) {
        self.disconnected.set(true);
    }
}

impl MidiOutput for MessageRecorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn send(&mut self, message: &[u8]) -> Result<(), OutputError> {
        if self.disconnected.get() {
            return Err(OutputError::Disconnected(self.name().to_string()));
        }
        self.log.borrow_mut().push(message.to_vec());
        Ok(())
    }
}
