// MIDI note dispatcher.
//
// Turns a (pitch, velocity, duration, channel) request into a note-on now and
// a note-off later. The note-off is a `TimerKind::NoteOff` in the session's
// timer queue; its handle is kept in `active`, keyed by (channel, pitch), so
// at most one note per key is ever sounding.
//
// Retrigger: playing a key that is already sounding cancels its pending
// note-off, sends the note-off immediately, then sends the new note-on.
//
// Output failures never escape. A failed send logs a warning, drops the sink
// back to `OutputSink::Null`, and leaves a status message for the session to
// pick up with `take_status()`. With no sink bound every operation is a no-op.

use crate::output::{self, OutputSink};
use crate::timer::{TimerHandle, TimerKind, TimerQueue};
use crate::types::MIDI_CHANNELS;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct NoteDispatcher {
    sink: OutputSink,
    active: BTreeMap<(u8, u8), TimerHandle>,
    status: Option<String>,
}

impl NoteDispatcher {
    pub fn new(sink: OutputSink) -> Self {
        Self {
            sink,
            active: BTreeMap::new(),
            status: None,
        }
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Notes currently sounding, by (wire channel, pitch).
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_sounding(&self, channel: u8, pitch: u8) -> bool {
        self.active.contains_key(&(channel, pitch))
    }

    /// Start a note and schedule its release `duration_ms` from now.
    pub fn play(
        &mut self,
        timers: &mut TimerQueue,
        pitch: u8,
        velocity: u8,
        duration_ms: f64,
        channel: u8,
    ) {
        if !self.sink.is_bound() {
            return;
        }
        let (pitch, velocity, channel) = (pitch.min(127), velocity.min(127), channel % MIDI_CHANNELS);
        if let Some(pending) = self.active.remove(&(channel, pitch)) {
            timers.cancel(pending);
            self.send(output::note_off(channel, pitch));
        }
        debug!(channel, pitch, velocity, duration_ms, "note on");
        self.send(output::note_on(channel, pitch, velocity));
        let handle = timers.schedule_after(duration_ms, TimerKind::NoteOff { channel, pitch });
        self.active.insert((channel, pitch), handle);
    }

    /// A scheduled note-off fired. Stale handles (the key was retriggered or
    /// stopped since) are ignored.
    pub fn release(&mut self, handle: TimerHandle, channel: u8, pitch: u8) {
        if self.active.get(&(channel, pitch)) != Some(&handle) {
            return;
        }
        self.active.remove(&(channel, pitch));
        self.send(output::note_off(channel, pitch));
    }

    /// Silence everything: release every sounding note, then send "all notes
    /// off" on all sixteen channels.
    pub fn stop_all(&mut self, timers: &mut TimerQueue) {
        let active = std::mem::take(&mut self.active);
        for (&(channel, pitch), &handle) in &active {
            timers.cancel(handle);
            self.send(output::note_off(channel, pitch));
        }
        for channel in 0..MIDI_CHANNELS {
            self.send(output::all_notes_off(channel));
        }
    }

    /// Bind a new sink, silencing the old one first.
    pub fn set_output(&mut self, timers: &mut TimerQueue, sink: OutputSink) {
        self.stop_all(timers);
        info!(from = self.sink.name(), to = sink.name(), "MIDI output changed");
        self.sink = sink;
    }

    /// Status message left by an output failure, if any.
    pub fn take_status(&mut self) -> Option<String> {
        self.status.take()
    }

    fn send(&mut self, message: Result<Vec<u8>, output::OutputError>) {
        let result = message.and_then(|bytes| self.sink.send(&bytes));
        if let Err(err) = result {
            warn!(output = self.sink.name(), %err, "MIDI output lost, falling back to no output");
            self.status = Some(format!("MIDI output lost: {err}"));
            self.sink = OutputSink::Null;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MessageRecorder;

    fn setup() -> (NoteDispatcher, TimerQueue, MessageRecorder) {
        let recorder = MessageRecorder::new();
        let dispatcher = NoteDispatcher::new(OutputSink::device(recorder.clone()));
        (dispatcher, TimerQueue::new(), recorder)
    }

    #[test]
    fn play_sends_on_then_off_after_duration() {
        let (mut d, mut timers, rec) = setup();
        d.play(&mut timers, 60, 100, 200.0, 0);
        assert_eq!(rec.messages(), vec![vec![0x90, 60, 100]]);
        assert!(timers.pop_due(199.0).is_none());
        let (handle, kind) = timers.pop_due(200.0).unwrap();
        assert_eq!(kind, TimerKind::NoteOff { channel: 0, pitch: 60 });
        d.release(handle, 0, 60);
        assert_eq!(rec.messages()[1], vec![0x80, 60, 0]);
        assert_eq!(d.active_count(), 0);
    }

    #[test]
    fn retrigger_sends_one_off_then_one_on() {
        let (mut d, mut timers, rec) = setup();
        d.play(&mut timers, 60, 100, 200.0, 0);
        d.play(&mut timers, 60, 100, 200.0, 0);
        assert_eq!(
            rec.messages(),
            vec![vec![0x90, 60, 100], vec![0x80, 60, 0], vec![0x90, 60, 100]]
        );
        assert_eq!(d.active_count(), 1);
        assert_eq!(timers.pending(), 1);

        // Only the second note-off is still live.
        while let Some((handle, _)) = timers.pop_due(1000.0) {
            d.release(handle, 0, 60);
        }
        assert_eq!(rec.messages().len(), 4);
    }

    #[test]
    fn stop_all_releases_each_note_and_sweeps_channels() {
        let (mut d, mut timers, rec) = setup();
        d.play(&mut timers, 45, 90, 500.0, 0);
        d.play(&mut timers, 46, 90, 500.0, 1);
        d.play(&mut timers, 47, 90, 500.0, 2);
        rec.clear();

        d.stop_all(&mut timers);
        let sent = rec.messages();
        assert_eq!(sent.len(), 3 + 16);
        assert!(sent[..3].iter().all(|m| m[0] & 0xf0 == 0x80));
        for (channel, message) in sent[3..].iter().enumerate() {
            assert_eq!(message, &vec![0xB0 | channel as u8, 123, 0]);
        }
        assert_eq!(d.active_count(), 0);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn unbound_sink_is_a_no_op() {
        let mut d = NoteDispatcher::default();
        let mut timers = TimerQueue::new();
        d.play(&mut timers, 60, 100, 200.0, 0);
        d.stop_all(&mut timers);
        assert_eq!(d.active_count(), 0);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn failed_send_falls_back_to_null_with_status() {
        let (mut d, mut timers, rec) = setup();
        rec.disconnect();
        d.play(&mut timers, 60, 100, 200.0, 0);
        assert!(!d.sink().is_bound());
        assert!(d.take_status().unwrap().contains("disconnected"));
        assert!(d.take_status().is_none());
        d.play(&mut timers, 61, 100, 200.0, 0);
        assert!(!d.is_sounding(0, 61));
    }

    #[test]
    fn swapping_outputs_silences_the_old_one() {
        let (mut d, mut timers, old) = setup();
        d.play(&mut timers, 50, 100, 400.0, 4);
        let new = MessageRecorder::new();
        d.set_output(&mut timers, OutputSink::device(new.clone()));
        assert_eq!(old.messages().len(), 1 + 1 + 16);
        assert!(new.messages().is_empty());
        assert_eq!(d.sink().name(), "recorder");
    }
}
