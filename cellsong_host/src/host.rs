// The real-time host loop.
//
// `Host::run()` feeds the session wall-clock timestamps (milliseconds since
// the loop started) about every `frame_ms`, the way a browser feeds
// animation frames. Each `step()`:
//   1. applies script commands that have come due,
//   2. runs `Session::frame(now_ms)`,
//   3. every `device_poll_ms`, checks the MIDI output: a vanished device
//      drops the session to the null sink; with nothing bound (including
//      after a failed send), a rescan binds the preferred or first device.
// Every session event is logged through `tracing`.
//
// Shutdown stops music (sending note-offs and all-notes-off on every
// channel) before the process exits.
//
// See also: `cellsong_midi::device` for device selection,
// `cellsong_sim::session` for the session being driven.

use crate::render::render_ascii;
use crate::script::Script;
use cellsong_midi::DeviceManager;
use cellsong_sim::command::Command;
use cellsong_sim::event::SessionEvent;
use cellsong_sim::output::OutputSink;
use cellsong_sim::session::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct HostOptions {
    /// Stop after this many seconds. Runs until interrupted when `None`.
    pub seconds: Option<f64>,
    /// Print an ASCII snapshot this often.
    pub render_every_ms: Option<f64>,
    pub device_poll_ms: f64,
    pub frame_ms: u64,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            seconds: None,
            render_every_ms: None,
            device_poll_ms: 2000.0,
            frame_ms: 16,
        }
    }
}

pub struct Host {
    session: Session,
    devices: Option<DeviceManager>,
    script: Script,
    options: HostOptions,
    last_poll_ms: f64,
    last_render_ms: Option<f64>,
    last_status: Option<String>,
}

impl Host {
    pub fn new(
        session: Session,
        devices: Option<DeviceManager>,
        script: Script,
        options: HostOptions,
    ) -> Self {
        Self {
            session,
            devices,
            script,
            options,
            last_poll_ms: 0.0,
            last_render_ms: None,
            last_status: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One frame at `now_ms`. Returns every event it produced.
    pub fn step(&mut self, now_ms: f64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for command in self.script.due(now_ms) {
            events.extend(self.session.apply(command));
        }
        events.extend(self.session.frame(now_ms).events);
        if now_ms - self.last_poll_ms >= self.options.device_poll_ms {
            self.last_poll_ms = now_ms;
            events.extend(self.poll_devices());
        }
        for event in &events {
            log_event(event);
        }
        events
    }

    fn poll_devices(&mut self) -> Vec<SessionEvent> {
        let Some(devices) = self.devices.as_mut() else {
            return Vec::new();
        };
        if devices.selection().current().is_some() {
            if self.session.dispatcher().sink().is_bound() {
                return match devices.check_connection() {
                    Some(status) => {
                        self.last_status = Some(status);
                        self.session.set_output(OutputSink::Null)
                    }
                    None => Vec::new(),
                };
            }
            // A failed send already dropped the session to the null sink.
            devices.mark_unbound();
        }
        match devices.rescan() {
            Ok(rescan) => {
                let mut events = Vec::new();
                if let Some(sink) = rescan.sink.filter(OutputSink::is_bound) {
                    events = self.session.set_output(sink);
                }
                if self.last_status.as_deref() != Some(rescan.status.as_str()) {
                    info!(status = %rescan.status, "MIDI");
                    self.last_status = Some(rescan.status);
                }
                events
            }
            Err(e) => {
                warn!(error = %e, "Unable to refresh MIDI devices.");
                Vec::new()
            }
        }
    }

    /// Drive the session in real time until `stop` is set or the configured
    /// duration has elapsed, then shut down.
    pub fn run(&mut self, stop: &AtomicBool) {
        let started = Instant::now();
        let frame = Duration::from_millis(self.options.frame_ms);
        info!(output = %self.session.dispatcher().sink().name(), "host loop started");
        loop {
            let now_ms = started.elapsed().as_secs_f64() * 1000.0;
            if stop.load(Ordering::SeqCst)
                || self.options.seconds.is_some_and(|s| now_ms >= s * 1000.0)
            {
                break;
            }
            self.step(now_ms);
            self.maybe_render(now_ms);
            std::thread::sleep(frame);
        }
        self.shutdown();
    }

    fn maybe_render(&mut self, now_ms: f64) {
        let Some(every) = self.options.render_every_ms else {
            return;
        };
        if self.last_render_ms.is_some_and(|last| now_ms - last < every) {
            return;
        }
        self.last_render_ms = Some(now_ms);
        println!("{}", render_ascii(&self.session.snapshot()));
    }

    /// Stop both loops, silencing anything still sounding.
    pub fn shutdown(&mut self) -> Vec<SessionEvent> {
        let mut events = self.session.apply(Command::StopMusic);
        events.extend(self.session.apply(Command::StopGrid));
        for event in &events {
            log_event(event);
        }
        info!(
            generation = self.session.grid().generation(),
            "host loop stopped"
        );
        events
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::GenerationAdvanced { generation, alive } => {
            debug!(generation, alive, "generation");
        }
        SessionEvent::NoteTriggered {
            box_id,
            pitch,
            velocity,
            channel,
            ..
        } => {
            debug!(%box_id, pitch, velocity, channel, "note");
        }
        SessionEvent::BoxHighlighted { .. }
        | SessionEvent::BoxRetired { .. }
        | SessionEvent::CellsPainted { .. }
        | SessionEvent::HighlightsCleared => {}
        SessionEvent::GridReset { size } => info!(size, "grid reset"),
        SessionEvent::GridRunning { running } => info!(running, "grid loop"),
        SessionEvent::MusicRunning { running } => info!(running, "music loop"),
        SessionEvent::KeyApplied { label } => info!(%label, "key applied"),
        SessionEvent::OutputStatus { message } => warn!(%message, "MIDI"),
    }
}
