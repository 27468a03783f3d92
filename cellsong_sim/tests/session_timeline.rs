// End-to-end session timelines with a fake clock.
//
// Each test drives a `Session` through `apply()` and `frame(now_ms)` with
// explicit timestamps and a `MessageRecorder` as the MIDI output, then checks
// the exact bytes that reached the output. No real time passes.

use cellsong_sim::command::Command;
use cellsong_sim::config::SessionConfig;
use cellsong_sim::event::SessionEvent;
use cellsong_sim::output::{MessageRecorder, OutputSink};
use cellsong_sim::scheduler::SpawnMode;
use cellsong_sim::session::Session;
use cellsong_sim::types::{Brush, CellCoord};

const FRAME_MS: f64 = 1000.0 / 60.0;

fn scanning_session() -> (Session, MessageRecorder) {
    let recorder = MessageRecorder::new();
    let config = SessionConfig {
        music_bpm: 60.0,
        spawn_mode: SpawnMode::Scanning,
        active_column_count: 4,
        seed: Some(7),
        ..SessionConfig::default()
    };
    (Session::new(config, OutputSink::device(recorder.clone())), recorder)
}

/// Run frames at 60 fps from `from_ms` up to and including `to_ms`.
fn run(session: &mut Session, from_ms: f64, to_ms: f64) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    let mut t = from_ms;
    while t <= to_ms {
        events.extend(session.frame(t).events);
        t += FRAME_MS;
    }
    events
}

fn paint_column_block(session: &mut Session, column: usize, row: usize) {
    // Every dab sets its center, so one dab per cell fills the block. Spill
    // into neighboring columns is at most one cell wide.
    for r in row..row + 6 {
        for c in column * 6..column * 6 + 6 {
            session.apply(Command::Seed {
                at: CellCoord::new(r, c),
                brush: Brush::Draw,
            });
        }
    }
}

#[test]
fn full_block_plays_loudest_note_and_releases_it() {
    let (mut session, recorder) = scanning_session();
    paint_column_block(&mut session, 2, 0);
    session.apply(Command::StartMusic);

    // Column 2's box sees 36 alive cells at row 0: threshold-8 note "A"
    // (pitch 45, channel 1) at full velocity.
    let sent = recorder.messages();
    assert!(sent.contains(&vec![0x90, 45, 127]));

    // One beat later the note-off fires.
    run(&mut session, FRAME_MS, 1100.0);
    let sent = recorder.messages();
    let on = sent.iter().position(|m| m == &vec![0x90, 45, 127]);
    let off = sent.iter().position(|m| m == &vec![0x80, 45, 0]);
    assert!(on.is_some() && off.is_some() && on < off);
}

#[test]
fn scanning_waves_never_overlap() {
    let (mut session, _) = scanning_session();
    session.apply(Command::RandomFill);
    session.apply(Command::StartMusic);
    let mut t = 0.0;
    while t < 20_000.0 {
        for event in session.frame(t).events {
            if let SessionEvent::BoxHighlighted { previous_row: None, .. } = event {
                // A freshly spawned box: the previous wave must be gone,
                // so at most one box per column exists right now.
                for column in 0..4 {
                    assert!(session.scheduler().boxes_in_column(column) <= 1);
                }
            }
        }
        t += FRAME_MS;
    }
}

#[test]
fn stop_music_silences_everything_it_started() {
    let (mut session, recorder) = scanning_session();
    session.apply(Command::SetFillPercent { percent: 80.0 });
    session.apply(Command::RandomFill);
    session.apply(Command::StartMusic);
    run(&mut session, FRAME_MS, 2500.0);
    recorder.clear();

    let sounding = session.dispatcher().active_count();
    session.apply(Command::StopMusic);
    let sent = recorder.messages();
    assert_eq!(sent.len(), sounding + 16);
    assert!(sent[..sounding].iter().all(|m| m[0] & 0xf0 == 0x80));
    assert!(sent[sounding..].iter().all(|m| m[0] & 0xf0 == 0xB0 && m[1] == 123));
    assert_eq!(session.pending_callbacks(), 0);

    // Nothing more is sent after the stop.
    recorder.clear();
    run(&mut session, 2600.0, 6000.0);
    assert!(recorder.messages().is_empty());
}

#[test]
fn grid_and_music_run_independently() {
    let (mut session, _) = scanning_session();
    session.apply(Command::SetSimBpm { bpm: 240.0 });
    session.apply(Command::RandomFill);
    session.apply(Command::StartMusic);
    session.apply(Command::StartGrid);
    let events = run(&mut session, 0.0, 1010.0);
    let generations = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::GenerationAdvanced { .. }))
        .count();
    assert_eq!(generations, 4);

    session.apply(Command::StopMusic);
    let events = run(&mut session, 1020.0, 2010.0);
    assert!(
        events
            .iter()
            .all(|e| matches!(e, SessionEvent::GenerationAdvanced { .. }))
    );
    assert_eq!(session.grid().generation(), 8);
}

#[test]
fn swapping_output_mid_run_moves_notes_to_new_sink() {
    let (mut session, old) = scanning_session();
    session.apply(Command::SetFillPercent { percent: 90.0 });
    session.apply(Command::RandomFill);
    session.apply(Command::StartMusic);
    let new = MessageRecorder::new();
    session.set_output(OutputSink::device(new.clone()));

    // The old sink got its all-notes-off sweep.
    let swept = old
        .messages()
        .iter()
        .filter(|m| m[0] & 0xf0 == 0xB0)
        .count();
    assert_eq!(swept, 16);

    run(&mut session, FRAME_MS, 1100.0);
    assert!(new.messages().iter().any(|m| m[0] & 0xf0 == 0x90));
}
