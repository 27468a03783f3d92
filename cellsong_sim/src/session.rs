// Top-level session controller.
//
// `Session` is the single owner of everything that makes up a running piece:
// the configuration, the automaton grid, the note registry, the music box
// scheduler, the note dispatcher with its output sink, the timer queue, and
// the random source. There is no ambient state; two sessions never interact.
//
// ## Driving a session
//
// A host does two things:
//
// - `apply(command)` for every user action. Returns the events it caused.
// - `frame(now_ms)` once per display refresh with a monotonic clock reading.
//   Returns a `FrameResult` with the events produced during the frame.
//
// Inside `frame`, timed callbacks run first, in due order, with the queue
// clock stepped to each due time: grid ticks (`TimerKind::GridTick`, a
// repeating timer at `60000 / sim_bpm` ms) and note releases
// (`TimerKind::NoteOff`). Then frame requests are delivered: the music loop
// keeps exactly one `TimerKind::MusicFrame` request outstanding while it
// runs, measures the real time since the previous music frame, and passes
// that delta to `MusicBoxScheduler::update`.
//
// Because the grid only changes inside `Grid::tick` (which swaps buffers
// before returning) or inside `apply`, the scheduler always samples a whole
// generation.
//
// ## Restarts
//
// Stopping a loop cancels its timer or frame request outright, so nothing
// scheduled by an earlier run can fire into a later one:
//
// - `SetSimBpm` while the grid runs cancels the repeating tick and schedules
//   a new one at the new period.
// - `SetMusicBpm`, `SetSpawnMode` and `SetColumnCount` while music runs do a
//   full stop/start: boxes dropped, all notes silenced, highlights cleared,
//   fresh spawn timers.
// - `SetSpawnRate` while music runs only redraws the column spawn waits.
// - `SetColumnCount` also rebuilds the grid at `BOX_WIDTH * columns` cells
//   on a side (all dead, generation 0).
// - `ClearGrid` stops the grid loop as well as clearing it.
//
// See also: `command.rs`, `event.rs`, `timer.rs`, `scheduler.rs`.

use crate::command::Command;
use crate::config::{self, SessionConfig};
use crate::dispatch::NoteDispatcher;
use crate::event::SessionEvent;
use crate::grid::Grid;
use crate::notes::NoteRegistry;
use crate::output::OutputSink;
use crate::scale;
use crate::scheduler::{FrameContext, MusicBoxScheduler};
use crate::timer::{TimerHandle, TimerKind, TimerQueue};
use crate::types::{BoxId, CellState, ColorTag, grid_size_for_columns};
use cellsong_prng::{CellRng, RandomSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Seed used when the configuration leaves it open.
pub const DEFAULT_SEED: u64 = 0x5eed_ce11;

/// Events produced by one `frame()` call.
pub struct FrameResult {
    pub events: Vec<SessionEvent>,
}

/// A box footprint for rendering: `BOX_WIDTH x BOX_HEIGHT` cells starting at
/// (`row`, `column * BOX_WIDTH`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxFootprint {
    pub id: BoxId,
    pub column: usize,
    pub row: usize,
    pub column_color: ColorTag,
    /// Color of the note the box triggered at this row, or `None` for a
    /// neutral highlight.
    pub color: Option<ColorTag>,
}

/// Everything a rendering sink draws.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub size: usize,
    pub generation: u64,
    /// Row-major cell states.
    pub cells: Vec<CellState>,
    pub boxes: Vec<BoxFootprint>,
}

pub struct Session {
    config: SessionConfig,
    grid: Grid,
    notes: NoteRegistry,
    scheduler: MusicBoxScheduler,
    dispatcher: NoteDispatcher,
    timers: TimerQueue,
    rng: Box<dyn RandomSource>,
    grid_timer: Option<TimerHandle>,
    music_frame: Option<TimerHandle>,
    last_frame_ms: Option<f64>,
    events: Vec<SessionEvent>,
}

impl Session {
    /// A stopped session seeded from `config.seed` (or `DEFAULT_SEED`).
    pub fn new(config: SessionConfig, output: OutputSink) -> Self {
        let seed = config.seed.unwrap_or(DEFAULT_SEED);
        Self::with_rng(config, output, Box::new(CellRng::new(seed)))
    }

    /// A stopped session drawing from the given random source.
    pub fn with_rng(config: SessionConfig, output: OutputSink, rng: Box<dyn RandomSource>) -> Self {
        let config = config.sanitized();
        let grid = Grid::new(grid_size_for_columns(config.active_column_count), config.rule);
        let scheduler = MusicBoxScheduler::new(config.scheduler_params());
        info!(
            grid_size = grid.size(),
            rule = config.rule.name(),
            output = output.name(),
            "session created"
        );
        Self {
            config,
            grid,
            notes: NoteRegistry::default_bank(),
            scheduler,
            dispatcher: NoteDispatcher::new(output),
            timers: TimerQueue::new(),
            rng,
            grid_timer: None,
            music_frame: None,
            last_frame_ms: None,
            events: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn notes(&self) -> &NoteRegistry {
        &self.notes
    }

    pub fn scheduler(&self) -> &MusicBoxScheduler {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &NoteDispatcher {
        &self.dispatcher
    }

    pub fn is_grid_running(&self) -> bool {
        self.grid_timer.is_some()
    }

    pub fn is_music_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Session clock: the latest time passed to `frame`.
    pub fn now_ms(&self) -> f64 {
        self.timers.now_ms()
    }

    /// Outstanding timers and frame requests. Zero once both loops are
    /// stopped and every note has been released or silenced.
    pub fn pending_callbacks(&self) -> usize {
        self.timers.pending()
    }

    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            size: self.grid.size(),
            generation: self.grid.generation(),
            cells: self.grid.cells().to_vec(),
            boxes: self
                .scheduler
                .boxes()
                .iter()
                .map(|b| BoxFootprint {
                    id: b.id,
                    column: b.column,
                    row: b.row,
                    column_color: b.column_color,
                    color: b.lit,
                })
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Driving
    // -----------------------------------------------------------------------

    /// Run everything due at `now_ms`.
    pub fn frame(&mut self, now_ms: f64) -> FrameResult {
        while let Some((handle, kind)) = self.timers.pop_due(now_ms) {
            match kind {
                TimerKind::GridTick => self.tick_grid(),
                TimerKind::NoteOff { channel, pitch } => {
                    self.dispatcher.release(handle, channel, pitch);
                }
                TimerKind::MusicFrame => {}
            }
        }
        self.timers.advance_to(now_ms);

        for (handle, kind) in self.timers.take_frame_requests() {
            if kind == TimerKind::MusicFrame && self.music_frame == Some(handle) {
                self.music_frame = None;
                self.run_music_frame(now_ms);
            }
        }

        FrameResult {
            events: self.drain_events(),
        }
    }

    /// Apply one user action and return the events it caused.
    pub fn apply(&mut self, command: Command) -> Vec<SessionEvent> {
        debug!(?command, "apply");
        match command {
            Command::StartGrid => self.start_grid(),
            Command::StopGrid => self.stop_grid(),
            Command::ClearGrid => {
                self.stop_grid();
                self.grid.clear();
                self.push_grid_reset();
            }
            Command::Seed { at, brush } => {
                if self.grid.in_bounds(at.row, at.col) {
                    self.grid.seed(at, brush, self.rng.as_mut());
                    self.events.push(SessionEvent::CellsPainted { center: at });
                }
            }
            Command::RandomFill => {
                let lit = self.grid.random_fill(
                    self.config.fill_density(),
                    self.config.random_fill_algorithm,
                    self.rng.as_mut(),
                );
                debug!(lit, algorithm = self.config.random_fill_algorithm.name(), "random fill");
                self.push_grid_reset();
            }
            Command::SetRule { rule } => {
                self.config.rule = rule;
                self.grid.set_rule(rule);
            }
            Command::SetSimBpm { bpm } => {
                self.config.sim_bpm = config::clamp_sim_bpm(bpm);
                if self.is_grid_running() {
                    self.stop_grid();
                    self.start_grid();
                }
            }
            Command::StartMusic => self.start_music(),
            Command::StopMusic => self.stop_music(),
            Command::SetMusicBpm { bpm } => {
                self.config.music_bpm = config::clamp_music_bpm(bpm);
                self.sync_scheduler_and_restart();
            }
            Command::SetSpawnRate { factor } => {
                self.config.spawn_rate_factor = config::clamp_spawn_rate(factor);
                self.scheduler.set_params(self.config.scheduler_params());
                if self.scheduler.is_running() {
                    self.scheduler.reset_spawn_timers(self.rng.as_mut());
                }
            }
            Command::SetSpawnMode { mode } => {
                self.config.spawn_mode = mode;
                self.sync_scheduler_and_restart();
            }
            Command::SetColumnCount { columns } => {
                self.config.active_column_count = config::clamp_columns(columns);
                let size = grid_size_for_columns(self.config.active_column_count);
                if size != self.grid.size() {
                    self.grid.resize(size);
                    self.push_grid_reset();
                }
                self.sync_scheduler_and_restart();
            }
            Command::SetFillPercent { percent } => {
                self.config.random_fill_percent = config::clamp_fill_percent(percent);
            }
            Command::SetFillAlgorithm { algorithm } => {
                self.config.random_fill_algorithm = algorithm;
            }
            Command::SetKeyTonic { tonic } => self.config.key_tonic = tonic,
            Command::SetKeyScale { scale } => self.config.key_scale = scale,
            Command::ApplyKey => self.apply_key(),
            Command::RandomizeKey => {
                let key = scale::random_key(self.rng.as_mut());
                self.config.key_tonic = key.tonic;
                self.config.key_scale = key.scale;
                self.apply_key();
            }
            Command::SetNoteThreshold { index, threshold } => {
                self.notes.set_threshold(index, threshold);
            }
            Command::SetNoteActive { index, active } => self.notes.set_active(index, active),
            Command::SetNoteDuration { index, beats } => self.notes.set_duration(index, beats),
            Command::SetNotePitch { index, pitch } => self.notes.set_pitch(index, pitch),
            Command::SetNoteChannel { index, channel } => self.notes.set_channel(index, channel),
        }
        self.drain_events()
    }

    /// Swap the output sink. The old sink is silenced first.
    pub fn set_output(&mut self, output: OutputSink) -> Vec<SessionEvent> {
        self.dispatcher.set_output(&mut self.timers, output);
        self.drain_events()
    }

    // -----------------------------------------------------------------------
    // Grid loop
    // -----------------------------------------------------------------------

    fn start_grid(&mut self) {
        if self.grid_timer.is_some() {
            return;
        }
        let period_ms = self.config.sim_interval_ms();
        self.grid_timer = Some(self.timers.schedule_repeating(period_ms, TimerKind::GridTick));
        info!(period_ms, "grid started");
        self.events.push(SessionEvent::GridRunning { running: true });
    }

    fn stop_grid(&mut self) {
        let Some(handle) = self.grid_timer.take() else {
            return;
        };
        self.timers.cancel(handle);
        info!(generation = self.grid.generation(), "grid stopped");
        self.events.push(SessionEvent::GridRunning { running: false });
    }

    fn tick_grid(&mut self) {
        self.grid.tick();
        self.events.push(SessionEvent::GenerationAdvanced {
            generation: self.grid.generation(),
            alive: self.grid.alive_count(),
        });
    }

    fn push_grid_reset(&mut self) {
        self.events.push(SessionEvent::GridReset {
            size: self.grid.size(),
        });
    }

    // -----------------------------------------------------------------------
    // Music loop
    // -----------------------------------------------------------------------

    /// The scheduler plus a context over every other component.
    fn split(&mut self) -> (&mut MusicBoxScheduler, FrameContext<'_>) {
        (
            &mut self.scheduler,
            FrameContext {
                grid: &self.grid,
                notes: &self.notes,
                rng: self.rng.as_mut(),
                dispatcher: &mut self.dispatcher,
                timers: &mut self.timers,
                events: &mut self.events,
            },
        )
    }

    fn start_music(&mut self) {
        if self.scheduler.is_running() {
            return;
        }
        let (scheduler, mut ctx) = self.split();
        scheduler.start(&mut ctx);
        self.last_frame_ms = Some(self.timers.now_ms());
        self.music_frame = Some(self.timers.on_next_frame(TimerKind::MusicFrame));
        self.events.push(SessionEvent::MusicRunning { running: true });
    }

    fn stop_music(&mut self) {
        if !self.scheduler.is_running() {
            return;
        }
        if let Some(handle) = self.music_frame.take() {
            self.timers.cancel(handle);
        }
        self.last_frame_ms = None;
        self.scheduler
            .stop(&mut self.dispatcher, &mut self.timers, &mut self.events);
        self.events.push(SessionEvent::MusicRunning { running: false });
    }

    fn sync_scheduler_and_restart(&mut self) {
        self.scheduler.set_params(self.config.scheduler_params());
        if self.scheduler.is_running() {
            self.stop_music();
            self.start_music();
        }
    }

    fn run_music_frame(&mut self, now_ms: f64) {
        let delta_ms = now_ms - self.last_frame_ms.unwrap_or(now_ms);
        self.last_frame_ms = Some(now_ms);
        let (scheduler, mut ctx) = self.split();
        scheduler.update(delta_ms, &mut ctx);
        if self.scheduler.is_running() {
            self.music_frame = Some(self.timers.on_next_frame(TimerKind::MusicFrame));
        }
    }

    // -----------------------------------------------------------------------
    // Key
    // -----------------------------------------------------------------------

    fn apply_key(&mut self) {
        let key = self.config.key();
        scale::apply_key(&mut self.notes, key);
        let label = key.label();
        info!(key = %label, "key applied");
        self.events.push(SessionEvent::KeyApplied { label });
    }

    fn drain_events(&mut self) -> Vec<SessionEvent> {
        if let Some(message) = self.dispatcher.take_status() {
            self.events.push(SessionEvent::OutputStatus { message });
        }
        std::mem::take(&mut self.events)
    }
}
