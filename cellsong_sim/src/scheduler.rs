// Music box scheduler.
//
// Boxes are `BOX_WIDTH x BOX_HEIGHT` windows that fall down the grid one
// column at a time. Whenever a box lands on a new row block it counts the
// alive cells under it, resolves that count to a note through the registry's
// trigger ordering, and hands the note to the dispatcher.
//
// The scheduler is frame driven: the session calls `update(delta_ms, ..)`
// once per display frame with the real elapsed time, so spawn and fall timing
// hold up under dropped frames. Two cadences run inside each update:
//
// - Spawn. In cascade mode each column is an independent renewal process:
//   it counts down an exponentially distributed wait (mean `1 / spawn_rate`
//   beats) and spawns a box when the wait runs out, then draws a new wait.
//   In scanning mode a wave with one box per column spawns whenever no box
//   is left. Either way a column never holds more than `MAX_BOXES_PER_COLUMN`
//   boxes.
// - Fall. Each box accumulates elapsed time; once a full beat has passed it
//   resets, moves down one box height, and evaluates again. A box whose row
//   reaches the grid height retires without evaluating.
//
// A box evaluates once when it spawns (row 0) and once per fall step.
//
// See also: `notes.rs` for `TriggerOrder`, `dispatch.rs` for note output,
// `session.rs` which owns the frame request that drives `update`.

use crate::config;
use crate::dispatch::NoteDispatcher;
use crate::event::SessionEvent;
use crate::grid::Grid;
use crate::notes::{NoteRegistry, TriggerOrder};
use crate::timer::TimerQueue;
use crate::types::{BOX_HEIGHT, BOX_WIDTH, BoxId, ColorTag, MAX_BOXES_PER_COLUMN, beats_to_ms};
use cellsong_prng::RandomSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Base velocity of a triggered note; each alive cell adds `VELOCITY_PER_CELL`.
const BASE_VELOCITY: u32 = 70;
const VELOCITY_PER_CELL: u32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnMode {
    #[default]
    Cascade,
    Scanning,
}

/// Tempo and layout the scheduler runs with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub bpm: f64,
    pub mode: SpawnMode,
    pub spawn_rate: f64,
    pub columns: usize,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            bpm: 75.0,
            mode: SpawnMode::Cascade,
            spawn_rate: 1.0,
            columns: 8,
        }
    }
}

impl SchedulerParams {
    pub fn fall_step_ms(&self) -> f64 {
        beats_to_ms(self.bpm, 1.0)
    }

    /// Mean cascade spawn wait, in beats.
    pub fn mean_spawn_beats(&self) -> f64 {
        1.0 / self.spawn_rate
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MusicBox {
    pub id: BoxId,
    pub column: usize,
    /// Top row of the footprint.
    pub row: usize,
    pub previous_row: Option<usize>,
    pub elapsed_ms: f64,
    pub column_color: ColorTag,
    /// Color of the note the box last triggered, if any.
    pub lit: Option<ColorTag>,
}

/// Everything a scheduler update reads or writes outside its own state.
pub struct FrameContext<'a> {
    pub grid: &'a Grid,
    pub notes: &'a NoteRegistry,
    pub rng: &'a mut dyn RandomSource,
    pub dispatcher: &'a mut NoteDispatcher,
    pub timers: &'a mut TimerQueue,
    pub events: &'a mut Vec<SessionEvent>,
}

#[derive(Debug, Default)]
pub struct MusicBoxScheduler {
    params: SchedulerParams,
    running: bool,
    boxes: Vec<MusicBox>,
    /// Milliseconds left until each column's next cascade spawn.
    column_next_spawn_ms: Vec<f64>,
    next_box_id: u64,
    trigger_order: TriggerOrder,
}

impl MusicBoxScheduler {
    pub fn new(params: SchedulerParams) -> Self {
        Self {
            params: sanitize(params),
            ..Self::default()
        }
    }

    pub fn params(&self) -> SchedulerParams {
        self.params
    }

    /// Takes effect on the next start. Callers restart a running scheduler.
    pub fn set_params(&mut self, params: SchedulerParams) {
        self.params = sanitize(params);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn boxes(&self) -> &[MusicBox] {
        &self.boxes
    }

    pub fn boxes_in_column(&self, column: usize) -> usize {
        self.boxes.iter().filter(|b| b.column == column).count()
    }

    pub fn column_next_spawn_ms(&self) -> &[f64] {
        &self.column_next_spawn_ms
    }

    /// Enter the running state with no boxes and fresh spawn timers. A
    /// scanning scheduler spawns its first wave immediately.
    pub fn start(&mut self, ctx: &mut FrameContext<'_>) {
        if self.running {
            return;
        }
        self.running = true;
        self.boxes.clear();
        self.reset_spawn_timers(ctx.rng);
        info!(
            bpm = self.params.bpm,
            mode = ?self.params.mode,
            columns = self.params.columns,
            "music started"
        );
        if self.params.mode == SpawnMode::Scanning {
            self.spawn_wave(ctx);
        }
    }

    /// Drop every box, silence all output, clear highlights. Idempotent.
    pub fn stop(
        &mut self,
        dispatcher: &mut NoteDispatcher,
        timers: &mut TimerQueue,
        events: &mut Vec<SessionEvent>,
    ) {
        if !self.running {
            return;
        }
        self.running = false;
        self.boxes.clear();
        self.column_next_spawn_ms.clear();
        dispatcher.stop_all(timers);
        events.push(SessionEvent::HighlightsCleared);
        info!("music stopped");
    }

    /// Redraw every column's wait. Scanning columns have no wait.
    pub fn reset_spawn_timers(&mut self, rng: &mut dyn RandomSource) {
        let params = self.params;
        self.column_next_spawn_ms = (0..params.columns)
            .map(|_| match params.mode {
                SpawnMode::Cascade => poisson_wait_ms(&params, rng),
                SpawnMode::Scanning => 0.0,
            })
            .collect();
    }

    /// Advance spawn and fall cadences by `delta_ms` of real time.
    pub fn update(&mut self, delta_ms: f64, ctx: &mut FrameContext<'_>) {
        if !self.running {
            return;
        }
        let delta_ms = if delta_ms.is_finite() { delta_ms.max(0.0) } else { 0.0 };

        match self.params.mode {
            SpawnMode::Scanning => {
                if self.boxes.is_empty() {
                    self.spawn_wave(ctx);
                }
            }
            SpawnMode::Cascade => {
                for column in 0..self.params.columns {
                    let Some(wait) = self.column_next_spawn_ms.get_mut(column) else {
                        continue;
                    };
                    *wait -= delta_ms;
                    if *wait <= 0.0 {
                        *wait = poisson_wait_ms(&self.params, ctx.rng);
                        self.spawn_box(column, ctx);
                    }
                }
            }
        }

        let fall_step_ms = self.params.fall_step_ms();
        let grid_size = ctx.grid.size();
        let mut retired = Vec::new();
        for music_box in &mut self.boxes {
            music_box.elapsed_ms += delta_ms;
            if music_box.elapsed_ms < fall_step_ms {
                continue;
            }
            music_box.elapsed_ms = 0.0;
            music_box.previous_row = Some(music_box.row);
            music_box.row += BOX_HEIGHT;
            if music_box.row >= grid_size {
                retired.push(music_box.id);
                continue;
            }
            evaluate(music_box, &mut self.trigger_order, &self.params, ctx);
        }

        if !retired.is_empty() {
            self.boxes.retain(|b| {
                if !retired.contains(&b.id) {
                    return true;
                }
                debug!(box_id = %b.id, column = b.column, "box retired");
                ctx.events.push(SessionEvent::BoxRetired {
                    box_id: b.id,
                    column: b.column,
                    last_row: b.previous_row.unwrap_or(0),
                });
                false
            });
        }
    }

    fn spawn_wave(&mut self, ctx: &mut FrameContext<'_>) {
        for column in 0..self.params.columns {
            self.spawn_box(column, ctx);
        }
    }

    /// Spawn at the top of `column` unless the column is full.
    fn spawn_box(&mut self, column: usize, ctx: &mut FrameContext<'_>) {
        if self.boxes_in_column(column) >= MAX_BOXES_PER_COLUMN {
            return;
        }
        self.next_box_id += 1;
        let mut music_box = MusicBox {
            id: BoxId(self.next_box_id),
            column,
            row: 0,
            previous_row: None,
            elapsed_ms: 0.0,
            column_color: ColorTag::for_column(column),
            lit: None,
        };
        debug!(box_id = %music_box.id, column, "box spawned");
        evaluate(&mut music_box, &mut self.trigger_order, &self.params, ctx);
        self.boxes.push(music_box);
    }
}

fn sanitize(params: SchedulerParams) -> SchedulerParams {
    SchedulerParams {
        bpm: config::clamp_music_bpm(params.bpm),
        spawn_rate: config::clamp_spawn_rate(params.spawn_rate),
        columns: config::clamp_columns(params.columns),
        ..params
    }
}

fn poisson_wait_ms(params: &SchedulerParams, rng: &mut dyn RandomSource) -> f64 {
    beats_to_ms(params.bpm, rng.exponential(params.mean_spawn_beats()))
}

/// Count alive cells under the box, trigger the resolved note, and report the
/// highlight.
fn evaluate(
    music_box: &mut MusicBox,
    trigger_order: &mut TriggerOrder,
    params: &SchedulerParams,
    ctx: &mut FrameContext<'_>,
) {
    let alive = ctx.grid.alive_in_block(
        music_box.row,
        music_box.column * BOX_WIDTH,
        BOX_HEIGHT,
        BOX_WIDTH,
    );
    let selected = trigger_order
        .resolve(ctx.notes, alive)
        .and_then(|i| ctx.notes.get(i).map(|n| (i, n)));

    music_box.lit = None;
    if let Some((note_index, note)) = selected {
        let velocity = (BASE_VELOCITY + VELOCITY_PER_CELL * alive).min(127) as u8;
        let duration_ms = beats_to_ms(params.bpm, note.duration_beats);
        let channel = note.wire_channel();
        ctx.dispatcher
            .play(ctx.timers, note.pitch, velocity, duration_ms, channel);
        ctx.events.push(SessionEvent::NoteTriggered {
            box_id: music_box.id,
            note_index,
            pitch: note.pitch,
            velocity,
            channel,
            duration_ms,
        });
        music_box.lit = Some(note.color);
    }

    ctx.events.push(SessionEvent::BoxHighlighted {
        box_id: music_box.id,
        column: music_box.column,
        row: music_box.row,
        previous_row: music_box.previous_row,
        alive,
        color: music_box.lit,
    });
}
