// Cooperative timer queue.
//
// The session runs on one logical thread. All waiting is expressed as a
// deferred callback registered here: one-shot delays (note-offs), fixed
// periods (the grid tick), and next-frame requests (the music loop). The host
// drives time forward by calling `Session::frame(now_ms)`, which pops due
// timers in order and then delivers frame requests.
//
// Callbacks are `TimerKind` values, not closures; the session matches on the
// kind and calls the owning component. Handles are never reused.
//
// Timed entries sit in a min-heap ordered by `(due, sequence)`, the same
// reversed-`Ord` trick as a discrete event queue. Cancelling removes the
// handle from the live table; its heap entry is dropped lazily when it
// surfaces. A repeating timer pushes a fresh entry (new sequence) each time it
// fires, and only the entry whose sequence matches the live record counts, so
// a cancelled-then-rescheduled timer can never fire twice.
//
// Time is kept in integer microseconds so ordering is exact; the public API
// speaks milliseconds as `f64` to match BPM arithmetic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Cancelable reference to a scheduled callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// What a timer does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    /// Advance the automaton one generation.
    GridTick,
    /// Release a sounding note. `channel` is the zero-based wire channel.
    NoteOff { channel: u8, pitch: u8 },
    /// Run one music scheduler frame.
    MusicFrame,
}

#[derive(Clone, Copy, Debug)]
struct Timer {
    kind: TimerKind,
    /// Sequence of the heap entry that is allowed to fire. `None` for
    /// frame requests, which never enter the heap.
    sequence: Option<u64>,
    period_us: Option<u64>,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    due_us: u64,
    sequence: u64,
    handle: TimerHandle,
}

// Min-heap on (due, sequence).
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due_us == other.due_us && self.sequence == other.sequence
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_us
            .cmp(&self.due_us)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Clone, Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    live: BTreeMap<TimerHandle, Timer>,
    frame_requests: Vec<TimerHandle>,
    now_us: u64,
    next_sequence: u64,
    next_handle: u64,
}

fn ms_to_us(ms: f64) -> u64 {
    if ms.is_finite() && ms > 0.0 {
        (ms * 1000.0).round() as u64
    } else {
        0
    }
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current queue time in milliseconds.
    pub fn now_ms(&self) -> f64 {
        self.now_us as f64 / 1000.0
    }

    /// Fire `kind` once, `delay_ms` from now.
    pub fn schedule_after(&mut self, delay_ms: f64, kind: TimerKind) -> TimerHandle {
        let handle = self.allocate();
        let due_us = self.now_us + ms_to_us(delay_ms);
        self.insert(handle, kind, due_us, None);
        handle
    }

    /// Fire `kind` every `period_ms`, first one period from now. Periods
    /// shorter than a microsecond are rounded up to one.
    pub fn schedule_repeating(&mut self, period_ms: f64, kind: TimerKind) -> TimerHandle {
        let handle = self.allocate();
        let period_us = ms_to_us(period_ms).max(1);
        let due_us = self.now_us + period_us;
        self.insert(handle, kind, due_us, Some(period_us));
        handle
    }

    /// Deliver `kind` once at the next frame.
    pub fn on_next_frame(&mut self, kind: TimerKind) -> TimerHandle {
        let handle = self.allocate();
        self.live.insert(
            handle,
            Timer {
                kind,
                sequence: None,
                period_us: None,
            },
        );
        self.frame_requests.push(handle);
        handle
    }

    /// Cancel a pending callback. Unknown or already-fired handles are ignored.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.live.remove(&handle);
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.live.contains_key(&handle)
    }

    /// Outstanding callbacks of every flavor.
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// Pop the earliest live timer due at or before `until_ms`, advancing the
    /// clock to its due time. Repeating timers are rescheduled one period on.
    pub fn pop_due(&mut self, until_ms: f64) -> Option<(TimerHandle, TimerKind)> {
        let until_us = ms_to_us(until_ms);
        while self.heap.peek().is_some_and(|e| e.due_us <= until_us) {
            let entry = self.heap.pop()?;
            let Some(timer) = self.live.get(&entry.handle).copied() else {
                continue;
            };
            if timer.sequence != Some(entry.sequence) {
                continue;
            }
            self.now_us = self.now_us.max(entry.due_us);
            match timer.period_us {
                Some(period_us) => {
                    self.insert(entry.handle, timer.kind, entry.due_us + period_us, Some(period_us));
                }
                None => {
                    self.live.remove(&entry.handle);
                }
            }
            return Some((entry.handle, timer.kind));
        }
        None
    }

    /// Move the clock forward without firing anything. Never moves backward.
    pub fn advance_to(&mut self, now_ms: f64) {
        self.now_us = self.now_us.max(ms_to_us(now_ms));
    }

    /// Take this frame's requests, in registration order. Requests made while
    /// handling them land in the next frame.
    pub fn take_frame_requests(&mut self) -> Vec<(TimerHandle, TimerKind)> {
        let requests = std::mem::take(&mut self.frame_requests);
        requests
            .into_iter()
            .filter_map(|h| self.live.remove(&h).map(|t| (h, t.kind)))
            .collect()
    }

    fn allocate(&mut self) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn insert(&mut self, handle: TimerHandle, kind: TimerKind, due_us: u64, period_us: Option<u64>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.live.insert(
            handle,
            Timer {
                kind,
                sequence: Some(sequence),
                period_us,
            },
        );
        self.heap.push(Entry {
            due_us,
            sequence,
            handle,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TimerQueue, until_ms: f64) -> Vec<TimerKind> {
        let mut fired = Vec::new();
        while let Some((_, kind)) = queue.pop_due(until_ms) {
            fired.push(kind);
        }
        fired
    }

    const OFF_60: TimerKind = TimerKind::NoteOff {
        channel: 0,
        pitch: 60,
    };

    #[test]
    fn one_shot_fires_once_at_due_time() {
        let mut q = TimerQueue::new();
        q.schedule_after(200.0, OFF_60);
        assert!(drain(&mut q, 199.9).is_empty());
        assert_eq!(drain(&mut q, 200.0), vec![OFF_60]);
        assert_eq!(q.now_ms(), 200.0);
        assert!(drain(&mut q, 10_000.0).is_empty());
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn same_due_time_fires_in_schedule_order() {
        let mut q = TimerQueue::new();
        let a = TimerKind::NoteOff { channel: 1, pitch: 1 };
        let b = TimerKind::NoteOff { channel: 2, pitch: 2 };
        q.schedule_after(50.0, b);
        q.schedule_after(10.0, a);
        q.schedule_after(50.0, a);
        assert_eq!(drain(&mut q, 50.0), vec![a, b, a]);
    }

    #[test]
    fn repeating_timer_fires_each_period() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(800.0, TimerKind::GridTick);
        assert_eq!(drain(&mut q, 2500.0).len(), 3);
        assert_eq!(q.now_ms(), 2400.0);
        assert_eq!(q.pending(), 1);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut q = TimerQueue::new();
        let once = q.schedule_after(10.0, OFF_60);
        let tick = q.schedule_repeating(5.0, TimerKind::GridTick);
        q.cancel(once);
        assert_eq!(drain(&mut q, 7.0), vec![TimerKind::GridTick]);
        q.cancel(tick);
        assert!(drain(&mut q, 1000.0).is_empty());
        assert_eq!(q.pending(), 0);
        q.cancel(tick);
    }

    #[test]
    fn frame_requests_deliver_once_and_can_be_cancelled() {
        let mut q = TimerQueue::new();
        let first = q.on_next_frame(TimerKind::MusicFrame);
        assert!(q.is_pending(first));
        assert_eq!(q.take_frame_requests(), vec![(first, TimerKind::MusicFrame)]);
        assert!(q.take_frame_requests().is_empty());

        let second = q.on_next_frame(TimerKind::MusicFrame);
        q.cancel(second);
        assert!(q.take_frame_requests().is_empty());
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn delays_are_relative_to_queue_clock() {
        let mut q = TimerQueue::new();
        q.advance_to(1000.0);
        q.advance_to(500.0);
        assert_eq!(q.now_ms(), 1000.0);
        q.schedule_after(100.0, OFF_60);
        assert!(drain(&mut q, 1099.0).is_empty());
        assert_eq!(drain(&mut q, 1100.0).len(), 1);
    }

    #[test]
    fn handles_are_unique() {
        let mut q = TimerQueue::new();
        let a = q.schedule_after(1.0, OFF_60);
        let b = q.on_next_frame(TimerKind::MusicFrame);
        let c = q.schedule_repeating(1.0, TimerKind::GridTick);
        assert!(a != b && b != c && a != c);
    }
}
