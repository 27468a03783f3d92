// Random sources for the cellsong workspace.
//
// Every random decision in the automaton and the music scheduler goes through
// the `RandomSource` trait: the seed brush's 60% neighbor coin flips, the three
// random-fill algorithms, the per-column Poisson spawn waits, and key
// randomization. Callers take `&mut R where R: RandomSource + ?Sized`, so a
// session can hold a boxed source and tests can substitute a scripted one.
//
// Two implementations live here:
// - `CellRng`:     xoshiro256++ (Blackman & Vigna, 2019) seeded through
//                  SplitMix64. Hand-rolled so output is identical on every
//                  platform and serializable with the rest of the session.
// - `ScriptedRng`: replays a fixed list of unit-interval values, cycling.
//                  Used by tests that need to force a particular branch of a
//                  probabilistic operation.
//
// All derived samplers (`range_usize`, `chance`, `exponential`) are built on
// `next_u64`, so a source only has to produce raw 64-bit words.

use serde::{Deserialize, Serialize};

/// A stream of random 64-bit words plus the samplers built on top of it.
pub trait RandomSource {
    /// Next raw 64-bit word.
    fn next_u64(&mut self) -> u64;

    /// Uniform `f64` in [0, 1), taken from the upper 53 bits.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[low, high)`.
    ///
    /// Uses a widening multiply instead of rejection sampling, so one word is
    /// consumed per call. The bias is below 2^-40 for any grid we can build.
    /// Returns `low` when the range is empty.
    fn range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u128;
        low + ((self.next_u64() as u128 * span) >> 64) as usize
    }

    /// `true` with probability `p`. `p <= 0` never fires, `p >= 1` always does.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Exponentially distributed sample with the given mean.
    ///
    /// A zero draw is nudged to `f64::EPSILON` so the result stays finite.
    fn exponential(&mut self, mean: f64) -> f64 {
        let u = self.next_f64();
        let u = if u > 0.0 { u } else { f64::EPSILON };
        -u.ln() * mean
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn next_u64(&mut self) -> u64 {
        (**self).next_u64()
    }
}

/// Partial Fisher-Yates: after the call, `items[..count]` is a uniformly
/// random selection (in random order) of the original elements.
pub fn shuffle_prefix<R: RandomSource + ?Sized, T>(rng: &mut R, items: &mut [T], count: usize) {
    let count = count.min(items.len());
    for i in 0..count {
        let j = rng.range_usize(i, items.len());
        items.swap(i, j);
    }
}

/// Pick one element uniformly. `None` for an empty slice.
pub fn pick<'a, R: RandomSource + ?Sized, T>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(rng.range_usize(0, items.len()))
    }
}

// ---------------------------------------------------------------------------
// xoshiro256++
// ---------------------------------------------------------------------------

/// Seeded xoshiro256++ generator, the default source for a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellRng {
    s: [u64; 4],
}

impl CellRng {
    /// Expand a `u64` seed into the 256-bit state with SplitMix64.
    /// Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut s = [0u64; 4];
        for word in &mut s {
            *word = splitmix64(&mut sm);
        }
        Self { s }
    }
}

impl RandomSource for CellRng {
    fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = self.s;
        let result = s0.wrapping_add(s3).rotate_left(23).wrapping_add(s0);
        let t = s1 << 17;

        let s2 = s2 ^ s0;
        let s3 = s3 ^ s1;
        let s1 = s1 ^ s2;
        let s0 = s0 ^ s3;
        self.s = [s0, s1, s2 ^ t, s3.rotate_left(45)];

        result
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

// ---------------------------------------------------------------------------
// Scripted source
// ---------------------------------------------------------------------------

/// Replays a fixed cycle of unit-interval values.
///
/// `next_f64` returns the scripted values exactly (to 53 bits), and
/// `range_usize(low, high)` returns `low + floor(value * (high - low))`, which
/// makes brush and fill outcomes easy to force from a test.
#[derive(Clone, Debug)]
pub struct ScriptedRng {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    /// Values are clamped into [0, 1). An empty script behaves like `[0.0]`.
    pub fn new(values: &[f64]) -> Self {
        let values = if values.is_empty() {
            vec![0.0]
        } else {
            values.iter().map(|v| v.clamp(0.0, 1.0 - f64::EPSILON)).collect()
        };
        Self { values, cursor: 0 }
    }

    /// A source that always yields `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(&[value])
    }

    /// Number of words drawn so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRng {
    fn next_u64(&mut self) -> u64 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        ((value * (1u64 << 53) as f64) as u64) << 11
    }
}
