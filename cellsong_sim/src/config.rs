// Session configuration.
//
// `SessionConfig` holds every runtime option a host can set, loaded from JSON
// with a serde default for each field so partial files work. Nothing here is
// ever rejected: out-of-range numbers are clamped, and zero or non-finite
// numbers fall back to a per-option default before clamping.
//
// | option                | default             | range              | bad input -> |
// |-----------------------|---------------------|--------------------|--------------|
// | sim_bpm               | 75                  | > 0, no upper cap  | 60           |
// | music_bpm             | 75                  | 30..=300           | 75           |
// | spawn_rate_factor     | 1                   | 0.25..=4           | 1            |
// | active_column_count   | 8                   | 4..=16             | current      |
// | random_fill_percent   | 35                  | 5..=90             | 35           |
//
// The sim tempo itself is stored as given, but the grid never ticks more than
// once per 60 Hz frame: `sim_interval_ms()` floors the period at
// `MIN_SIM_INTERVAL_MS`.
//
// See also: `session.rs`, which stores a sanitized copy and routes each
// setter command through the clamp helpers below.

use crate::fill::FillAlgorithm;
use crate::rule::Rule;
use crate::scale::{KeySignature, Scale, Tonic};
use crate::scheduler::{SchedulerParams, SpawnMode};
use crate::types::{MAX_COLUMNS, MIN_COLUMNS};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIM_BPM: f64 = 75.0;
pub const FALLBACK_SIM_BPM: f64 = 60.0;
/// Shortest grid tick period: one generation per display frame.
pub const MIN_SIM_INTERVAL_MS: f64 = 1000.0 / 60.0;
pub const DEFAULT_MUSIC_BPM: f64 = 75.0;
pub const MIN_MUSIC_BPM: f64 = 30.0;
pub const MAX_MUSIC_BPM: f64 = 300.0;
pub const DEFAULT_SPAWN_RATE: f64 = 1.0;
pub const MIN_SPAWN_RATE: f64 = 0.25;
pub const MAX_SPAWN_RATE: f64 = 4.0;
pub const DEFAULT_COLUMNS: usize = 8;
pub const DEFAULT_FILL_PERCENT: f64 = 35.0;
pub const MIN_FILL_PERCENT: f64 = 5.0;
pub const MAX_FILL_PERCENT: f64 = 90.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Automaton generations per minute.
    pub sim_bpm: f64,
    /// Music tempo; one fall step per beat.
    pub music_bpm: f64,
    pub rule: Rule,
    pub spawn_mode: SpawnMode,
    /// Mean cascade spawns per column per beat.
    pub spawn_rate_factor: f64,
    pub active_column_count: usize,
    /// Share of cells a random fill lights, in percent.
    pub random_fill_percent: f64,
    pub random_fill_algorithm: FillAlgorithm,
    pub key_tonic: Tonic,
    pub key_scale: Scale,
    /// Seed for the session's random source. `None` lets the host choose.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sim_bpm: DEFAULT_SIM_BPM,
            music_bpm: DEFAULT_MUSIC_BPM,
            rule: Rule::Conway,
            spawn_mode: SpawnMode::Cascade,
            spawn_rate_factor: DEFAULT_SPAWN_RATE,
            active_column_count: DEFAULT_COLUMNS,
            random_fill_percent: DEFAULT_FILL_PERCENT,
            random_fill_algorithm: FillAlgorithm::Uniform,
            key_tonic: Tonic::A,
            key_scale: Scale::PhrygianDominant,
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<SessionConfig>(json).map(SessionConfig::sanitized)
    }

    /// Apply every clamp and fallback.
    pub fn sanitized(self) -> Self {
        Self {
            sim_bpm: clamp_sim_bpm(self.sim_bpm),
            music_bpm: clamp_music_bpm(self.music_bpm),
            spawn_rate_factor: clamp_spawn_rate(self.spawn_rate_factor),
            active_column_count: clamp_columns(self.active_column_count),
            random_fill_percent: clamp_fill_percent(self.random_fill_percent),
            ..self
        }
    }

    pub fn key(&self) -> KeySignature {
        KeySignature::new(self.key_tonic, self.key_scale)
    }

    /// Fill density as a fraction of the grid.
    pub fn fill_density(&self) -> f64 {
        self.random_fill_percent / 100.0
    }

    pub fn scheduler_params(&self) -> SchedulerParams {
        SchedulerParams {
            bpm: self.music_bpm,
            mode: self.spawn_mode,
            spawn_rate: self.spawn_rate_factor,
            columns: self.active_column_count,
        }
    }

    /// Grid tick period in milliseconds.
    pub fn sim_interval_ms(&self) -> f64 {
        (60_000.0 / self.sim_bpm).max(MIN_SIM_INTERVAL_MS)
    }
}

/// `value`, or `fallback` when it is zero or not a number.
fn or_fallback(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value != 0.0 {
        value
    } else {
        fallback
    }
}

/// Negative tempos also fall back; the grid timer needs a positive period.
pub fn clamp_sim_bpm(bpm: f64) -> f64 {
    let bpm = or_fallback(bpm, FALLBACK_SIM_BPM);
    if bpm > 0.0 { bpm } else { FALLBACK_SIM_BPM }
}

pub fn clamp_music_bpm(bpm: f64) -> f64 {
    or_fallback(bpm, DEFAULT_MUSIC_BPM).clamp(MIN_MUSIC_BPM, MAX_MUSIC_BPM)
}

pub fn clamp_spawn_rate(rate: f64) -> f64 {
    or_fallback(rate, DEFAULT_SPAWN_RATE).clamp(MIN_SPAWN_RATE, MAX_SPAWN_RATE)
}

pub fn clamp_columns(columns: usize) -> usize {
    columns.clamp(MIN_COLUMNS, MAX_COLUMNS)
}

pub fn clamp_fill_percent(percent: f64) -> f64 {
    or_fallback(percent, DEFAULT_FILL_PERCENT).clamp(MIN_FILL_PERCENT, MAX_FILL_PERCENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.key().label(), "A Phrygian Dominant");
        assert_eq!(config.sim_interval_ms(), 800.0);
    }

    #[test]
    fn partial_json_overrides_and_clamps() {
        let json = r#"{
            "music_bpm": 1000,
            "rule": "briansbrain",
            "spawn_mode": "scanning",
            "spawn_rate_factor": 0.1,
            "active_column_count": 2,
            "random_fill_percent": 95,
            "random_fill_algorithm": "noise",
            "key_tonic": "C#",
            "key_scale": "whole_tone",
            "seed": 7
        }"#;
        let config = SessionConfig::from_json(json).unwrap();
        assert_eq!(config.music_bpm, MAX_MUSIC_BPM);
        assert_eq!(config.rule, Rule::BriansBrain);
        assert_eq!(config.spawn_mode, SpawnMode::Scanning);
        assert_eq!(config.spawn_rate_factor, MIN_SPAWN_RATE);
        assert_eq!(config.active_column_count, MIN_COLUMNS);
        assert_eq!(config.random_fill_percent, MAX_FILL_PERCENT);
        assert_eq!(config.random_fill_algorithm, FillAlgorithm::Noise);
        assert_eq!(config.key().label(), "C# Whole Tone");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.sim_bpm, DEFAULT_SIM_BPM);
    }

    #[test]
    fn zero_and_nan_fall_back() {
        assert_eq!(clamp_sim_bpm(0.0), FALLBACK_SIM_BPM);
        assert_eq!(clamp_sim_bpm(f64::NAN), FALLBACK_SIM_BPM);
        assert_eq!(clamp_sim_bpm(-5.0), FALLBACK_SIM_BPM);
        assert_eq!(clamp_sim_bpm(1200.0), 1200.0);
        assert_eq!(clamp_music_bpm(0.0), DEFAULT_MUSIC_BPM);
        assert_eq!(clamp_music_bpm(10.0), MIN_MUSIC_BPM);
        assert_eq!(clamp_spawn_rate(f64::INFINITY), DEFAULT_SPAWN_RATE);
        assert_eq!(clamp_fill_percent(0.0), DEFAULT_FILL_PERCENT);
        assert_eq!(clamp_fill_percent(1.0), MIN_FILL_PERCENT);
    }

    #[test]
    fn huge_sim_tempo_ticks_at_most_once_per_frame() {
        let config = SessionConfig {
            sim_bpm: clamp_sim_bpm(1e9),
            ..SessionConfig::default()
        };
        assert_eq!(config.sim_bpm, 1e9);
        assert_eq!(config.sim_interval_ms(), MIN_SIM_INTERVAL_MS);

        let config = SessionConfig {
            sim_bpm: 3000.0,
            ..SessionConfig::default()
        };
        assert_eq!(config.sim_interval_ms(), 20.0);
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(SessionConfig::from_json("{\"rule\": \"wireworld\"}").is_err());
        assert!(SessionConfig::from_json("not json").is_err());
    }

    #[test]
    fn scheduler_params_follow_config() {
        let config = SessionConfig::default();
        let params = config.scheduler_params();
        assert_eq!(params.bpm, 75.0);
        assert_eq!(params.columns, 8);
        assert_eq!(params.fall_step_ms(), 800.0);
        assert_eq!(config.fill_density(), 0.35);
    }
}
