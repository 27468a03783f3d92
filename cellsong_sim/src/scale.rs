// Scale and key resolution.
//
// A key is a tonic pitch class plus one of the built-in scales. Applying a
// key rewrites every note's pitch from its ordinal index in the registry:
//
//   pitch = 36 + ((tonic + intervals[i % len]) % 12) + 12 * (i / len)
//
// so the bank walks up the scale from C2 and wraps into the next octave once
// the scale's degrees are used up. The `% 12` folds the upper degrees of a
// high tonic back down into the same octave.
//
// Applying is a one-shot bulk edit. Boxes already falling keep whatever note
// they resolve next, read fresh from the registry.

use crate::notes::NoteRegistry;
use cellsong_prng::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest pitch a key assignment produces (C2).
pub const KEY_BASE_PITCH: u8 = 36;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tonic {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[default]
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl Tonic {
    pub const ALL: [Tonic; 12] = [
        Tonic::C,
        Tonic::CSharp,
        Tonic::D,
        Tonic::DSharp,
        Tonic::E,
        Tonic::F,
        Tonic::FSharp,
        Tonic::G,
        Tonic::GSharp,
        Tonic::A,
        Tonic::ASharp,
        Tonic::B,
    ];

    /// Pitch class, C = 0.
    pub fn pitch_class(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Tonic::C => "C",
            Tonic::CSharp => "C#",
            Tonic::D => "D",
            Tonic::DSharp => "D#",
            Tonic::E => "E",
            Tonic::F => "F",
            Tonic::FSharp => "F#",
            Tonic::G => "G",
            Tonic::GSharp => "G#",
            Tonic::A => "A",
            Tonic::ASharp => "A#",
            Tonic::B => "B",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Major,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Minor,
    Locrian,
    HarmonicMinor,
    #[default]
    PhrygianDominant,
    WholeTone,
    Chromatic,
}

impl Scale {
    pub const ALL: [Scale; 11] = [
        Scale::Major,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::Minor,
        Scale::Locrian,
        Scale::HarmonicMinor,
        Scale::PhrygianDominant,
        Scale::WholeTone,
        Scale::Chromatic,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Scale::Major => "Ionian (Major)",
            Scale::Dorian => "Dorian",
            Scale::Phrygian => "Phrygian",
            Scale::Lydian => "Lydian",
            Scale::Mixolydian => "Mixolydian",
            Scale::Minor => "Aeolian (Natural Minor)",
            Scale::Locrian => "Locrian",
            Scale::HarmonicMinor => "Harmonic Minor",
            Scale::PhrygianDominant => "Phrygian Dominant",
            Scale::WholeTone => "Whole Tone",
            Scale::Chromatic => "Chromatic",
        }
    }

    /// Semitone offsets from the tonic, ascending, starting at 0.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::PhrygianDominant => &[0, 1, 4, 5, 7, 8, 10],
            Scale::WholeTone => &[0, 2, 4, 6, 8, 10],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }
}

/// A tonic plus a scale. Defaults to A Phrygian Dominant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySignature {
    pub tonic: Tonic,
    pub scale: Scale,
}

impl KeySignature {
    pub fn new(tonic: Tonic, scale: Scale) -> Self {
        Self { tonic, scale }
    }

    /// Pitch for the note at ordinal `index`.
    pub fn pitch_for_index(self, index: usize) -> u8 {
        let intervals = self.scale.intervals();
        let degree = intervals[index % intervals.len()];
        let octave = (index / intervals.len()) as u8;
        let pitch_class = (self.tonic.pitch_class() + degree) % 12;
        KEY_BASE_PITCH
            .saturating_add(pitch_class)
            .saturating_add(octave.saturating_mul(12))
    }

    /// Display label, e.g. "A Phrygian Dominant".
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic.name(), self.scale.label())
    }
}

/// Rewrite every note's pitch for `key`.
pub fn apply_key(registry: &mut NoteRegistry, key: KeySignature) {
    registry.assign_pitches(|i| key.pitch_for_index(i));
}

/// A uniformly random tonic and scale.
pub fn random_key<R: RandomSource + ?Sized>(rng: &mut R) -> KeySignature {
    let tonic = Tonic::ALL[rng.range_usize(0, Tonic::ALL.len())];
    let scale = Scale::ALL[rng.range_usize(0, Scale::ALL.len())];
    KeySignature::new(tonic, scale)
}
