//! # tone_map
//!
//! Pitch side of the ripple-flow visualiser: which note a pinch plays and
//! how that note is spoken to a MIDI synth.
//!
//! * [`NoteTable`] buckets a vertical canvas position into one of N notes
//!   (default: the C-major octave C4–C5, top of the canvas = lowest note).
//! * [`MidiPitch::from_frequency`] turns a frequency into the nearest MIDI
//!   note plus the pitch-bend needed to hit it exactly.
//! * [`GeneralMidi`] names the handful of programs that suit short plucked
//!   tones, with `serde` names for configuration files.
//! * [`message`] builds the raw channel-voice bytes.
//!
//! ```rust
//! use tone_map::{message, MidiPitch, NoteTable};
//!
//! let notes = NoteTable::default();
//! assert_eq!(notes.index_for(0.0, 600.0), 0);
//! assert_eq!(notes.frequency_for(300.0, 600.0), 392.00);   // G4
//!
//! let p = MidiPitch::from_frequency(440.0).unwrap();
//! assert_eq!(p.note, 69);
//! assert_eq!(p.bend, message::BEND_CENTER);
//! ```

use serde::{Deserialize, Serialize};

/// Length of a triggered tone.
pub const TONE_DURATION_MS: u64 = 150;

// ════════════════════════════════════════════════════════════════════════════
// General MIDI programs
// ════════════════════════════════════════════════════════════════════════════

/// General MIDI programs usable for the tone voice (0-indexed, as sent in
/// Program Change).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GeneralMidi {
    AcousticGrandPiano = 0,
    ElectricPiano1     = 4,
    Harpsichord        = 6,
    #[default]
    Celesta            = 8,
    Glockenspiel       = 9,
    MusicBox           = 10,
    Vibraphone         = 11,
    Marimba            = 12,
    Xylophone          = 13,
    TubularBells       = 14,
    Kalimba            = 108,
    SteelDrums         = 114,
    Pad1NewAge         = 88,
    Pad2Warm           = 89,
    Lead1Square        = 80,
}

impl GeneralMidi {
    /// Raw MIDI program number (0–127).
    pub fn program(self) -> u8 { self as u8 }

    pub fn name(self) -> &'static str {
        match self {
            GeneralMidi::AcousticGrandPiano => "Acoustic Grand Piano",
            GeneralMidi::ElectricPiano1     => "Electric Piano 1",
            GeneralMidi::Harpsichord        => "Harpsichord",
            GeneralMidi::Celesta            => "Celesta",
            GeneralMidi::Glockenspiel       => "Glockenspiel",
            GeneralMidi::MusicBox           => "Music Box",
            GeneralMidi::Vibraphone         => "Vibraphone",
            GeneralMidi::Marimba            => "Marimba",
            GeneralMidi::Xylophone          => "Xylophone",
            GeneralMidi::TubularBells       => "Tubular Bells",
            GeneralMidi::Kalimba            => "Kalimba",
            GeneralMidi::SteelDrums         => "Steel Drums",
            GeneralMidi::Pad1NewAge         => "Pad 1 (New Age)",
            GeneralMidi::Pad2Warm           => "Pad 2 (Warm)",
            GeneralMidi::Lead1Square        => "Lead 1 (Square)",
        }
    }

    pub const ALL: [GeneralMidi; 15] = [
        GeneralMidi::AcousticGrandPiano, GeneralMidi::ElectricPiano1,
        GeneralMidi::Harpsichord,        GeneralMidi::Celesta,
        GeneralMidi::Glockenspiel,       GeneralMidi::MusicBox,
        GeneralMidi::Vibraphone,         GeneralMidi::Marimba,
        GeneralMidi::Xylophone,          GeneralMidi::TubularBells,
        GeneralMidi::Kalimba,            GeneralMidi::SteelDrums,
        GeneralMidi::Pad1NewAge,         GeneralMidi::Pad2Warm,
        GeneralMidi::Lead1Square,
    ];

    /// The instrument after this one in [`ALL`](Self::ALL), wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&g| g == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

// ════════════════════════════════════════════════════════════════════════════
// NoteTable — vertical position → frequency
// ════════════════════════════════════════════════════════════════════════════

/// C4 D4 E4 F4 G4 A4 B4 C5.
pub const C_MAJOR_OCTAVE: [f32; 8] = [
    261.63, 293.66, 329.63, 349.23, 392.00, 440.00, 493.88, 523.25,
];

/// Ordered pitch list indexed by equal horizontal bands of the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteTable {
    notes: Vec<f32>,
}

impl Default for NoteTable {
    fn default() -> Self {
        NoteTable { notes: C_MAJOR_OCTAVE.to_vec() }
    }
}

impl NoteTable {
    /// `None` for an empty list or a non-positive / non-finite frequency.
    pub fn new(notes: Vec<f32>) -> Option<Self> {
        if notes.is_empty() || notes.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return None;
        }
        Some(NoteTable { notes })
    }

    pub fn notes(&self) -> &[f32] { &self.notes }
    pub fn len(&self)   -> usize  { self.notes.len() }

    /// Band index of `y` on a canvas `height` tall: `floor(y / height · N)`,
    /// clamped to `0..N`.  NaN and degenerate heights fall into band 0.
    pub fn index_for(&self, y: f32, height: f32) -> usize {
        let n = self.notes.len();
        if !(height > 0.0) {
            return 0;
        }
        let band = (y / height * n as f32).floor();
        if !(band > 0.0) {
            0
        } else {
            (band as usize).min(n - 1)
        }
    }

    pub fn frequency_for(&self, y: f32, height: f32) -> f32 {
        self.notes[self.index_for(y, height)]
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MidiPitch — frequency → note + pitch bend
// ════════════════════════════════════════════════════════════════════════════

/// Nearest equal-tempered MIDI note plus the 14-bit bend that corrects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiPitch {
    pub note: u8,
    /// 0..=16383, centre 8192, assuming the synth's default ±2 semitone range.
    pub bend: u16,
}

impl MidiPitch {
    pub fn from_frequency(hz: f32) -> Option<Self> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        let exact = 69.0 + 12.0 * (hz / 440.0).log2();
        let note  = exact.round().clamp(0.0, 127.0);
        let offset = (exact - note).clamp(-message::BEND_RANGE, message::BEND_RANGE);
        let bend = message::BEND_CENTER as f32 + offset / message::BEND_RANGE * 8191.0;
        Some(MidiPitch {
            note: note as u8,
            bend: bend.round().clamp(0.0, 16383.0) as u16,
        })
    }

    /// Frequency of `note` with no bend.
    pub fn note_frequency(note: u8) -> f32 {
        440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
    }
}

/// `0.0..=1.0` volume → MIDI velocity.
pub fn velocity_for(volume: f32) -> u8 {
    if !volume.is_finite() {
        return 0;
    }
    (volume.clamp(0.0, 1.0) * 127.0).round() as u8
}

// ════════════════════════════════════════════════════════════════════════════
// Raw channel-voice messages
// ════════════════════════════════════════════════════════════════════════════

pub mod message {
    pub const BEND_CENTER: u16 = 8192;
    /// Semitones covered by a full bend.
    pub const BEND_RANGE: f32 = 2.0;

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
        [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
    }

    pub fn note_off(channel: u8, note: u8) -> [u8; 3] {
        [0x80 | (channel & 0x0F), note & 0x7F, 0]
    }

    pub fn program_change(channel: u8, program: u8) -> [u8; 2] {
        [0xC0 | (channel & 0x0F), program & 0x7F]
    }

    /// 14-bit bend, LSB first.
    pub fn pitch_bend(channel: u8, bend: u16) -> [u8; 3] {
        let b = bend.min(0x3FFF);
        [0xE0 | (channel & 0x0F), (b & 0x7F) as u8, (b >> 7) as u8]
    }

    pub fn all_notes_off(channel: u8) -> [u8; 3] {
        [0xB0 | (channel & 0x0F), 123, 0]
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
