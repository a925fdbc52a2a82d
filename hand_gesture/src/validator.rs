//! Per-frame plausibility filtering of raw detector hands.
//!
//! The detector is noisy: it reports half-hands, NaNs, and the occasional
//! face or sleeve as a hand.  Everything that fails here is dropped quietly;
//! a rejection is an expected outcome, not an error.

use std::fmt;

use flow_field::Vec2;

use crate::landmark::{CanvasMap, Landmark, FINGERTIPS, HAND_LANDMARKS, INDEX_MCP, PINKY_MCP, WRIST};

// ════════════════════════════════════════════════════════════════════════════
// HandSample / Rejection
// ════════════════════════════════════════════════════════════════════════════

/// A hand that passed validation, already in canvas space.
#[derive(Clone, Debug, PartialEq)]
pub struct HandSample {
    pub palm:       Vec2,
    pub fingertips: Vec<Vec2>,
}

/// Why a raw hand was not accepted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rejection {
    /// No hand in this slot.
    Absent,
    /// Wrist coordinates are NaN or infinite.
    NonFinitePalm,
    /// Slot index is beyond the tracked-hand count.
    SlotOutOfRange { slot: usize, max: usize },
    /// Not a full skeleton.
    TooFewLandmarks(usize),
    /// Palm width / height outside the accepted band.
    ImplausiblePalm { ratio: f32 },
    /// Detector confidence below the gate.
    LowConfidence { score: f32, needed: f32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Absent => write!(f, "no hand"),
            Rejection::NonFinitePalm => write!(f, "palm coordinates are not finite"),
            Rejection::SlotOutOfRange { slot, max } =>
                write!(f, "hand slot {} beyond the {} tracked", slot, max),
            Rejection::TooFewLandmarks(n) =>
                write!(f, "{} landmarks, need {}", n, HAND_LANDMARKS),
            Rejection::ImplausiblePalm { ratio } =>
                write!(f, "palm ratio {:.2} out of range", ratio),
            Rejection::LowConfidence { score, needed } =>
                write!(f, "score {:.2} below {:.2}", score, needed),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkValidator
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct LandmarkValidator {
    canvas:     CanvasMap,
    max_hands:  usize,
    fingertips: Vec<usize>,
    /// Accepted `[min, max]` for wrist→index-MCP over wrist→pinky-MCP.
    palm_ratio: (f32, f32),
}

impl LandmarkValidator {
    pub fn new(canvas: CanvasMap, max_hands: usize) -> Self {
        LandmarkValidator {
            canvas,
            max_hands,
            fingertips: FINGERTIPS.to_vec(),
            palm_ratio: (0.5, 2.0),
        }
    }

    pub fn with_fingertips(mut self, fingertips: Vec<usize>) -> Self {
        self.fingertips = fingertips;
        self
    }

    pub fn with_palm_ratio(mut self, min: f32, max: f32) -> Self {
        self.palm_ratio = (min, max);
        self
    }

    pub fn canvas(&self)     -> CanvasMap { self.canvas }
    pub fn max_hands(&self)  -> usize     { self.max_hands }
    pub fn fingertips(&self) -> &[usize]  { &self.fingertips }

    /// Accept or reject one raw hand for `slot`.
    pub fn validate(&self, raw: Option<&[Landmark]>, slot: usize) -> Result<HandSample, Rejection> {
        let hand = raw.ok_or(Rejection::Absent)?;
        let wrist = *hand.get(WRIST).ok_or(Rejection::Absent)?;

        if !wrist.is_finite() {
            return Err(Rejection::NonFinitePalm);
        }
        if slot >= self.max_hands {
            return Err(Rejection::SlotOutOfRange { slot, max: self.max_hands });
        }
        if hand.len() < HAND_LANDMARKS {
            return Err(Rejection::TooFewLandmarks(hand.len()));
        }

        let width  = wrist.distance(hand[INDEX_MCP]);
        let height = wrist.distance(hand[PINKY_MCP]);
        let ratio  = width / height;
        let (lo, hi) = self.palm_ratio;
        // NaN fails both comparisons and is rejected with the rest.
        if !(ratio >= lo && ratio <= hi) {
            return Err(Rejection::ImplausiblePalm { ratio });
        }

        let fingertips = self.fingertips.iter()
            .filter_map(|&i| hand.get(i))
            .map(|&lm| self.canvas.to_canvas(lm))
            .collect();

        Ok(HandSample { palm: self.canvas.to_canvas(wrist), fingertips })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ConfidenceGate
// ════════════════════════════════════════════════════════════════════════════

/// Detector-score gate.
///
/// A slot that is not yet tracked needs the (lower) detection score; a slot
/// already tracking needs the tracking score to stay alive.  Hands without a
/// score pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceGate {
    pub detection: f32,
    pub tracking:  f32,
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        ConfidenceGate { detection: 0.4, tracking: 0.5 }
    }
}

impl ConfidenceGate {
    pub fn check(&self, score: Option<f32>, already_tracking: bool) -> Result<(), Rejection> {
        let Some(score) = score else { return Ok(()) };
        let needed = if already_tracking { self.tracking } else { self.detection };
        if score >= needed {
            Ok(())
        } else {
            Err(Rejection::LowConfidence { score, needed })
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
