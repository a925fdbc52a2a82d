//! Raw detector output: landmark frames, pinch states, canvas mapping.

use flow_field::Vec2;
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// Hand landmark indices (21-point hand skeleton)
// ════════════════════════════════════════════════════════════════════════════

pub const HAND_LANDMARKS: usize = 21;

pub const WRIST:      usize = 0;
pub const THUMB_TIP:  usize = 4;
pub const INDEX_MCP:  usize = 5;
pub const INDEX_TIP:  usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP:   usize = 16;
pub const PINKY_MCP:  usize = 17;
pub const PINKY_TIP:  usize = 20;

/// The four non-thumb fingertips, in pinch-slot order.
pub const FINGERTIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

// ════════════════════════════════════════════════════════════════════════════
// Landmark
// ════════════════════════════════════════════════════════════════════════════

/// One detector point, normalised to `[0, 1]` in camera space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self { Landmark { x, y } }

    pub fn distance(self, other: Landmark) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

// ════════════════════════════════════════════════════════════════════════════
// PinchState
// ════════════════════════════════════════════════════════════════════════════

/// Per-fingertip pinch state reported by the detector each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinchState {
    /// Thumb and fingertip just touched.
    Start,
    /// Still touching.
    #[serde(alias = "held")]
    Holding,
    /// Just released.
    #[serde(alias = "released")]
    End,
    #[default]
    #[serde(alias = "none")]
    Idle,
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkFrame
// ════════════════════════════════════════════════════════════════════════════

/// Everything the detector reports for one camera frame.
///
/// `hands[i]` is an ordered landmark list; `pinch[i][f]` is the pinch state of
/// fingertip slot `f` on hand `i`.  `scores` is optional per-hand detector
/// confidence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub hands:  Vec<Vec<Landmark>>,
    #[serde(default)]
    pub scores: Vec<f32>,
    #[serde(default)]
    pub pinch:  Vec<Vec<PinchState>>,
}

impl LandmarkFrame {
    pub fn hand(&self, i: usize) -> Option<&[Landmark]> {
        self.hands.get(i).map(Vec::as_slice)
    }

    pub fn score(&self, i: usize) -> Option<f32> {
        self.scores.get(i).copied()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CanvasMap — normalised camera space → mirrored canvas space
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasMap {
    pub width:  f32,
    pub height: f32,
}

impl CanvasMap {
    pub fn new(width: f32, height: f32) -> Self { CanvasMap { width, height } }

    /// Mirror horizontally (the camera faces the user) and scale.
    pub fn to_canvas(&self, lm: Landmark) -> Vec2 {
        Vec2::new(self.width - lm.x * self.width, lm.y * self.height)
    }

    /// Inverse of [`to_canvas`](Self::to_canvas).
    pub fn to_normalized(&self, p: Vec2) -> Landmark {
        Landmark::new((self.width - p.x) / self.width, p.y / self.height)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_map_mirrors_x() {
        let m = CanvasMap::new(800.0, 600.0);
        assert_eq!(m.to_canvas(Landmark::new(0.0, 0.0)), Vec2::new(800.0, 0.0));
        assert_eq!(m.to_canvas(Landmark::new(1.0, 1.0)), Vec2::new(0.0, 600.0));
        assert_eq!(m.to_canvas(Landmark::new(0.875, 0.5)), Vec2::new(100.0, 300.0));
    }

    #[test]
    fn canvas_map_inverse() {
        let m = CanvasMap::new(800.0, 600.0);
        let p = Vec2::new(250.0, 120.0);
        let back = m.to_canvas(m.to_normalized(p));
        assert!((back - p).length() < 1e-3);
    }

    #[test]
    fn pinch_state_from_json() {
        let s: Vec<PinchState> =
            serde_json::from_str(r#"["start","holding","end","none","idle","held"]"#).unwrap();
        assert_eq!(s, vec![
            PinchState::Start, PinchState::Holding, PinchState::End,
            PinchState::Idle, PinchState::Idle, PinchState::Holding,
        ]);
    }

    #[test]
    fn frame_fields_default() {
        let f: LandmarkFrame = serde_json::from_str(r#"{"hands":[[{"x":0.1,"y":0.2,"z":0.0}]]}"#).unwrap();
        assert_eq!(f.hands.len(), 1);
        assert!(f.pinch.is_empty());
        assert_eq!(f.score(0), None);
        assert_eq!(f.hand(0).map(|h| h[0]), Some(Landmark::new(0.1, 0.2)));
    }
}
