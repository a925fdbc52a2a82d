//! Expanding rings left behind by pinch gestures.

use flow_field::{with_alpha, DrawSurface, Vec2};
use hand_gesture::{MovementVector, PinchStart};
use serde::Deserialize;

/// Ticks a ripple lives for.
pub const RIPPLE_LIFETIME: u32 = 150;

/// Fraction of the hand movement a ripple follows each tick.
pub const RIPPLE_DRIFT: f32 = 0.1;

// ════════════════════════════════════════════════════════════════════════════
// RippleStyle
// ════════════════════════════════════════════════════════════════════════════

/// One ring of a ripple.
///
/// `alpha` is the fade per tick of age, `scale` the diameter growth per tick.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RippleStyle {
    pub weight: f32,
    pub alpha:  f32,
    pub scale:  f32,
}

impl RippleStyle {
    pub const fn new(weight: f32, alpha: f32, scale: f32) -> Self {
        RippleStyle { weight, alpha, scale }
    }

    /// Stroke opacity at `age`.
    pub fn opacity(&self, age: u32) -> u8 {
        (255.0 - age as f32 * self.alpha).round().clamp(0.0, 255.0) as u8
    }

    pub fn diameter(&self, age: u32) -> f32 {
        age as f32 * self.scale
    }
}

/// Thin fast ring outside, heavy slow ring inside.
pub const DEFAULT_STYLES: [RippleStyle; 3] = [
    RippleStyle::new(0.8,  1.87, 1.25),
    RippleStyle::new(1.45, 1.65, 0.8),
    RippleStyle::new(2.0,  1.34, 0.6),
];

// ════════════════════════════════════════════════════════════════════════════
// Ripple
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ripple {
    pub position: Vec2,
    pub age:      u32,
}

// ════════════════════════════════════════════════════════════════════════════
// RippleManager
// ════════════════════════════════════════════════════════════════════════════

/// Owns the live ripples.
///
/// Per tick the app calls [`tick`](Self::tick) (age, prune, drift), then
/// [`spawn`](Self::spawn) for the tick's pinches, then
/// [`draw`](Self::draw).  A ripple is therefore drawn at ages
/// `0..lifetime` and gone on the tick it would reach `lifetime`.
#[derive(Clone, Debug)]
pub struct RippleManager {
    ripples:  Vec<Ripple>,
    lifetime: u32,
    drift:    f32,
    styles:   Vec<RippleStyle>,
}

impl Default for RippleManager {
    fn default() -> Self {
        RippleManager::new(RIPPLE_LIFETIME, RIPPLE_DRIFT, DEFAULT_STYLES.to_vec())
    }
}

impl RippleManager {
    pub fn new(lifetime: u32, drift: f32, styles: Vec<RippleStyle>) -> Self {
        RippleManager { ripples: Vec::new(), lifetime, drift, styles }
    }

    pub fn spawn(&mut self, pinch: &PinchStart) {
        self.ripples.push(Ripple { position: pinch.position, age: 0 });
    }

    pub fn tick(&mut self, movement: MovementVector) {
        for r in &mut self.ripples {
            r.age += 1;
        }
        let lifetime = self.lifetime;
        self.ripples.retain(|r| r.age < lifetime);

        let step = movement.delta * self.drift;
        for r in &mut self.ripples {
            r.position += step;
        }
    }

    pub fn draw<S: DrawSurface + ?Sized>(&self, surface: &mut S) {
        for r in &self.ripples {
            for style in &self.styles {
                surface.set_stroke(style.weight, with_alpha(0xFFFFFF, style.opacity(r.age)));
                surface.stroke_circle(r.position, style.diameter(r.age));
            }
        }
    }

    pub fn clear(&mut self) { self.ripples.clear(); }

    pub fn ripples(&self)  -> &[Ripple] { &self.ripples }
    pub fn len(&self)      -> usize     { self.ripples.len() }
    pub fn is_empty(&self) -> bool      { self.ripples.is_empty() }
    pub fn lifetime(&self) -> u32       { self.lifetime }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
