//! Draw-surface seam.
//!
//! Particles and ripples only ever talk to a [`DrawSurface`]; the window
//! backend, an off-screen buffer, or a test recorder can sit behind it.

use glam::Vec2;

/// Something that can accept the handful of primitives the scene uses.
///
/// Colours are packed `0xAARRGGBB`; the alpha byte is honoured by blending
/// backends.
pub trait DrawSurface {
    /// Fill the whole surface.
    fn clear(&mut self, color: u32);

    /// Filled disc, no outline.
    fn fill_circle(&mut self, center: Vec2, diameter: f32, color: u32);

    /// Set the outline style used by [`stroke_circle`](Self::stroke_circle).
    fn set_stroke(&mut self, weight: f32, color: u32);

    /// Unfilled ring in the current stroke style.
    fn stroke_circle(&mut self, center: Vec2, diameter: f32);
}

/// One recorded primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    Clear(u32),
    FillCircle { center: Vec2, diameter: f32, color: u32 },
    Stroke { weight: f32, color: u32 },
    StrokeCircle { center: Vec2, diameter: f32 },
}

/// Surface that only remembers what it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<DrawCall>,
}

impl RecordingSurface {
    pub fn new() -> Self { Self::default() }

    pub fn stroke_circles(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, DrawCall::StrokeCircle { .. })).count()
    }

    pub fn fill_circles(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, DrawCall::FillCircle { .. })).count()
    }
}

impl DrawSurface for RecordingSurface {
    fn clear(&mut self, color: u32) {
        self.calls.push(DrawCall::Clear(color));
    }
    fn fill_circle(&mut self, center: Vec2, diameter: f32, color: u32) {
        self.calls.push(DrawCall::FillCircle { center, diameter, color });
    }
    fn set_stroke(&mut self, weight: f32, color: u32) {
        self.calls.push(DrawCall::Stroke { weight, color });
    }
    fn stroke_circle(&mut self, center: Vec2, diameter: f32) {
        self.calls.push(DrawCall::StrokeCircle { center, diameter });
    }}

/// Pack an opaque RGB colour with a separate alpha byte.
pub fn with_alpha(color: u32, alpha: u8) -> u32 {
    (color & 0x00FF_FFFF) | ((alpha as u32) << 24)
}
