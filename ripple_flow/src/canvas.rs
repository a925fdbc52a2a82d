//! Software raster behind the window: an ARGB pixel buffer that implements
//! [`DrawSurface`] with alpha blending.

use flow_field::{DrawSurface, Vec2};

// ════════════════════════════════════════════════════════════════════════════
// Colour helpers
// ════════════════════════════════════════════════════════════════════════════

/// Source-over blend of `src` (alpha byte honoured, scaled by `coverage`)
/// onto an opaque `dst`.
pub fn blend(dst: u32, src: u32, coverage: f32) -> u32 {
    let a = ((src >> 24) & 0xFF) as f32 / 255.0 * coverage.clamp(0.0, 1.0);
    let mix = |shift: u32| {
        let d = ((dst >> shift) & 0xFF) as f32;
        let s = ((src >> shift) & 0xFF) as f32;
        ((d + (s - d) * a).round() as u32).min(255) << shift
    };
    0xFF00_0000 | mix(16) | mix(8) | mix(0)
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct Canvas {
    width:         usize,
    height:        usize,
    pixels:        Vec<u32>,
    stroke_weight: f32,
    stroke_color:  u32,
}

impl Canvas {
    pub fn new(width: usize, height: usize, background: u32) -> Self {
        Canvas {
            width,
            height,
            pixels:        vec![background | 0xFF00_0000; width * height],
            stroke_weight: 1.0,
            stroke_color:  0xFFFF_FFFF,
        }
    }

    pub fn width(&self)  -> usize  { self.width }
    pub fn height(&self) -> usize  { self.height }
    pub fn pixels(&self) -> &[u32] { &self.pixels }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Overwrite this canvas with `other`'s pixels.
    pub fn copy_from(&mut self, other: &Canvas) {
        if self.width != other.width || self.height != other.height {
            self.width  = other.width;
            self.height = other.height;
            self.pixels.resize(other.pixels.len(), 0);
        }
        self.pixels.copy_from_slice(&other.pixels);
    }

    /// Blended axis-aligned rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.height) {
            for col in x..(x + w).min(self.width) {
                let i = row * self.width + col;
                self.pixels[i] = blend(self.pixels[i], color, 1.0);
            }
        }
    }

    fn blend_at(&mut self, x: i64, y: i64, color: u32, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = y as usize * self.width + x as usize;
        self.pixels[i] = blend(self.pixels[i], color, coverage);
    }

    /// Visit every pixel whose centre is within `reach` of `center`, with its
    /// centre distance.
    fn scan(&mut self, center: Vec2, reach: f32, mut visit: impl FnMut(&mut Self, i64, i64, f32)) {
        if !center.is_finite() || !reach.is_finite() {
            return;
        }
        let x0 = (center.x - reach).floor().max(0.0) as i64;
        let y0 = (center.y - reach).floor().max(0.0) as i64;
        let x1 = ((center.x + reach).ceil() as i64).min(self.width as i64 - 1);
        let y1 = ((center.y + reach).ceil() as i64).min(self.height as i64 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center);
                visit(self, x, y, d);
            }
        }
    }
}

impl DrawSurface for Canvas {
    fn clear(&mut self, color: u32) {
        self.pixels.fill(color | 0xFF00_0000);
    }

    fn fill_circle(&mut self, center: Vec2, diameter: f32, color: u32) {
        let r = diameter * 0.5;
        if !(r > 0.0) {
            return;
        }
        // Sub-pixel dots blend into the pixel under them by area.
        if r < 0.75 {
            let coverage = (std::f32::consts::PI * r * r).min(1.0);
            self.blend_at(center.x.floor() as i64, center.y.floor() as i64, color, coverage);
            return;
        }
        self.scan(center, r, |c, x, y, d| {
            if d <= r {
                c.blend_at(x, y, color, 1.0);
            }
        });
    }

    fn set_stroke(&mut self, weight: f32, color: u32) {
        self.stroke_weight = weight;
        self.stroke_color  = color;
    }

    fn stroke_circle(&mut self, center: Vec2, diameter: f32) {
        let r = (diameter * 0.5).max(0.0);
        let half = (self.stroke_weight * 0.5).max(0.5);
        let color = self.stroke_color;
        self.scan(center, r + half, |c, x, y, d| {
            if (d - r).abs() <= half {
                c.blend_at(x, y, color, 1.0);
            }
        });
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
