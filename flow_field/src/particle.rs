//! Particle motion over the noise flow field.
//!
//! Every tick a particle looks up the field under itself, turns the sample
//! into a heading, eases its velocity toward that heading and moves.  Audio
//! levels modulate both the drawn size (`energy`) and the speed (`bass`).

use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::noise::NoiseField;
use crate::surface::DrawSurface;

/// Fraction of the way the velocity moves toward its target each tick.
pub const VELOCITY_BLEND: f32 = 0.1;

/// Audio levels arrive as analyser bytes.
pub const LEVEL_MAX: f32 = 255.0;

// ════════════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════════════

/// Linear re-mapping of `v` from one interval to another (no clamping).
pub fn map_range(v: f32, in_lo: f32, in_hi: f32, out_lo: f32, out_hi: f32) -> f32 {
    out_lo + (v - in_lo) * (out_hi - out_lo) / (in_hi - in_lo)
}

/// Audio level `[0, 255]` → scale factor `[0.5, 2.0]`.
pub fn level_factor(level: f32) -> f32 {
    let level = if level.is_finite() { level.clamp(0.0, LEVEL_MAX) } else { 0.0 };
    map_range(level, 0.0, LEVEL_MAX, 0.5, 2.0)
}

fn pick<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f32, f32)) -> f32 {
    if lo < hi { rng.gen_range(lo..hi) } else { lo }
}

// ════════════════════════════════════════════════════════════════════════════
// Bounds
// ════════════════════════════════════════════════════════════════════════════

/// Canvas rectangle plus the margin particles may wander into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub width:  f32,
    pub height: f32,
    pub margin: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32, margin: f32) -> Self {
        Bounds { width, height, margin }
    }

    /// True while `p` lies inside the expanded rectangle (edges included).
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= -self.margin
            && p.x <= self.width + self.margin
            && p.y >= -self.margin
            && p.y <= self.height + self.margin
    }

    /// Uniform point inside the expanded rectangle.
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(
            pick(rng, (-self.margin, self.width + self.margin)),
            pick(rng, (-self.margin, self.height + self.margin)),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Flow — the field plus the scale it is read at
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct Flow {
    pub noise:  NoiseField,
    /// Sampling divisor; also multiplies the heading (see [`Flow::heading`]).
    pub scale:  f32,
    pub bounds: Bounds,
}

impl Flow {
    /// Heading in radians for a particle at `pos`.
    ///
    /// The sample is stretched by `2π · scale`, not just `2π`.  The large,
    /// scale-dependent angle is what gives the field its grainy look; the
    /// trig functions wrap it.
    pub fn heading(&self, pos: Vec2) -> f32 {
        let n = self.noise.sample(pos.x / self.scale, pos.y / self.scale);
        n * TAU * self.scale
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ParticleConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct ParticleConfig {
    pub count:      usize,
    /// `[min, max)` top speed in canvas units per tick.
    pub max_speed:  (f32, f32),
    /// `[min, max)` base diameter.
    pub radius:     (f32, f32),
    /// `[min, max)` flow-field scale, drawn once per (re)spawn of the field.
    pub flow_scale: (f32, f32),
    pub palette:    Vec<u32>,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        ParticleConfig {
            count:      200,
            max_speed:  (2.0, 4.0),
            radius:     (0.25, 1.0),
            flow_scale: (800.0, 2000.0),
            palette:    vec![
                0xFF0799F2, 0xFFFFFFFF, 0xFF0058A1,
                0xFF004B97, 0xFF84C1FF, 0xFFC5AFD4,
            ],
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Particle
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position:    Vec2,
    pub velocity:    Vec2,
    pub base_radius: f32,
    /// Diameter after the energy factor of the latest update.
    pub radius:      f32,
    pub max_speed:   f32,
    pub color:       u32,
}

impl Particle {
    pub fn spawn<R: Rng + ?Sized>(cfg: &ParticleConfig, bounds: &Bounds, rng: &mut R) -> Self {
        let base_radius = pick(rng, cfg.radius);
        let color = if cfg.palette.is_empty() {
            0xFFFFFFFF
        } else {
            cfg.palette[rng.gen_range(0..cfg.palette.len())]
        };
        Particle {
            position: bounds.random_point(rng),
            velocity: Vec2::ZERO,
            base_radius,
            radius: base_radius,
            max_speed: pick(rng, cfg.max_speed),
            color,
        }
    }

    /// Advance one tick.  Returns `true` when the particle left the bounds
    /// and was dropped back in somewhere random.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        flow:   &Flow,
        energy: f32,
        bass:   f32,
        rng:    &mut R,
    ) -> bool {
        self.radius = self.base_radius * level_factor(energy);

        let speed  = level_factor(bass);
        let target = Vec2::from_angle(flow.heading(self.position)) * speed;

        self.velocity = self.velocity.lerp(target, VELOCITY_BLEND)
            .clamp_length_max(self.max_speed * speed);
        self.position += self.velocity;

        if flow.bounds.contains(self.position) {
            return false;
        }
        self.position = flow.bounds.random_point(rng);
        true
    }

    pub fn draw<S: DrawSurface + ?Sized>(&self, surface: &mut S) {
        surface.fill_circle(self.position, self.radius, self.color);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ParticleField — the whole collection
// ════════════════════════════════════════════════════════════════════════════

/// Owns every particle, the flow they read and the random source used to
/// place them.
pub struct ParticleField {
    particles: Vec<Particle>,
    flow:      Flow,
    config:    ParticleConfig,
    rng:       SmallRng,
}

impl ParticleField {
    /// `seed = None` draws from OS entropy.
    pub fn new(config: ParticleConfig, bounds: Bounds, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None    => SmallRng::from_entropy(),
        };
        let noise = NoiseField::from_rng(&mut rng);
        let scale = pick(&mut rng, config.flow_scale);
        let mut field = ParticleField {
            particles: Vec::with_capacity(config.count),
            flow: Flow { noise, scale, bounds },
            config,
            rng,
        };
        field.top_up();
        field
    }

    /// Advance every particle.  Returns how many wrapped this tick.
    pub fn update(&mut self, energy: f32, bass: f32) -> usize {
        self.top_up();
        let mut wrapped = 0;
        for p in &mut self.particles {
            if p.update(&self.flow, energy, bass, &mut self.rng) {
                wrapped += 1;
            }
        }
        wrapped
    }

    /// Keep the collection at exactly the configured count.
    pub fn top_up(&mut self) {
        self.particles.truncate(self.config.count);
        while self.particles.len() < self.config.count {
            let p = Particle::spawn(&self.config, &self.flow.bounds, &mut self.rng);
            self.particles.push(p);
        }
    }

    /// Fresh particles and a fresh flow scale; the noise lattice is kept.
    pub fn reset(&mut self) {
        self.particles.clear();
        self.flow.scale = pick(&mut self.rng, self.config.flow_scale);
        self.top_up();
    }

    pub fn draw<S: DrawSurface + ?Sized>(&self, surface: &mut S) {
        for p in &self.particles {
            p.draw(surface);
        }
    }

    pub fn particles(&self)         -> &[Particle]       { &self.particles }
    pub fn particles_mut(&mut self) -> &mut [Particle]   { &mut self.particles }
    pub fn flow(&self)              -> &Flow             { &self.flow }
    pub fn len(&self)               -> usize             { self.particles.len() }
    pub fn is_empty(&self)          -> bool              { self.particles.is_empty() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    fn bounds() -> Bounds { Bounds::new(800.0, 600.0, 50.0) }

    fn field(seed: u64) -> ParticleField {
        ParticleField::new(ParticleConfig::default(), bounds(), Some(seed))
    }

    #[test]
    fn map_range_endpoints() {
        assert_eq!(map_range(0.0, 0.0, 255.0, 0.5, 2.0), 0.5);
        assert_eq!(map_range(255.0, 0.0, 255.0, 0.5, 2.0), 2.0);
    }

    #[test]
    fn level_factor_clamps_input() {
        assert_eq!(level_factor(-40.0), 0.5);
        assert_eq!(level_factor(1000.0), 2.0);
        assert_eq!(level_factor(f32::NAN), 0.5);
    }

    #[test]
    fn spawn_respects_config_ranges() {
        let cfg = ParticleConfig::default();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..200 {
            let p = Particle::spawn(&cfg, &bounds(), &mut rng);
            assert!(p.base_radius >= 0.25 && p.base_radius < 1.0);
            assert!(p.max_speed >= 2.0 && p.max_speed < 4.0);
            assert!(bounds().contains(p.position));
            assert!(cfg.palette.contains(&p.color));
        }
    }

    #[test]
    fn radius_stays_within_energy_band() {
        let mut f = field(2);
        for (energy, bass) in [(0.0, 0.0), (255.0, 255.0), (128.0, 30.0), (400.0, -3.0)] {
            f.update(energy, bass);
            for p in f.particles() {
                assert!(p.radius >= 0.5 * p.base_radius - 1e-6);
                assert!(p.radius <= 2.0 * p.base_radius + 1e-6);
            }
        }
    }

    #[test]
    fn velocity_limited_by_bass() {
        let mut f = field(3);
        for bass in [0.0, 64.0, 200.0, 255.0] {
            for _ in 0..20 {
                f.update(100.0, bass);
            }
            let cap = level_factor(bass);
            for p in f.particles() {
                assert!(p.velocity.length() <= p.max_speed * cap + 1e-4);
            }
        }
    }

    #[test]
    fn velocity_eases_toward_target() {
        let mut f = field(4);
        let flow = f.flow().clone();
        let mut rng = SmallRng::seed_from_u64(0);
        let p = &mut f.particles_mut()[0];
        p.position = Vec2::new(400.0, 300.0);
        p.velocity = Vec2::ZERO;
        let target = Vec2::from_angle(flow.heading(p.position)) * level_factor(0.0);
        p.update(&flow, 0.0, 0.0, &mut rng);
        // One tenth of the way from rest.
        assert!((p.velocity - target * VELOCITY_BLEND).length() < 1e-5);
    }

    #[test]
    fn escaped_particle_is_resampled_inside() {
        let mut f = field(5);
        let flow = f.flow().clone();
        let mut rng = SmallRng::seed_from_u64(9);
        let p = &mut f.particles_mut()[0];
        p.position = Vec2::new(-500.0, 2000.0);
        let wrapped = p.update(&flow, 0.0, 0.0, &mut rng);
        assert!(wrapped);
        assert!(flow.bounds.contains(p.position));
    }

    #[test]
    fn particle_inside_is_not_moved_far() {
        let mut f = field(6);
        let flow = f.flow().clone();
        let mut rng = SmallRng::seed_from_u64(9);
        let p = &mut f.particles_mut()[0];
        p.position = Vec2::new(400.0, 300.0);
        p.velocity = Vec2::ZERO;
        let wrapped = p.update(&flow, 0.0, 255.0, &mut rng);
        assert!(!wrapped);
        assert!(p.position.distance(Vec2::new(400.0, 300.0)) <= p.max_speed * 2.0);
    }

    #[test]
    fn heading_uses_scaled_angle() {
        let f = field(7);
        let flow = f.flow();
        let pos = Vec2::new(123.0, 456.0);
        let n = flow.noise.sample(pos.x / flow.scale, pos.y / flow.scale);
        assert_eq!(flow.heading(pos), n * TAU * flow.scale);
    }

    #[test]
    fn count_held_constant() {
        let mut f = field(8);
        assert_eq!(f.len(), 200);
        for _ in 0..30 { f.update(255.0, 255.0); }
        assert_eq!(f.len(), 200);
    }

    #[test]
    fn reset_picks_scale_in_range() {
        let mut f = field(10);
        f.reset();
        let s = f.flow().scale;
        assert!((800.0..2000.0).contains(&s));
        assert_eq!(f.len(), 200);
    }

    #[test]
    fn draw_fills_one_circle_per_particle() {
        let f = field(12);
        let mut s = RecordingSurface::new();
        f.draw(&mut s);
        assert_eq!(s.fill_circles(), 200);
    }
}
