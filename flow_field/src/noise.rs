//! Coherent value noise.
//!
//! A 4096-entry random lattice, cosine-interpolated and summed over a few
//! octaves.  This is the noise flavour creative-coding sketches reach for:
//! smooth, cheap, and always inside `[0, 1)`.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

// ════════════════════════════════════════════════════════════════════════════
// Lattice constants
// ════════════════════════════════════════════════════════════════════════════

const YWRAP_BITS: u32 = 4;
const YWRAP:      usize = 1 << YWRAP_BITS;
const TABLE_MASK: usize = 4095;

const DEFAULT_OCTAVES: u32 = 4;
const DEFAULT_FALLOFF: f32 = 0.5;

// ════════════════════════════════════════════════════════════════════════════
// NoiseField
// ════════════════════════════════════════════════════════════════════════════

/// Deterministic scalar field over the plane.
///
/// Two calls with the same `(x, y)` on the same field always agree, and small
/// input deltas give small output deltas.
#[derive(Clone, Debug)]
pub struct NoiseField {
    table:   Vec<f32>,
    octaves: u32,
    falloff: f32,
}

impl NoiseField {
    /// Build a field from any random source.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let table = (0..=TABLE_MASK).map(|_| rng.gen::<f32>()).collect();
        NoiseField { table, octaves: DEFAULT_OCTAVES, falloff: DEFAULT_FALLOFF }
    }

    /// Build a reproducible field from a seed.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(&mut SmallRng::seed_from_u64(seed))
    }

    /// Sample the field.  Result is in `[0, 1)`.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        // The lattice is mirrored about the axes.
        let x = if x.is_finite() { x.abs() } else { 0.0 };
        let y = if y.is_finite() { y.abs() } else { 0.0 };

        let mut xi = x.floor() as usize;
        let mut yi = y.floor() as usize;
        let mut xf = x - x.floor();
        let mut yf = y - y.floor();

        let mut sum  = 0.0_f32;
        let mut ampl = 0.5_f32;

        for _ in 0..self.octaves {
            let of = xi.wrapping_add(yi << YWRAP_BITS);

            let rxf = scaled_cosine(xf);
            let ryf = scaled_cosine(yf);

            let mut n1 = self.at(of);
            n1 += rxf * (self.at(of.wrapping_add(1)) - n1);
            let mut n2 = self.at(of.wrapping_add(YWRAP));
            n2 += rxf * (self.at(of.wrapping_add(YWRAP + 1)) - n2);
            n1 += ryf * (n2 - n1);

            sum  += n1 * ampl;
            ampl *= self.falloff;

            xi <<= 1;
            xf *= 2.0;
            yi <<= 1;
            yf *= 2.0;
            if xf >= 1.0 { xi = xi.wrapping_add(1); xf -= 1.0; }
            if yf >= 1.0 { yi = yi.wrapping_add(1); yf -= 1.0; }
        }

        // Guard the open upper bound against float rounding.
        sum.min(1.0 - f32::EPSILON)
    }

    fn at(&self, i: usize) -> f32 {
        self.table[i & TABLE_MASK]
    }
}

/// Cosine ease from 0 to 1 over `[0, 1]`.
fn scaled_cosine(t: f32) -> f32 {
    0.5 * (1.0 - (t * std::f32::consts::PI).cos())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
