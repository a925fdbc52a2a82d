//! # flow_field
//!
//! Noise-driven flow field and the particle motion model that rides on it.
//!
//! ## Quick start
//!
//! ```rust
//! use flow_field::{Bounds, ParticleConfig, ParticleField};
//!
//! let mut field = ParticleField::new(
//!     ParticleConfig::default(),
//!     Bounds::new(800.0, 600.0, 50.0),
//!     Some(7),
//! );
//!
//! // energy, bass: analyser bytes in [0, 255]
//! field.update(120.0, 40.0);
//! assert_eq!(field.len(), 200);
//! ```
//!
//! ## Per-tick motion
//!
//! | Step | Effect |
//! |---|---|
//! | energy → `[0.5, 2]` | drawn diameter = base × factor |
//! | bass → `[0.5, 2]` | target speed and speed cap |
//! | noise(x/s, y/s) · 2π · s | heading |
//! | lerp 0.1 | velocity eases toward heading |
//! | margin wrap | escaped particles are re-dropped at random |

pub mod noise;
pub mod particle;
pub mod surface;

pub use glam::Vec2;
pub use noise::NoiseField;
pub use particle::{
    level_factor, map_range, Bounds, Flow, Particle, ParticleConfig, ParticleField,
};
pub use surface::{with_alpha, DrawCall, DrawSurface, RecordingSurface};
