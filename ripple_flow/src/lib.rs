//! # ripple_flow
//!
//! An audio-reactive particle flow field you play with your hands.
//!
//! Particles drift through a noise flow field; the live audio spectrum makes
//! them faster (bass) and bigger (mids).  A hand detector (or the mouse)
//! reports hand landmarks each frame: pinching a fingertip leaves a ripple
//! where it happened and plays the note of that height, and the ripples
//! drift along with the moving palm.
//!
//! ## Gesture → Action mapping
//!
//! | Gesture | Action |
//! |---|---|
//! | Pinch thumb + fingertip | Ripple at the fingertip; tone from the C-major octave, lowest at the top of the window |
//! | Move palm | Live ripples drift with the smoothed palm movement |
//!
//! ## Landmark sources
//!
//! * (default): **Simulation**, a hand follows the mouse; left button pinches.
//! * `--landmarks-stdin`: one JSON `LandmarkFrame` per line from an external
//!   detector.
//!
//! ### Keyboard shortcuts
//!
//! | Key | Action |
//! |---|---|
//! | `Space` | Start / stop |
//! | `R` | Reset: new flow, clear trails and ripples |
//! | `=` / `-` | Tone volume up / down |
//! | `I` | Next instrument |
//! | `Q` / `Escape` | Quit |

pub mod analyzer;
pub mod app;
pub mod canvas;
pub mod config;
pub mod landmarks;
pub mod player;
pub mod retry;
pub mod ripple;
pub mod visualizer;
