//! # hand_gesture
//!
//! Hand-landmark interpretation for the ripple-flow visualiser.
//!
//! An external detector reports, per camera frame, up to N hands as 21
//! normalised landmarks plus a per-fingertip pinch state.  This crate turns
//! that into two things the scene can use:
//!
//! | Output             | Produced by                      | Used for              |
//! |--------------------|----------------------------------|-----------------------|
//! | [`MovementVector`] | palm tracking, smoothed          | drifting ripples      |
//! | [`PinchStart`]     | fingertip `Start` transitions    | spawning ripple+tone  |
//!
//! ```
//! use hand_gesture::{CanvasMap, ConfidenceGate, GestureTracker, LandmarkFrame,
//!                    LandmarkValidator, TrackerConfig};
//!
//! let validator = LandmarkValidator::new(CanvasMap::new(800.0, 600.0), 2);
//! let mut tracker = GestureTracker::new(2, 4, TrackerConfig::default());
//! let starts = tracker.process(&LandmarkFrame::default(), &validator, &ConfidenceGate::default());
//! assert!(starts.is_empty());
//! ```

pub mod landmark;
pub mod tracker;
pub mod validator;

pub use landmark::{CanvasMap, Landmark, LandmarkFrame, PinchState, FINGERTIPS, HAND_LANDMARKS};
pub use tracker::{
    GestureTracker, HandTrackState, MovementVector, PalmUpdate, PinchStart, SlotPhase, TrackerConfig,
};
pub use validator::{ConfidenceGate, HandSample, LandmarkValidator, Rejection};
