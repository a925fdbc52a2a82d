//! Cross-frame hand tracking: smoothed palm movement and pinch-start events.
//!
//! Each hand slot runs a two-state machine:
//!
//! ```text
//!   Uninitialized ──valid sample──▶ Tracking ──(reacquire_after misses)──┐
//!        ▲                                                                │
//!        └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first sample of a slot only seeds it.  Later samples that jump more
//! than `teleport_threshold` are treated as detector glitches and ignored.
//! Everything else is eased toward and published as the shared
//! [`MovementVector`].

use flow_field::Vec2;

use crate::landmark::{CanvasMap, LandmarkFrame, PinchState};
use crate::validator::{ConfidenceGate, LandmarkValidator};

// ════════════════════════════════════════════════════════════════════════════
// TrackerConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerConfig {
    /// Palm jumps longer than this (canvas units) are discarded.
    pub teleport_threshold: f32,
    /// Fraction of the way the smoothed palm moves toward each new sample.
    pub smoothing:          f32,
    /// Consecutive frames without an accepted sample before a tracking slot
    /// starts over.  `0` never resets.
    pub reacquire_after:    u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            teleport_threshold: 100.0,
            smoothing:          0.05,
            reacquire_after:    30,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Per-slot state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotPhase {
    #[default]
    Uninitialized,
    Tracking,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandTrackState {
    pub phase:               SlotPhase,
    pub previous_palm:       Vec2,
    pub previous_fingertips: Vec<Vec2>,
    /// Last pinch state seen per fingertip slot.
    pub pinch:               Vec<PinchState>,
    /// Frames in a row without an accepted palm sample.
    pub misses:              u32,
}

impl HandTrackState {
    fn new(fingertips: usize) -> Self {
        HandTrackState {
            phase:               SlotPhase::Uninitialized,
            previous_palm:       Vec2::ZERO,
            previous_fingertips: vec![Vec2::ZERO; fingertips],
            pinch:               vec![PinchState::Idle; fingertips],
            misses:              0,
        }
    }

    pub fn is_tracking(&self) -> bool { self.phase == SlotPhase::Tracking }
}

// ════════════════════════════════════════════════════════════════════════════
// Outputs
// ════════════════════════════════════════════════════════════════════════════

/// Most recent smoothed hand movement.
///
/// One value for the whole tracker: when several hands move in the same
/// frame, the highest slot written wins.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementVector {
    /// Smoothed palm displacement over the last accepted frame.
    pub delta:  Vec2,
    /// Smoothed palm position after that frame.
    pub smooth: Vec2,
}

/// A fingertip just started a pinch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinchStart {
    pub hand:     usize,
    pub finger:   usize,
    /// Mirrored canvas position of the fingertip.
    pub position: Vec2,
}

/// What one palm sample did to its slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PalmUpdate {
    /// First sample: slot seeded, no movement.
    ColdStart,
    /// Accepted: the published delta.
    Moved(Vec2),
    /// Rejected as a glitch, slot untouched.
    Teleport { distance: f32 },
}

// ════════════════════════════════════════════════════════════════════════════
// GestureTracker
// ════════════════════════════════════════════════════════════════════════════

pub struct GestureTracker {
    slots:    Vec<HandTrackState>,
    movement: MovementVector,
    config:   TrackerConfig,
}

impl GestureTracker {
    pub fn new(max_hands: usize, fingertips: usize, config: TrackerConfig) -> Self {
        GestureTracker {
            slots:    (0..max_hands).map(|_| HandTrackState::new(fingertips)).collect(),
            movement: MovementVector::default(),
            config,
        }
    }

    /// Run one detector frame through validation, palm tracking and pinch
    /// derivation.  Returns the pinch starts it produced.
    pub fn process(
        &mut self,
        frame:     &LandmarkFrame,
        validator: &LandmarkValidator,
        gate:      &ConfidenceGate,
    ) -> Vec<PinchStart> {
        for slot in 0..self.slots.len() {
            let tracking = self.slots[slot].is_tracking();
            let sample = gate.check(frame.score(slot), tracking)
                .and_then(|()| validator.validate(frame.hand(slot), slot));

            match sample {
                Ok(s) => {
                    if let Some(PalmUpdate::Teleport { distance }) = self.observe_palm(slot, s.palm) {
                        log::trace!("hand {}: discarded {:.0}-unit jump", slot, distance);
                    }
                }
                Err(why) => {
                    if frame.hand(slot).is_some() {
                        log::trace!("hand {}: rejected ({})", slot, why);
                    }
                    self.record_miss(slot);
                }
            }
        }
        if frame.hands.len() > self.slots.len() {
            log::trace!(
                "{} hands reported, tracking the first {}",
                frame.hands.len(), self.slots.len()
            );
        }

        self.pinch_events(frame, validator.canvas(), validator.fingertips())
    }

    /// Feed one validated palm position for `slot`.  `None` if the slot does
    /// not exist.
    pub fn observe_palm(&mut self, slot: usize, palm: Vec2) -> Option<PalmUpdate> {
        let cfg = self.config;
        let state = self.slots.get_mut(slot)?;

        if !state.is_tracking() {
            state.phase = SlotPhase::Tracking;
            state.previous_palm = palm;
            state.misses = 0;
            return Some(PalmUpdate::ColdStart);
        }

        let distance = palm.distance(state.previous_palm);
        if distance > cfg.teleport_threshold {
            Self::miss(state, cfg.reacquire_after);
            return Some(PalmUpdate::Teleport { distance });
        }

        let smooth = state.previous_palm.lerp(palm, cfg.smoothing);
        let delta  = smooth - state.previous_palm;
        state.previous_palm = smooth;
        state.misses = 0;
        self.movement = MovementVector { delta, smooth };
        Some(PalmUpdate::Moved(delta))
    }

    /// Note a frame in which `slot` had no accepted sample.
    pub fn record_miss(&mut self, slot: usize) {
        let limit = self.config.reacquire_after;
        if let Some(state) = self.slots.get_mut(slot) {
            Self::miss(state, limit);
        }
    }

    fn miss(state: &mut HandTrackState, limit: u32) {
        if !state.is_tracking() {
            return;
        }
        state.misses += 1;
        if limit > 0 && state.misses >= limit {
            state.phase = SlotPhase::Uninitialized;
            state.misses = 0;
        }
    }

    /// Turn the frame's pinch-state matrix into pinch-start events.
    ///
    /// Every reported fingertip refreshes its stored position; only a
    /// transition into `Start` emits.  A finger the frame says nothing about
    /// (no pinch row, short row, or no usable landmark) drops back to `Idle`,
    /// so a hand that leaves and returns mid-pinch can start again.
    pub fn pinch_events(
        &mut self,
        frame:      &LandmarkFrame,
        canvas:     CanvasMap,
        fingertips: &[usize],
    ) -> Vec<PinchStart> {
        let mut events = Vec::new();

        for (hand, slot) in self.slots.iter_mut().enumerate() {
            let states    = frame.pinch.get(hand).map(Vec::as_slice).unwrap_or(&[]);
            let landmarks = frame.hands.get(hand);
            let fingers   = slot.pinch.len().max(states.len().min(fingertips.len()));
            if slot.pinch.len() < fingers {
                slot.pinch.resize(fingers, PinchState::Idle);
                slot.previous_fingertips.resize(fingers, Vec2::ZERO);
            }

            for finger in 0..fingers {
                let tip = fingertips.get(finger)
                    .and_then(|&index| landmarks.and_then(|h| h.get(index)))
                    .filter(|lm| lm.is_finite());
                let (Some(&state), Some(&lm)) = (states.get(finger), tip) else {
                    slot.pinch[finger] = PinchState::Idle;
                    continue;
                };
                let position = canvas.to_canvas(lm);

                if state == PinchState::Start && slot.pinch[finger] != PinchState::Start {
                    events.push(PinchStart { hand, finger, position });
                }
                slot.pinch[finger] = state;
                slot.previous_fingertips[finger] = position;
            }
        }
        events
    }

    /// Back to a cold tracker: every slot uninitialised at the origin.
    pub fn reset(&mut self) {
        for s in &mut self.slots {
            *s = HandTrackState::new(s.pinch.len());
        }
        self.movement = MovementVector::default();
    }

    pub fn movement(&self)           -> MovementVector            { self.movement }
    pub fn slot(&self, i: usize)     -> Option<&HandTrackState>   { self.slots.get(i) }
    pub fn slots(&self)              -> &[HandTrackState]         { &self.slots }
    pub fn config(&self)             -> &TrackerConfig            { &self.config }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{Landmark, HAND_LANDMARKS, INDEX_MCP, INDEX_TIP, PINKY_MCP, WRIST};

    const W: f32 = 800.0;
    const H: f32 = 600.0;

    fn tracker() -> GestureTracker {
        GestureTracker::new(2, 4, TrackerConfig::default())
    }

    fn validator() -> LandmarkValidator {
        LandmarkValidator::new(CanvasMap::new(W, H), 2)
    }

    /// Plausible hand whose wrist maps to canvas point `palm`.
    fn hand_at(palm: Vec2) -> Vec<Landmark> {
        let m = CanvasMap::new(W, H);
        let wrist = m.to_normalized(palm);
        let mut h = vec![Landmark::new(wrist.x, wrist.y - 0.1); HAND_LANDMARKS];
        h[WRIST]     = wrist;
        h[INDEX_MCP] = Landmark::new(wrist.x + 0.05, wrist.y - 0.05);
        h[PINKY_MCP] = Landmark::new(wrist.x - 0.05, wrist.y - 0.05);
        h
    }

    fn frame(hands: Vec<Vec<Landmark>>) -> LandmarkFrame {
        LandmarkFrame { hands, ..LandmarkFrame::default() }
    }

    #[test]
    fn first_sample_cold_starts() {
        let mut t = tracker();
        assert_eq!(t.observe_palm(0, Vec2::new(300.0, 200.0)), Some(PalmUpdate::ColdStart));
        assert!(t.slot(0).unwrap().is_tracking());
        assert_eq!(t.slot(0).unwrap().previous_palm, Vec2::new(300.0, 200.0));
        assert_eq!(t.movement(), MovementVector::default());
    }

    #[test]
    fn teleport_is_discarded() {
        let mut t = tracker();
        t.observe_palm(0, Vec2::ZERO);
        let before = t.slot(0).unwrap().previous_palm;
        let u = t.observe_palm(0, Vec2::new(500.0, 500.0));
        assert!(matches!(u, Some(PalmUpdate::Teleport { .. })));
        assert_eq!(t.slot(0).unwrap().previous_palm, before);
        assert!(t.slot(0).unwrap().is_tracking());
        assert_eq!(t.movement(), MovementVector::default());
    }

    #[test]
    fn movement_is_smoothed() {
        let mut t = tracker();
        t.observe_palm(0, Vec2::new(100.0, 100.0));
        let u = t.observe_palm(0, Vec2::new(140.0, 60.0));
        // 5 % of (40, -40)
        let expected = Vec2::new(2.0, -2.0);
        match u {
            Some(PalmUpdate::Moved(d)) => assert!((d - expected).length() < 1e-4),
            other => panic!("expected movement, got {:?}", other),
        }
        let m = t.movement();
        assert!((m.smooth - Vec2::new(102.0, 98.0)).length() < 1e-4);
        assert!((t.slot(0).unwrap().previous_palm - m.smooth).length() < 1e-6);
    }

    #[test]
    fn exact_threshold_is_accepted() {
        let mut t = tracker();
        t.observe_palm(0, Vec2::ZERO);
        assert!(matches!(t.observe_palm(0, Vec2::new(100.0, 0.0)), Some(PalmUpdate::Moved(_))));
    }

    #[test]
    fn last_writer_wins() {
        let mut t = tracker();
        t.observe_palm(0, Vec2::ZERO);
        t.observe_palm(1, Vec2::new(400.0, 400.0));
        t.observe_palm(0, Vec2::new(20.0, 0.0));
        t.observe_palm(1, Vec2::new(400.0, 420.0));
        assert!((t.movement().delta - Vec2::new(0.0, 1.0)).length() < 1e-4);
    }

    #[test]
    fn unknown_slot_is_ignored() {
        let mut t = tracker();
        assert_eq!(t.observe_palm(5, Vec2::ZERO), None);
    }

    #[test]
    fn slot_reacquires_after_misses() {
        let mut t = GestureTracker::new(1, 4, TrackerConfig { reacquire_after: 3, ..TrackerConfig::default() });
        t.observe_palm(0, Vec2::ZERO);
        t.observe_palm(0, Vec2::new(500.0, 500.0));
        t.record_miss(0);
        assert!(t.slot(0).unwrap().is_tracking());
        t.record_miss(0);
        assert!(!t.slot(0).unwrap().is_tracking());
        assert_eq!(t.observe_palm(0, Vec2::new(500.0, 500.0)), Some(PalmUpdate::ColdStart));
    }

    #[test]
    fn process_tracks_valid_hands() {
        let mut t = tracker();
        let v = validator();
        let g = ConfidenceGate::default();
        t.process(&frame(vec![hand_at(Vec2::new(400.0, 300.0))]), &v, &g);
        assert!(t.slot(0).unwrap().is_tracking());
        assert!(!t.slot(1).unwrap().is_tracking());

        t.process(&frame(vec![hand_at(Vec2::new(420.0, 300.0))]), &v, &g);
        assert!(t.movement().delta.x > 0.9 && t.movement().delta.x < 1.1);
    }

    #[test]
    fn process_skips_invalid_hands() {
        let mut t = tracker();
        let mut h = hand_at(Vec2::new(400.0, 300.0));
        h.truncate(10);
        t.process(&frame(vec![h]), &validator(), &ConfidenceGate::default());
        assert!(!t.slot(0).unwrap().is_tracking());
    }

    #[test]
    fn process_applies_confidence_gate() {
        let mut t = tracker();
        let mut f = frame(vec![hand_at(Vec2::new(400.0, 300.0))]);
        f.scores = vec![0.1];
        t.process(&f, &validator(), &ConfidenceGate::default());
        assert!(!t.slot(0).unwrap().is_tracking());
    }

    #[test]
    fn pinch_start_emitted_once() {
        let mut t = tracker();
        let mut h = hand_at(Vec2::new(400.0, 300.0));
        h[INDEX_TIP] = Landmark::new(0.875, 0.5);
        let mut f = frame(vec![h]);
        f.pinch = vec![vec![PinchState::Start, PinchState::Idle, PinchState::Idle, PinchState::Idle]];

        let ev = t.process(&f, &validator(), &ConfidenceGate::default());
        assert_eq!(ev, vec![PinchStart { hand: 0, finger: 0, position: Vec2::new(100.0, 300.0) }]);

        // Same state again is not a new transition.
        assert!(t.process(&f, &validator(), &ConfidenceGate::default()).is_empty());

        f.pinch[0][0] = PinchState::Holding;
        assert!(t.process(&f, &validator(), &ConfidenceGate::default()).is_empty());
        f.pinch[0][0] = PinchState::End;
        assert!(t.process(&f, &validator(), &ConfidenceGate::default()).is_empty());
        f.pinch[0][0] = PinchState::Start;
        assert_eq!(t.process(&f, &validator(), &ConfidenceGate::default()).len(), 1);
    }

    #[test]
    fn pinch_updates_previous_pointer() {
        let mut t = tracker();
        let mut h = hand_at(Vec2::new(400.0, 300.0));
        h[12] = Landmark::new(0.5, 0.25);
        let f = LandmarkFrame {
            hands: vec![h],
            scores: vec![],
            pinch: vec![vec![PinchState::Idle, PinchState::Holding]],
        };
        let ev = t.pinch_events(&f, CanvasMap::new(W, H), &crate::landmark::FINGERTIPS);
        assert!(ev.is_empty());
        assert_eq!(t.slot(0).unwrap().previous_fingertips[1], Vec2::new(400.0, 150.0));
        assert_eq!(t.slot(0).unwrap().pinch[1], PinchState::Holding);
    }

    #[test]
    fn pinch_after_hand_returns_emits_again() {
        let mut t = tracker();
        let v = validator();
        let g = ConfidenceGate::default();
        let mut h = hand_at(Vec2::new(400.0, 300.0));
        h[INDEX_TIP] = Landmark::new(0.875, 0.5);
        let mut f = frame(vec![h]);
        f.pinch = vec![vec![PinchState::Start, PinchState::Idle, PinchState::Idle, PinchState::Idle]];

        assert_eq!(t.process(&f, &v, &g).len(), 1);
        assert!(t.process(&LandmarkFrame::default(), &v, &g).is_empty());
        assert_eq!(t.slot(0).unwrap().pinch[0], PinchState::Idle);
        assert_eq!(t.process(&f, &v, &g).len(), 1);
    }

    #[test]
    fn short_pinch_row_releases_missing_fingers() {
        let mut t = tracker();
        let mut h = hand_at(Vec2::new(400.0, 300.0));
        h[12] = Landmark::new(0.5, 0.25);
        let mut f = LandmarkFrame {
            hands: vec![h],
            scores: vec![],
            pinch: vec![vec![PinchState::Idle, PinchState::Start]],
        };
        let tips = &crate::landmark::FINGERTIPS;
        assert_eq!(t.pinch_events(&f, CanvasMap::new(W, H), tips).len(), 1);

        f.pinch[0].truncate(1);
        assert!(t.pinch_events(&f, CanvasMap::new(W, H), tips).is_empty());
        assert_eq!(t.slot(0).unwrap().pinch[1], PinchState::Idle);

        f.pinch[0].push(PinchState::Start);
        assert_eq!(t.pinch_events(&f, CanvasMap::new(W, H), tips).len(), 1);
    }

    #[test]
    fn pinch_without_landmarks_is_skipped() {
        let mut t = tracker();
        let f = LandmarkFrame {
            hands: vec![],
            scores: vec![],
            pinch: vec![vec![PinchState::Start]],
        };
        assert!(t.pinch_events(&f, CanvasMap::new(W, H), &crate::landmark::FINGERTIPS).is_empty());
    }

    #[test]
    fn pinch_beyond_max_hands_is_skipped() {
        let mut t = tracker();
        let h = hand_at(Vec2::new(400.0, 300.0));
        let f = LandmarkFrame {
            hands: vec![h.clone(), h.clone(), h],
            scores: vec![],
            pinch: vec![vec![], vec![], vec![PinchState::Start]],
        };
        assert!(t.pinch_events(&f, CanvasMap::new(W, H), &crate::landmark::FINGERTIPS).is_empty());
    }

    #[test]
    fn reset_returns_to_origin() {
        let mut t = tracker();
        t.observe_palm(0, Vec2::new(10.0, 10.0));
        t.observe_palm(0, Vec2::new(30.0, 10.0));
        t.reset();
        assert_eq!(t.movement(), MovementVector::default());
        for s in t.slots() {
            assert_eq!(s.phase, SlotPhase::Uninitialized);
            assert_eq!(s.previous_palm, Vec2::ZERO);
            assert_eq!(s.pinch.len(), 4);
        }
    }
}
