//! Top-level application state machine.
//!
//! `AppState` owns the particle field, the gesture pipeline, the ripples and
//! the note table.  It is clocked once per window frame by [`run`], which
//! also owns the collaborators: window, landmark source, tone player and
//! audio analyser.

use std::sync::mpsc::{self, TryRecvError};
use std::time::Duration;

use flow_field::{DrawSurface, ParticleField};
use hand_gesture::{ConfidenceGate, GestureTracker, LandmarkFrame, LandmarkValidator, PinchStart};
use tone_map::{GeneralMidi, NoteTable};

use crate::analyzer::{spawn_analyzer, AnalyzerEvent, AnalyzerSettings, AudioLevels};
use crate::canvas::Canvas;
use crate::config::AppConfig;
use crate::landmarks::{
    spawn_landmark_source, SimHand, SimInput, SimLandmarkSource, StdinLandmarkSource,
};
use crate::player::{open_midi_output, ToneSink, TonePlayer, ToneVoice};
use crate::ripple::RippleManager;
use crate::visualizer::{Hud, UiCommand, Visualizer};

/// Volume change per key press.
pub const VOLUME_STEP: f32 = 0.1;

// ════════════════════════════════════════════════════════════════════════════
// Playback state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState { Stopped, Playing }

/// Where landmark frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkInput {
    /// A hand that follows the mouse; left button pinches.
    Simulated,
    /// JSON lines on stdin.
    Stdin,
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    // ── scene ────────────────────────────────────────────────────────────
    field:   ParticleField,
    ripples: RippleManager,

    // ── gestures ─────────────────────────────────────────────────────────
    validator: LandmarkValidator,
    gate:      ConfidenceGate,
    tracker:   GestureTracker,
    /// Pinch starts seen since the last tick; they spawn after the ripples age.
    pending:   Vec<PinchStart>,

    // ── tones ────────────────────────────────────────────────────────────
    notes:      NoteTable,
    volume:     f32,
    instrument: GeneralMidi,

    play_state:   PlayState,
    background:   u32,
    /// Trail layer must be wiped before the next draw.
    clear_trails: bool,
    height:       f32,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> Self {
        let validator = cfg.validator();
        let tracker = GestureTracker::new(
            cfg.hands.max_hands,
            validator.fingertips().len(),
            cfg.tracker_config(),
        );
        AppState {
            field: ParticleField::new(cfg.particle_config(), cfg.bounds(), cfg.particles.seed),
            ripples: RippleManager::new(
                cfg.ripple.lifetime,
                cfg.ripple.drift,
                cfg.ripple.styles.clone(),
            ),
            validator,
            gate: cfg.gate(),
            tracker,
            pending: Vec::new(),
            notes: cfg.note_table(),
            volume: cfg.audio.volume.clamp(0.0, 1.0),
            instrument: cfg.audio.instrument,
            play_state: PlayState::Playing,
            background: cfg.theme.background,
            clear_trails: false,
            height: cfg.canvas.height as f32,
        }
    }

    // ── per-frame ────────────────────────────────────────────────────────

    /// Gesture pass for one landmark frame.  Pinch starts are queued and
    /// become ripples and tones on the next [`tick`](Self::tick).  Returns
    /// how many were queued.
    pub fn ingest(&mut self, frame: &LandmarkFrame) -> usize {
        if self.play_state == PlayState::Stopped {
            return 0;
        }
        let starts = self.tracker.process(frame, &self.validator, &self.gate);
        let n = starts.len();
        self.pending.extend(starts);
        n
    }

    /// One simulation step.  `frame` is the newest landmark frame, if any
    /// arrived since the last tick.
    ///
    /// Order: flow field, gestures, ripple age/prune/drift with this frame's
    /// movement, then spawns at age 0.
    pub fn tick(
        &mut self,
        frame:  Option<&LandmarkFrame>,
        levels: AudioLevels,
        tones:  &mut impl ToneSink,
    ) {
        if self.play_state == PlayState::Stopped {
            return;
        }
        self.field.update(levels.energy, levels.bass);
        if let Some(f) = frame {
            self.ingest(f);
        }
        self.ripples.tick(self.tracker.movement());

        for pinch in self.pending.drain(..) {
            self.ripples.spawn(&pinch);
            let hz = self.notes.frequency_for(pinch.position.y, self.height);
            log::debug!(
                "pinch hand {} finger {} at ({:.0}, {:.0}) → {:.2} Hz",
                pinch.hand, pinch.finger, pinch.position.x, pinch.position.y, hz
            );
            tones.play_tone(hz);
        }
    }

    /// Particles accumulate on `trails`; `overlay` becomes trails + ripples.
    pub fn draw(&mut self, trails: &mut Canvas, overlay: &mut Canvas) {
        if self.clear_trails {
            trails.clear(self.background);
            self.clear_trails = false;
        }
        if self.play_state == PlayState::Playing {
            self.field.draw(trails);
        }
        overlay.copy_from(trails);
        self.ripples.draw(overlay);
    }

    // ── UI adapter ───────────────────────────────────────────────────────

    pub fn start(&mut self)  { self.play_state = PlayState::Playing; }
    pub fn stop(&mut self)   { self.play_state = PlayState::Stopped; }

    pub fn toggle(&mut self) {
        self.play_state = match self.play_state {
            PlayState::Playing => PlayState::Stopped,
            PlayState::Stopped => PlayState::Playing,
        };
    }

    /// New particles and flow scale, no ripples, cold hand tracking, blank trails.
    pub fn reset(&mut self) {
        self.field.reset();
        self.ripples.clear();
        self.tracker.reset();
        self.pending.clear();
        self.clear_trails = true;
    }

    /// Returns the volume actually set.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
        self.volume
    }

    pub fn nudge_volume(&mut self, step: f32) -> f32 {
        self.set_volume(self.volume + step)
    }

    /// Step to the next General MIDI instrument and return it.
    pub fn next_instrument(&mut self) -> GeneralMidi {
        self.instrument = self.instrument.next();
        self.instrument
    }

    pub fn hud(&self, audio_ready: bool) -> Hud {
        Hud {
            playing: self.is_playing(),
            volume:  self.volume,
            audio_ready,
            palms: self.tracker.slots().iter()
                .filter(|s| s.is_tracking())
                .map(|s| s.previous_palm)
                .collect(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn play_state(&self) -> PlayState        { self.play_state }
    pub fn is_playing(&self) -> bool             { self.play_state == PlayState::Playing }
    pub fn volume(&self)     -> f32              { self.volume }
    pub fn instrument(&self) -> GeneralMidi      { self.instrument }
    pub fn field(&self)      -> &ParticleField   { &self.field }
    pub fn ripples(&self)    -> &RippleManager   { &self.ripples }
    pub fn tracker(&self)    -> &GestureTracker  { &self.tracker }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application until the window closes or Q is pressed.
pub fn run(cfg: AppConfig, input: LandmarkInput) -> Result<(), String> {
    let (width, height) = (cfg.canvas.width, cfg.canvas.height);

    // ── Landmark source ───────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let frame_rx = match input {
        LandmarkInput::Simulated => spawn_landmark_source(SimLandmarkSource {
            rx:   sim_rx,
            hand: SimHand::new(cfg.canvas_map()),
        }),
        LandmarkInput::Stdin => {
            drop(sim_rx);
            spawn_landmark_source(StdinLandmarkSource::stdin())
        }
    };

    // ── Window ────────────────────────────────────────────────────────────
    let mut vis = Visualizer::new(width, height, sim_tx)?;

    // ── Audio ─────────────────────────────────────────────────────────────
    let analyzer_rx = cfg.audio.analysis.then(|| spawn_analyzer(AnalyzerSettings {
        fft_size:  cfg.audio.fft_size,
        smoothing: cfg.audio.smoothing,
        loopback:  cfg.audio.loopback,
    }));
    let mut player = TonePlayer::spawn(ToneVoice::new(
        Box::new(open_midi_output),
        cfg.audio.volume,
        cfg.audio.instrument,
        Duration::from_millis(cfg.audio.tone_ms),
    ));

    let mut app = AppState::new(&cfg);
    let mut trails = Canvas::new(width, height, cfg.theme.background);
    let mut overlay = trails.clone();
    let mut levels = AudioLevels::default();
    let mut audio_ready = false;

    log::info!(
        "{} particles on {}×{}, instrument {}",
        app.field().len(), width, height, cfg.audio.instrument.name()
    );

    // ── Main loop ─────────────────────────────────────────────────────────
    'main: while vis.is_open() {
        // 1. Keyboard / mouse
        for cmd in vis.poll_input() {
            match cmd {
                UiCommand::Quit       => break 'main,
                UiCommand::Toggle     => {
                    app.toggle();
                    log::info!("{}", if app.is_playing() { "playing" } else { "stopped" });
                }
                UiCommand::Reset      => {
                    app.reset();
                    log::info!("reset");
                }
                UiCommand::VolumeUp   => player.set_volume(app.nudge_volume(VOLUME_STEP)),
                UiCommand::VolumeDown => player.set_volume(app.nudge_volume(-VOLUME_STEP)),
                UiCommand::NextInstrument => {
                    let instrument = app.next_instrument();
                    player.set_instrument(instrument);
                    log::info!("instrument {}", instrument.name());
                }
            }
        }

        // 2. Audio levels
        if let Some(rx) = &analyzer_rx {
            loop {
                match rx.try_recv() {
                    Ok(AnalyzerEvent::Ready { device, sample_rate }) => {
                        log::info!("analysing {} ({} Hz)", device, sample_rate);
                        audio_ready = true;
                    }
                    Ok(AnalyzerEvent::Levels(l)) => levels = l,
                    Ok(AnalyzerEvent::Lost(_)) | Err(TryRecvError::Disconnected) => {
                        audio_ready = false;
                        levels = AudioLevels::default();
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }
        }

        // 3. Landmark frames: every pinch counts, the newest frame drives the tick
        let frames: Vec<LandmarkFrame> = frame_rx.try_iter().collect();
        let newest = match frames.split_last() {
            Some((last, older)) => {
                for f in older {
                    app.ingest(f);
                }
                Some(last)
            }
            None => None,
        };

        // 4. Simulation step
        let live = if audio_ready { levels } else { AudioLevels::default() };
        app.tick(newest, live, &mut player);

        // 5. Render
        app.draw(&mut trails, &mut overlay);
        vis.render(&mut overlay, &app.hud(audio_ready))?;
    }

    player.quit();
    vis.close();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use flow_field::Vec2;
    use hand_gesture::PinchState;

    #[derive(Default)]
    struct Tones(Vec<f32>);

    impl ToneSink for Tones {
        fn play_tone(&mut self, frequency_hz: f32) {
            self.0.push(frequency_hz);
        }
    }

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.particles.seed = Some(42);
        cfg
    }

    fn make_app() -> AppState {
        AppState::new(&config())
    }

    fn hand() -> SimHand {
        SimHand::new(config().canvas_map())
    }

    #[test]
    fn starts_playing_with_full_field() {
        let app = make_app();
        assert!(app.is_playing());
        assert_eq!(app.field().len(), 200);
        assert!(app.ripples().is_empty());
    }

    #[test]
    fn pinch_spawns_one_ripple_and_one_tone() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let frame = hand().frame(100.0, 300.0, true);

        app.tick(Some(&frame), AudioLevels::default(), &mut tones);

        assert_eq!(app.ripples().len(), 1);
        let r = app.ripples().ripples()[0];
        assert_eq!(r.age, 0);
        assert!((r.position - Vec2::new(100.0, 300.0)).length() < 1e-3);
        assert_eq!(tones.0, vec![392.0]);
    }

    #[test]
    fn held_pinch_does_not_repeat() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let mut h = hand();
        for pressed in [true, true, true, false] {
            let f = h.frame(100.0, 300.0, pressed);
            app.tick(Some(&f), AudioLevels::default(), &mut tones);
        }
        assert_eq!(app.ripples().len(), 1);
        assert_eq!(tones.0.len(), 1);
    }

    #[test]
    fn pitch_follows_height() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let mut h = hand();
        for y in [10.0, 590.0] {
            let f = h.frame(400.0, y, true);
            app.tick(Some(&f), AudioLevels::default(), &mut tones);
            let f = h.frame(400.0, y, false);
            app.tick(Some(&f), AudioLevels::default(), &mut tones);
        }
        assert_eq!(tones.0, vec![261.63, 523.25]);
    }

    #[test]
    fn superseded_frames_still_count() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let mut h = hand();
        let older = h.frame(100.0, 300.0, true);
        let newest = h.frame(100.0, 300.0, true);
        assert_eq!(newest.pinch[0][0], PinchState::Holding);

        assert_eq!(app.ingest(&older), 1);
        assert!(tones.0.is_empty());
        app.tick(Some(&newest), AudioLevels::default(), &mut tones);
        assert_eq!(tones.0.len(), 1);
        assert_eq!(app.ripples().len(), 1);
        assert_eq!(app.ripples().ripples()[0].age, 0);
    }

    #[test]
    fn ripples_drift_with_same_frame_movement() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let mut h = hand();
        let f = h.frame(100.0, 300.0, true);
        app.tick(Some(&f), AudioLevels::default(), &mut tones);

        // palm moves 20 px: smoothed delta 1.0, ripple drift 0.1
        let f = h.frame(120.0, 300.0, true);
        app.tick(Some(&f), AudioLevels::default(), &mut tones);
        let r = app.ripples().ripples()[0];
        assert_eq!(r.age, 1);
        assert!((r.position - Vec2::new(100.1, 300.0)).length() < 1e-3);
    }

    #[test]
    fn pinch_after_hand_leaves_plays_again() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let mut h = hand();
        let pinch = h.frame(100.0, 300.0, true);
        app.tick(Some(&pinch), AudioLevels::default(), &mut tones);
        // detector loses the hand without ever reporting the release
        app.tick(Some(&LandmarkFrame::default()), AudioLevels::default(), &mut tones);
        app.tick(Some(&pinch), AudioLevels::default(), &mut tones);
        assert_eq!(tones.0.len(), 2);
        assert_eq!(app.ripples().len(), 2);
    }

    #[test]
    fn ripples_live_150_ticks() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let f = hand().frame(100.0, 300.0, true);
        app.tick(Some(&f), AudioLevels::default(), &mut tones);
        for _ in 0..149 {
            app.tick(None, AudioLevels::default(), &mut tones);
        }
        assert_eq!(app.ripples().ripples()[0].age, 149);
        app.tick(None, AudioLevels::default(), &mut tones);
        assert!(app.ripples().is_empty());
    }

    #[test]
    fn stopped_tick_is_inert() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let before = app.field().particles().to_vec();
        app.stop();
        let f = hand().frame(100.0, 300.0, true);
        app.tick(Some(&f), AudioLevels { energy: 200.0, bass: 200.0 }, &mut tones);
        assert_eq!(app.field().particles(), before.as_slice());
        assert!(app.ripples().is_empty());
        assert!(tones.0.is_empty());
        assert_eq!(app.ingest(&f), 0);
    }

    #[test]
    fn toggle_flips() {
        let mut app = make_app();
        app.toggle();
        assert_eq!(app.play_state(), PlayState::Stopped);
        app.toggle();
        assert_eq!(app.play_state(), PlayState::Playing);
        app.start();
        assert!(app.is_playing());
    }

    #[test]
    fn reset_clears_scene_and_trails() {
        let mut app = make_app();
        let mut tones = Tones::default();
        let f = hand().frame(100.0, 300.0, true);
        app.tick(Some(&f), AudioLevels::default(), &mut tones);
        assert!(app.tracker().slot(0).unwrap().is_tracking());

        let mut trails = Canvas::new(800, 600, 0);
        trails.fill_rect(0, 0, 10, 10, 0xFFFF_FFFF);
        let mut overlay = trails.clone();

        app.reset();
        assert!(app.ripples().is_empty());
        assert!(!app.tracker().slot(0).unwrap().is_tracking());
        assert_eq!(app.field().len(), 200);

        app.stop();
        app.draw(&mut trails, &mut overlay);
        assert_eq!(trails.pixel(5, 5), Some(0xFF15_0832));
    }

    #[test]
    fn ripples_draw_on_overlay_only() {
        let mut cfg = config();
        cfg.particles.count = 0;
        let mut app = AppState::new(&cfg);
        let mut tones = Tones::default();
        let f = hand().frame(100.0, 300.0, true);
        app.tick(Some(&f), AudioLevels::default(), &mut tones);
        app.tick(None, AudioLevels::default(), &mut tones);

        let bg = cfg.theme.background;
        let mut trails = Canvas::new(800, 600, bg);
        let mut overlay = trails.clone();
        app.draw(&mut trails, &mut overlay);
        assert_eq!(trails.pixel(100, 300), Some(bg));
        assert_ne!(overlay.pixel(100, 300), Some(bg));
    }

    #[test]
    fn volume_is_clamped() {
        let mut app = make_app();
        assert_eq!(app.volume(), 0.3);
        assert_eq!(app.set_volume(2.0), 1.0);
        assert!((app.nudge_volume(-VOLUME_STEP) - 0.9).abs() < 1e-6);
        assert_eq!(app.set_volume(-1.0), 0.0);
        assert_eq!(app.set_volume(f32::NAN), 0.0);
    }

    #[test]
    fn instrument_cycles_from_config() {
        let mut cfg = config();
        cfg.audio.instrument = GeneralMidi::Kalimba;
        let mut app = AppState::new(&cfg);
        assert_eq!(app.instrument(), GeneralMidi::Kalimba);
        assert_eq!(app.next_instrument(), GeneralMidi::SteelDrums);
        assert_eq!(app.instrument(), GeneralMidi::SteelDrums);
    }

    #[test]
    fn hud_reports_tracked_palms() {
        let mut app = make_app();
        let mut tones = Tones::default();
        assert!(app.hud(false).palms.is_empty());
        let f = hand().frame(100.0, 300.0, false);
        app.tick(Some(&f), AudioLevels::default(), &mut tones);
        let hud = app.hud(true);
        assert_eq!(hud.palms.len(), 1);
        assert!((hud.palms[0] - Vec2::new(132.0, 425.0)).length() < 1e-3);
        assert!(hud.playing && hud.audio_ready);
    }
}
