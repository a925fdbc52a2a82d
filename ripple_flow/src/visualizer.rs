//! Software-rendered window using `minifb`.
//!
//! The scene is drawn into a [`Canvas`]; this module only adds the HUD,
//! blits the pixels, and turns keyboard/mouse input into [`UiCommand`]s and
//! [`SimInput`]s.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ ▮▮  (paused)                                  volume ▁▃▅ │
//! │                                                          │
//! │        particles · trails · ripples                      │
//! │                                   ● tracked palm         │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;
use std::time::Duration;

use flow_field::{DrawSurface, Vec2};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::canvas::Canvas;
use crate::landmarks::SimInput;

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

const FRAME_TIME:    Duration = Duration::from_millis(16); // ~60 fps
const MARGIN:        usize = 12;
const VOLUME_W:      usize = 100;
const VOLUME_H:      usize = 6;
const PAUSE_BAR_W:   usize = 6;
const PAUSE_BAR_H:   usize = 20;
const PALM_DOT:      f32   = 8.0;
const HUD_TRACK:     u32   = 0x40FF_FFFF;
const HUD_FILL:      u32   = 0xC0FF_FFFF;
const HUD_PAUSE:     u32   = 0xD0FF_FFFF;
const HUD_PALM:      u32   = 0x9084_C1FF;
const HUD_NO_AUDIO:  u32   = 0xA0FF_6060;

// ════════════════════════════════════════════════════════════════════════════
// UiCommand / Hud
// ════════════════════════════════════════════════════════════════════════════

/// Keyboard actions, produced by [`Visualizer::poll_input`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiCommand {
    /// Space: start / stop.
    Toggle,
    /// R: new flow field, clear trails and ripples.
    Reset,
    /// `=` / keypad `+`.
    VolumeUp,
    /// `-` / keypad `-`.
    VolumeDown,
    /// I: next General MIDI instrument.
    NextInstrument,
    /// Q / Escape.
    Quit,
}

/// What the overlay shows besides the scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hud {
    pub playing:     bool,
    pub volume:      f32,
    pub audio_ready: bool,
    /// Smoothed palm positions of tracked hands.
    pub palms:       Vec<Vec2>,
}

/// Draw the HUD onto `canvas`.
pub fn draw_hud(canvas: &mut Canvas, hud: &Hud) {
    let w = canvas.width();

    // volume bar, top right
    let x = w.saturating_sub(MARGIN + VOLUME_W);
    let fill = (hud.volume.clamp(0.0, 1.0) * VOLUME_W as f32).round() as usize;
    canvas.fill_rect(x, MARGIN, VOLUME_W, VOLUME_H, HUD_TRACK);
    canvas.fill_rect(x, MARGIN, fill, VOLUME_H, HUD_FILL);
    if !hud.audio_ready {
        canvas.fill_rect(x, MARGIN + VOLUME_H + 2, VOLUME_W, 2, HUD_NO_AUDIO);
    }

    if !hud.playing {
        canvas.fill_rect(MARGIN, MARGIN, PAUSE_BAR_W, PAUSE_BAR_H, HUD_PAUSE);
        canvas.fill_rect(MARGIN + 2 * PAUSE_BAR_W, MARGIN, PAUSE_BAR_W, PAUSE_BAR_H, HUD_PAUSE);
    }

    for &p in &hud.palms {
        canvas.fill_circle(p, PALM_DOT, HUD_PALM);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:  Window,
    sim_tx:  Sender<SimInput>,
    /// Pointer was inside the window last poll.
    inside:  bool,
}

impl Visualizer {
    pub fn new(width: usize, height: usize, sim_tx: Sender<SimInput>) -> Result<Self, String> {
        let mut window = Window::new(
            "Ripple Flow — pinch to play",
            width, height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| e.to_string())?;

        window.limit_update_rate(Some(FRAME_TIME));

        Ok(Visualizer { window, sim_tx, inside: false })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll keys into commands and forward the pointer to the simulated hand.
    pub fn poll_input(&mut self) -> Vec<UiCommand> {
        let mut commands = Vec::new();
        if !self.window.is_open() {
            commands.push(UiCommand::Quit);
            return commands;
        }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        if one_shot(Key::Q) || one_shot(Key::Escape) {
            commands.push(UiCommand::Quit);
        }
        if one_shot(Key::Space) {
            commands.push(UiCommand::Toggle);
        }
        if one_shot(Key::R) {
            commands.push(UiCommand::Reset);
        }
        if one_shot(Key::I) {
            commands.push(UiCommand::NextInstrument);
        }
        if held(Key::Equal) || held(Key::NumPadPlus) {
            commands.push(UiCommand::VolumeUp);
        }
        if held(Key::Minus) || held(Key::NumPadMinus) {
            commands.push(UiCommand::VolumeDown);
        }

        match self.window.get_mouse_pos(MouseMode::Discard) {
            Some((x, y)) => {
                self.inside = true;
                let pressed = self.window.get_mouse_down(MouseButton::Left);
                let _ = self.sim_tx.send(SimInput::Pointer { x, y, pressed });
            }
            None if self.inside => {
                self.inside = false;
                let _ = self.sim_tx.send(SimInput::Leave);
            }
            None => {}
        }

        commands
    }

    /// Show `frame` (which receives the HUD first).
    pub fn render(&mut self, frame: &mut Canvas, hud: &Hud) -> Result<(), String> {
        draw_hud(frame, hud);
        self.window
            .update_with_buffer(frame.pixels(), frame.width(), frame.height())
            .map_err(|e| e.to_string())
    }

    /// Tell the simulated hand to stop.
    pub fn close(&self) {
        let _ = self.sim_tx.send(SimInput::Quit);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
