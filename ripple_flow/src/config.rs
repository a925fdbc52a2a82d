//! Application configuration, optionally loaded from a TOML file.
//!
//! Every key is optional; anything missing keeps its default.  Unknown keys
//! are an error so typos do not silently fall back.
//!
//! ```toml
//! [canvas]
//! width = 1024
//! height = 768
//!
//! [particles]
//! count = 400
//! seed = 7
//!
//! [audio]
//! instrument = "vibraphone"
//! volume = 0.5
//!
//! [theme]
//! colors = ["#0799F2", "white", "rgb(0, 88, 161)"]
//! background = "#150832"
//! ```

use anyhow::Context;
use css_color_parser::Color as CssColor;
use serde::Deserialize;

use flow_field::{Bounds, ParticleConfig};
use hand_gesture::{CanvasMap, ConfidenceGate, LandmarkValidator, TrackerConfig, FINGERTIPS, HAND_LANDMARKS};
use tone_map::{GeneralMidi, NoteTable, C_MAJOR_OCTAVE, TONE_DURATION_MS};

use crate::ripple::{RippleStyle, DEFAULT_STYLES, RIPPLE_DRIFT, RIPPLE_LIFETIME};

// ════════════════════════════════════════════════════════════════════════════
// Sections
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasSettings {
    pub width:  usize,
    pub height: usize,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        CanvasSettings { width: 800, height: 600 }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParticleSettings {
    pub count:      usize,
    pub max_speed:  [f32; 2],
    pub radius:     [f32; 2],
    pub flow_scale: [f32; 2],
    pub margin:     f32,
    pub seed:       Option<u64>,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        ParticleSettings {
            count:      200,
            max_speed:  [2.0, 4.0],
            radius:     [0.25, 1.0],
            flow_scale: [800.0, 2000.0],
            margin:     50.0,
            seed:       None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandSettings {
    pub max_hands:            usize,
    pub fingertips:           Vec<usize>,
    pub detection_confidence: f32,
    pub tracking_confidence:  f32,
    pub teleport_threshold:   f32,
    pub palm_smoothing:       f32,
    pub palm_ratio:           [f32; 2],
    pub reacquire_after:      u32,
}

impl Default for HandSettings {
    fn default() -> Self {
        let tracker = TrackerConfig::default();
        let gate = ConfidenceGate::default();
        HandSettings {
            max_hands:            2,
            fingertips:           FINGERTIPS.to_vec(),
            detection_confidence: gate.detection,
            tracking_confidence:  gate.tracking,
            teleport_threshold:   tracker.teleport_threshold,
            palm_smoothing:       tracker.smoothing,
            palm_ratio:           [0.5, 2.0],
            reacquire_after:      tracker.reacquire_after,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioSettings {
    /// Tone volume, `0.0..=1.0`.
    pub volume:     f32,
    pub notes:      Vec<f32>,
    pub tone_ms:    u64,
    pub instrument: GeneralMidi,
    /// Analyse what the machine is playing instead of the microphone.
    pub loopback:   bool,
    /// Set to `false` to run without audio-reactive particles.
    pub analysis:   bool,
    pub fft_size:   usize,
    pub smoothing:  f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings {
            volume:     0.3,
            notes:      C_MAJOR_OCTAVE.to_vec(),
            tone_ms:    TONE_DURATION_MS,
            instrument: GeneralMidi::Celesta,
            loopback:   false,
            analysis:   true,
            fft_size:   1024,
            smoothing:  0.9,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RippleSettings {
    pub lifetime: u32,
    pub drift:    f32,
    pub styles:   Vec<RippleStyle>,
}

impl Default for RippleSettings {
    fn default() -> Self {
        RippleSettings {
            lifetime: RIPPLE_LIFETIME,
            drift:    RIPPLE_DRIFT,
            styles:   DEFAULT_STYLES.to_vec(),
        }
    }
}

/// Resolved theme, packed `0xFFRRGGBB`.
#[derive(Clone, Debug, PartialEq)]
pub struct Theme {
    pub colors:     Vec<u32>,
    pub background: u32,
}

const DEFAULT_COLORS: [&str; 6] = ["#0799F2", "#FFFFFF", "#0058a1", "#004B97", "#84C1FF", "#c5afd4"];
const DEFAULT_BACKGROUND: &str = "#150832";

impl Default for Theme {
    fn default() -> Self {
        Theme {
            colors:     vec![0xFF07_99F2, 0xFFFF_FFFF, 0xFF00_58A1, 0xFF00_4B97, 0xFF84_C1FF, 0xFFC5_AFD4],
            background: 0xFF15_0832,
        }
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ThemeToml {
    colors:     Vec<String>,
    background: String,
}

impl Default for ThemeToml {
    fn default() -> Self {
        ThemeToml {
            colors:     DEFAULT_COLORS.iter().map(|s| s.to_string()).collect(),
            background: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct TomlData {
    canvas:    CanvasSettings,
    particles: ParticleSettings,
    hands:     HandSettings,
    audio:     AudioSettings,
    ripple:    RippleSettings,
    theme:     ThemeToml,
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppConfig {
    pub canvas:    CanvasSettings,
    pub particles: ParticleSettings,
    pub hands:     HandSettings,
    pub audio:     AudioSettings,
    pub ripple:    RippleSettings,
    pub theme:     Theme,
}

pub fn parse_file(filepath: &str) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(filepath)
        .with_context(|| format!("cannot read config file `{}`", filepath))?;
    parse_str(&text).with_context(|| format!("in config file `{}`", filepath))
}

pub fn parse_str(text: &str) -> anyhow::Result<AppConfig> {
    let data: TomlData = toml::from_str(text)?;

    let colors = data.theme.colors.iter()
        .map(|c| css_to_argb(c))
        .collect::<anyhow::Result<Vec<u32>>>()?;
    let background = css_to_argb(&data.theme.background)?;

    let config = AppConfig {
        canvas:    data.canvas,
        particles: data.particles,
        hands:     data.hands,
        audio:     data.audio,
        ripple:    data.ripple,
        theme:     Theme { colors, background },
    };
    config.validate()?;
    Ok(config)
}

fn css_to_argb(css: &str) -> anyhow::Result<u32> {
    let c = css.parse::<CssColor>()
        .map_err(|_| anyhow::anyhow!("`{}` is not a CSS colour", css))?;
    Ok(0xFF00_0000 | (u32::from(c.r) << 16) | (u32::from(c.g) << 8) | u32::from(c.b))
}

fn check_range(name: &str, [lo, hi]: [f32; 2]) -> anyhow::Result<()> {
    if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
        anyhow::bail!("`{}` must be a positive [min, max] pair, was given: [{}, {}]", name, lo, hi);
    }
    Ok(())
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            anyhow::bail!(
                "canvas must be at least 1×1, was given: {}×{}",
                self.canvas.width, self.canvas.height
            );
        }

        let p = &self.particles;
        if p.count > 1_000_000 {
            anyhow::bail!("`particles.count` is capped at 1000000, was given: {}", p.count);
        }
        check_range("particles.max_speed", p.max_speed)?;
        check_range("particles.radius", p.radius)?;
        check_range("particles.flow_scale", p.flow_scale)?;
        if !(p.margin >= 0.0) {
            anyhow::bail!("`particles.margin` must not be negative, was given: {}", p.margin);
        }

        let h = &self.hands;
        if h.max_hands == 0 {
            anyhow::bail!("`hands.max_hands` must be at least 1");
        }
        if let Some(&bad) = h.fingertips.iter().find(|&&i| i >= HAND_LANDMARKS) {
            anyhow::bail!("`hands.fingertips` index {} is not a hand landmark (0–20)", bad);
        }
        for (name, v) in [
            ("hands.detection_confidence", h.detection_confidence),
            ("hands.tracking_confidence", h.tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                anyhow::bail!("`{}` must be within 0–1, was given: {}", name, v);
            }
        }
        if !(h.teleport_threshold > 0.0) {
            anyhow::bail!("`hands.teleport_threshold` must be positive, was given: {}", h.teleport_threshold);
        }
        if !(h.palm_smoothing > 0.0 && h.palm_smoothing <= 1.0) {
            anyhow::bail!("`hands.palm_smoothing` must be within (0, 1], was given: {}", h.palm_smoothing);
        }
        check_range("hands.palm_ratio", h.palm_ratio)?;

        let a = &self.audio;
        if !(0.0..=1.0).contains(&a.volume) {
            anyhow::bail!("`audio.volume` must be within 0–1, was given: {}", a.volume);
        }
        if NoteTable::new(a.notes.clone()).is_none() {
            anyhow::bail!("`audio.notes` must list at least one positive frequency");
        }
        if a.tone_ms == 0 {
            anyhow::bail!("`audio.tone_ms` must be positive");
        }
        if !a.fft_size.is_power_of_two() || a.fft_size < 64 {
            anyhow::bail!("`audio.fft_size` must be a power of two ≥ 64, was given: {}", a.fft_size);
        }
        if !(0.0..1.0).contains(&a.smoothing) {
            anyhow::bail!("`audio.smoothing` must be within [0, 1), was given: {}", a.smoothing);
        }

        let r = &self.ripple;
        if r.lifetime == 0 {
            anyhow::bail!("`ripple.lifetime` must be positive");
        }
        if r.styles.is_empty() {
            anyhow::bail!("`ripple.styles` needs at least one ring");
        }

        if self.theme.colors.is_empty() {
            anyhow::bail!("`theme.colors` needs at least one colour");
        }
        Ok(())
    }

    // ── Component settings ───────────────────────────────────────────────

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.canvas.width as f32, self.canvas.height as f32, self.particles.margin)
    }

    pub fn canvas_map(&self) -> CanvasMap {
        CanvasMap::new(self.canvas.width as f32, self.canvas.height as f32)
    }

    pub fn particle_config(&self) -> ParticleConfig {
        let p = &self.particles;
        ParticleConfig {
            count:      p.count,
            max_speed:  (p.max_speed[0], p.max_speed[1]),
            radius:     (p.radius[0], p.radius[1]),
            flow_scale: (p.flow_scale[0], p.flow_scale[1]),
            palette:    self.theme.colors.clone(),
        }
    }

    pub fn validator(&self) -> LandmarkValidator {
        let h = &self.hands;
        LandmarkValidator::new(self.canvas_map(), h.max_hands)
            .with_fingertips(h.fingertips.clone())
            .with_palm_ratio(h.palm_ratio[0], h.palm_ratio[1])
    }

    pub fn gate(&self) -> ConfidenceGate {
        ConfidenceGate {
            detection: self.hands.detection_confidence,
            tracking:  self.hands.tracking_confidence,
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            teleport_threshold: self.hands.teleport_threshold,
            smoothing:          self.hands.palm_smoothing,
            reacquire_after:    self.hands.reacquire_after,
        }
    }

    pub fn note_table(&self) -> NoteTable {
        NoteTable::new(self.audio.notes.clone()).unwrap_or_default()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
