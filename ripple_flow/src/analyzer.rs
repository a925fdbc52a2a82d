//! Audio analysis: turns the live input (microphone, or what the machine is
//! playing) into the `energy` and `bass` levels that drive the particles.
//!
//! A supervisor thread owns the capture stream, which cannot leave the
//! thread that built it.  It runs the [`InitState`] backoff while no device
//! is usable, and once capturing, accumulates samples, runs the FFT and
//! reports [`AnalyzerEvent`]s.  The render loop never waits on any of this.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::retry::InitState;

/// Spectrum byte range maps from this dB window, as browsers' analysers do.
pub const MIN_DECIBELS: f32 = -100.0;
pub const MAX_DECIBELS: f32 = -30.0;

/// Frequency bands, Hz.
pub const BASS_BAND: (f32, f32) = (20.0, 140.0);
pub const MID_BAND:  (f32, f32) = (400.0, 2600.0);

/// Capture silence longer than this counts as a lost device.
const STALL_TIMEOUT: Duration = Duration::from_secs(3);

// ════════════════════════════════════════════════════════════════════════════
// AudioLevels / AnalyzerEvent
// ════════════════════════════════════════════════════════════════════════════

/// Spectrum energy, each in `0.0..=255.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioLevels {
    /// Mid-band energy.
    pub energy: f32,
    pub bass:   f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnalyzerEvent {
    /// Capture started.
    Ready { device: String, sample_rate: u32 },
    Levels(AudioLevels),
    /// Capture stopped; levels should fall back to zero until the next
    /// `Ready`.
    Lost(String),
}

#[derive(Clone, Debug)]
pub struct AnalyzerSettings {
    pub fft_size:  usize,
    pub smoothing: f32,
    pub loopback:  bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Spectrum maths
// ════════════════════════════════════════════════════════════════════════════

/// Linear magnitude → spectrum byte value (`0.0..=255.0`).
pub fn magnitude_to_byte(magnitude: f32) -> f32 {
    if !(magnitude > 0.0) {
        return 0.0;
    }
    let db = 20.0 * magnitude.log10();
    ((db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0).clamp(0.0, 255.0)
}

/// Mean byte value of the bins covering `lo..=hi` Hz.
///
/// `spectrum` holds the bins from 0 Hz up to (not including) Nyquist.
pub fn band_energy(spectrum: &[f32], sample_rate: f32, (lo, hi): (f32, f32)) -> f32 {
    if spectrum.is_empty() || !(sample_rate > 0.0) {
        return 0.0;
    }
    let nyquist = sample_rate / 2.0;
    let last = spectrum.len() - 1;
    let index = |hz: f32| (((hz / nyquist) * spectrum.len() as f32).round().max(0.0) as usize).min(last);
    let (a, b) = (index(lo.min(hi)), index(lo.max(hi)));
    let bins = &spectrum[a..=b];
    bins.iter().sum::<f32>() / bins.len() as f32
}

/// Windowed, time-smoothed FFT over fixed-size sample blocks.
pub struct SpectrumAnalyzer {
    fft:       Arc<dyn Fft<f32>>,
    window:    Vec<f32>,
    smoothing: f32,
    smoothed:  Vec<f32>,
    spectrum:  Vec<f32>,
    buffer:    Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(size: usize, smoothing: f32) -> Self {
        let size = size.max(2);
        let mut planner = FftPlanner::<f32>::new();
        let n = size as f32;
        // Blackman window
        let window = (0..size)
            .map(|i| {
                let t = std::f32::consts::TAU * i as f32 / n;
                0.42 - 0.5 * t.cos() + 0.08 * (2.0 * t).cos()
            })
            .collect();
        SpectrumAnalyzer {
            fft: planner.plan_fft_forward(size),
            window,
            smoothing: smoothing.clamp(0.0, 0.999),
            smoothed: vec![0.0; size / 2],
            spectrum: vec![0.0; size / 2],
            buffer:   Vec::with_capacity(size),
        }
    }

    pub fn size(&self) -> usize { self.window.len() }

    /// Analyse one block of `size()` mono samples; returns the byte spectrum.
    pub fn process(&mut self, block: &[f32]) -> &[f32] {
        let n = self.window.len();
        self.buffer.clear();
        self.buffer.extend(
            (0..n).map(|i| Complex::new(block.get(i).copied().unwrap_or(0.0) * self.window[i], 0.0))
        );
        self.fft.process(&mut self.buffer);

        let s = self.smoothing;
        for (k, bin) in self.buffer.iter().take(n / 2).enumerate() {
            let magnitude = bin.norm() / n as f32;
            self.smoothed[k] = s * self.smoothed[k] + (1.0 - s) * magnitude;
            self.spectrum[k] = magnitude_to_byte(self.smoothed[k]);
        }
        &self.spectrum
    }

    pub fn levels(&self, sample_rate: f32) -> AudioLevels {
        AudioLevels {
            energy: band_energy(&self.spectrum, sample_rate, MID_BAND),
            bass:   band_energy(&self.spectrum, sample_rate, BASS_BAND),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Capture
// ════════════════════════════════════════════════════════════════════════════

struct Capture {
    _stream:     cpal::Stream,
    device:      String,
    sample_rate: u32,
    samples:     Receiver<Vec<f32>>,
    errors:      Receiver<String>,
}

/// Open the default input (or, with `loopback`, the default output) and
/// start streaming channel-averaged `f32` samples.
fn open_capture(loopback: bool) -> Result<Capture, String> {
    let host = cpal::default_host();
    let device = if loopback { host.default_output_device() } else { host.default_input_device() }
        .ok_or_else(|| "no audio device".to_string())?;
    let device_name = device.name().unwrap_or_else(|_| "unnamed device".to_string());

    let ranges: Vec<_> = if loopback {
        device.supported_output_configs().map_err(|e| e.to_string())?.collect()
    } else {
        device.supported_input_configs().map_err(|e| e.to_string())?.collect()
    };
    let range = ranges.into_iter()
        .find(|c| c.sample_format() == SampleFormat::F32)
        .ok_or_else(|| format!("{} offers no f32 format", device_name))?;

    let preferred = SampleRate(48_000);
    let config = if range.min_sample_rate() <= preferred && preferred <= range.max_sample_rate() {
        range.with_sample_rate(preferred)
    } else {
        range.with_max_sample_rate()
    };
    let channels = config.channels().max(1) as usize;
    let sample_rate = config.sample_rate().0;

    let (sample_tx, samples) = mpsc::channel::<Vec<f32>>();
    let (error_tx, errors) = mpsc::channel::<String>();

    let stream = device.build_input_stream(
        &config.config(),
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let mono: Vec<f32> = data.chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect();
            if !mono.is_empty() {
                let _ = sample_tx.send(mono);
            }
        },
        move |e| {
            let _ = error_tx.send(e.to_string());
        },
    ).map_err(|e| e.to_string())?;
    stream.play().map_err(|e| e.to_string())?;

    Ok(Capture { _stream: stream, device: device_name, sample_rate, samples, errors })
}

// ════════════════════════════════════════════════════════════════════════════
// Supervisor thread
// ════════════════════════════════════════════════════════════════════════════

/// Start analysing on a background thread.  Dropping the receiver stops it.
pub fn spawn_analyzer(settings: AnalyzerSettings) -> Receiver<AnalyzerEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || analyzer_thread(settings, tx));
    rx
}

fn analyzer_thread(settings: AnalyzerSettings, tx: Sender<AnalyzerEvent>) {
    let mut init = InitState::default();
    let mut spectrum = SpectrumAnalyzer::new(settings.fft_size, settings.smoothing);

    loop {
        let now = Instant::now();
        if !init.due(now) {
            thread::sleep(init.remaining(now).unwrap_or(Duration::from_millis(100)));
            continue;
        }

        init.begin();
        let capture = match open_capture(settings.loopback) {
            Ok(c) => c,
            Err(e) => {
                let wait = init.fail(Instant::now());
                log::warn!("audio capture unavailable ({}), retrying in {:?}", e, wait);
                continue;
            }
        };
        init.succeed();
        log::info!("audio capture on {} at {} Hz", capture.device, capture.sample_rate);
        if tx.send(AnalyzerEvent::Ready {
            device:      capture.device.clone(),
            sample_rate: capture.sample_rate,
        }).is_err() {
            return;
        }

        let reason = match pump(&capture, &mut spectrum, &tx) {
            Some(reason) => reason,
            None => return,
        };
        drop(capture);

        let wait = init.fail(Instant::now());
        log::error!("audio capture lost ({}), retrying in {:?}", reason, wait);
        if tx.send(AnalyzerEvent::Lost(reason)).is_err() {
            return;
        }
    }
}

/// Feed captured blocks through the analyser until the stream fails.
/// Returns the failure, or `None` when the app hung up.
fn pump(capture: &Capture, spectrum: &mut SpectrumAnalyzer, tx: &Sender<AnalyzerEvent>) -> Option<String> {
    let size = spectrum.size();
    let rate = capture.sample_rate as f32;
    let mut pending: Vec<f32> = Vec::with_capacity(size * 2);

    loop {
        if let Ok(e) = capture.errors.try_recv() {
            return Some(e);
        }
        match capture.samples.recv_timeout(STALL_TIMEOUT) {
            Ok(mut block) => pending.append(&mut block),
            Err(RecvTimeoutError::Timeout) => return Some("no samples".to_string()),
            Err(RecvTimeoutError::Disconnected) => return Some("stream closed".to_string()),
        }

        while pending.len() >= size {
            spectrum.process(&pending[..size]);
            pending.drain(..size);
            if tx.send(AnalyzerEvent::Levels(spectrum.levels(rate))).is_err() {
                return None;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 48_000.0;

    fn sine(freq: f32, amp: f32, n: usize) -> Vec<f32> {
        (0..n).map(|i| amp * (std::f32::consts::TAU * freq * i as f32 / RATE).sin()).collect()
    }

    #[test]
    fn decibel_window_maps_to_bytes() {
        assert_eq!(magnitude_to_byte(0.0), 0.0);
        assert_eq!(magnitude_to_byte(1e-6), 0.0);     // −120 dB
        assert_eq!(magnitude_to_byte(1.0), 255.0);    // 0 dB
        let mid = magnitude_to_byte(10f32.powf(-65.0 / 20.0));
        assert!((mid - 127.5).abs() < 0.1);
    }

    #[test]
    fn band_energy_averages_covered_bins() {
        // 512 bins up to 24 kHz → 46.875 Hz per bin.
        let mut spectrum = vec![0.0; 512];
        for b in 0..=3 {
            spectrum[b] = 200.0;
        }
        let bass = band_energy(&spectrum, RATE, BASS_BAND);
        // bins 0..=3 → all 200
        assert_eq!(bass, 200.0);
        assert_eq!(band_energy(&spectrum, RATE, MID_BAND), 0.0);
    }

    #[test]
    fn band_energy_handles_degenerate_input() {
        assert_eq!(band_energy(&[], RATE, BASS_BAND), 0.0);
        assert_eq!(band_energy(&[10.0; 8], 0.0, BASS_BAND), 0.0);
        assert_eq!(band_energy(&[10.0; 8], RATE, (90_000.0, 100_000.0)), 10.0);
    }

    #[test]
    fn silence_has_no_energy() {
        let mut a = SpectrumAnalyzer::new(1024, 0.0);
        a.process(&vec![0.0; 1024]);
        assert_eq!(a.levels(RATE), AudioLevels::default());
    }

    #[test]
    fn bass_tone_lights_bass_band() {
        let mut a = SpectrumAnalyzer::new(1024, 0.0);
        a.process(&sine(80.0, 0.8, 1024));
        let l = a.levels(RATE);
        assert!(l.bass > 100.0, "{:?}", l);
        assert!(l.bass > l.energy, "{:?}", l);
    }

    #[test]
    fn mid_tone_lights_mid_band() {
        let mut a = SpectrumAnalyzer::new(1024, 0.0);
        a.process(&sine(1000.0, 0.8, 1024));
        let l = a.levels(RATE);
        assert!(l.energy > l.bass, "{:?}", l);
    }

    #[test]
    fn smoothing_holds_levels_after_tone_stops() {
        let mut a = SpectrumAnalyzer::new(1024, 0.9);
        for _ in 0..20 {
            a.process(&sine(1000.0, 0.8, 1024));
        }
        let loud = a.levels(RATE).energy;
        a.process(&vec![0.0; 1024]);
        let after = a.levels(RATE).energy;
        assert!(after > 0.0 && after < loud);
    }

    #[test]
    fn short_block_is_zero_padded() {
        let mut a = SpectrumAnalyzer::new(256, 0.0);
        assert_eq!(a.process(&[0.0; 10]).len(), 128);
    }
}
