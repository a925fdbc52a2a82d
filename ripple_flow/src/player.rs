//! Real-time tone output.
//!
//! Each pinch asks for one short tone.  Tones go to a MIDI output port on a
//! dedicated thread: the tick only sends a `PlayerCommand`, the thread turns
//! it into note-on / pitch-bend now and a note-off `tone_ms` later.
//!
//! The port is opened lazily on the first tone.  If it cannot be opened the
//! tone is dropped and the next attempt waits out the [`InitState`] backoff.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tone_map::{message, velocity_for, GeneralMidi, MidiPitch};

use crate::retry::InitState;

/// Channels tones rotate over, so each keeps its own pitch bend.
/// Channel 9 (GM percussion) is never used.
pub const VOICE_CHANNELS: u8 = 8;

/// Poll interval while nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_millis(250);

// ════════════════════════════════════════════════════════════════════════════
// ToneSink — what the frame tick talks to
// ════════════════════════════════════════════════════════════════════════════

pub trait ToneSink {
    fn play_tone(&mut self, frequency_hz: f32);
}

// ════════════════════════════════════════════════════════════════════════════
// PlayerCommand — sent to the playback thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayerCommand {
    /// Sound one tone (Hz).
    Play(f32),
    /// `0.0..=1.0`
    SetVolume(f32),
    SetInstrument(GeneralMidi),
    /// Silence everything and end the thread.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// MidiOut — abstraction over midir / recorder (for testing)
// ════════════════════════════════════════════════════════════════════════════

pub trait MidiOut: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<(), String>;
}

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn send(&mut self, bytes: &[u8]) -> Result<(), String> {
        self.conn.send(bytes).map_err(|e| e.to_string())
    }
}

/// Opens a `MidiOut`; called again after each failure once the backoff allows.
pub type Opener = Box<dyn FnMut() -> Result<Box<dyn MidiOut>, String> + Send>;

/// Connect to the first MIDI output port, preferring a softsynth.
pub fn open_midi_output() -> Result<Box<dyn MidiOut>, String> {
    let midi_out = midir::MidiOutput::new("ripple_flow").map_err(|e| e.to_string())?;

    let ports = midi_out.ports();
    if ports.is_empty() {
        return Err("no MIDI output ports (try `fluidsynth` or `timidity -iA`)".to_string());
    }

    let port = ports.iter()
        .find(|p| {
            midi_out.port_name(p).map(|n| {
                let n = n.to_lowercase();
                n.contains("fluid") || n.contains("timidity") ||
                n.contains("microsoft") || n.contains("synth")
            }).unwrap_or(false)
        })
        .unwrap_or(&ports[0]);
    let name = midi_out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());

    let conn = midi_out.connect(port, "ripple-tones").map_err(|e| e.to_string())?;
    log::info!("MIDI output: {}", name);
    Ok(Box::new(MidirOut { conn }))
}

// ════════════════════════════════════════════════════════════════════════════
// ToneVoice — the playback logic, clocked by the caller
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingOff {
    channel: u8,
    note:    u8,
    at:      Instant,
}

pub struct ToneVoice {
    open:         Opener,
    out:          Option<Box<dyn MidiOut>>,
    init:         InitState,
    volume:       f32,
    instrument:   GeneralMidi,
    tone_len:     Duration,
    next_channel: u8,
    pending:      Vec<PendingOff>,
}

impl ToneVoice {
    pub fn new(open: Opener, volume: f32, instrument: GeneralMidi, tone_len: Duration) -> Self {
        ToneVoice {
            open,
            out: None,
            init: InitState::default(),
            volume: volume.clamp(0.0, 1.0),
            instrument,
            tone_len,
            next_channel: 0,
            pending: Vec::new(),
        }
    }

    pub fn is_open(&self)   -> bool      { self.out.is_some() }
    pub fn init(&self)      -> InitState { self.init }
    pub fn volume(&self)    -> f32       { self.volume }
    pub fn sounding(&self)  -> usize     { self.pending.len() }

    /// Start a tone at `now`.  Returns false when it was dropped.
    pub fn play(&mut self, hz: f32, now: Instant) -> bool {
        self.ensure_open(now);
        if !self.is_open() {
            log::debug!("tone {:.1} Hz dropped: output not ready", hz);
            return false;
        }
        let Some(pitch) = MidiPitch::from_frequency(hz) else {
            log::debug!("tone {} Hz dropped: not a pitch", hz);
            return false;
        };

        let channel = self.next_channel;
        self.next_channel = (self.next_channel + 1) % VOICE_CHANNELS;

        // A channel reused before its previous tone ended: end that one first.
        if let Some(i) = self.pending.iter().position(|p| p.channel == channel) {
            let old = self.pending.remove(i);
            self.send(&message::note_off(old.channel, old.note), now);
        }

        let velocity = velocity_for(self.volume);
        if !self.send(&message::pitch_bend(channel, pitch.bend), now)
            || !self.send(&message::note_on(channel, pitch.note, velocity), now)
        {
            return false;
        }
        self.pending.push(PendingOff { channel, note: pitch.note, at: now + self.tone_len });
        true
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
    }

    pub fn set_instrument(&mut self, instrument: GeneralMidi, now: Instant) {
        self.instrument = instrument;
        if self.is_open() {
            self.send_programs(now);
        }
    }

    /// Send the note-offs that are due by `now`.
    pub fn release_due(&mut self, now: Instant) {
        let (due, keep): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| p.at <= now);
        self.pending = keep;
        for p in due {
            self.send(&message::note_off(p.channel, p.note), now);
        }
    }

    /// When the next note-off falls due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.at).min()
    }

    /// End every sounding tone.
    pub fn silence(&mut self, now: Instant) {
        let pending = std::mem::take(&mut self.pending);
        for p in pending {
            self.send(&message::note_off(p.channel, p.note), now);
        }
        for ch in 0..VOICE_CHANNELS {
            self.send(&message::all_notes_off(ch), now);
        }
    }

    fn ensure_open(&mut self, now: Instant) {
        if self.is_open() || !self.init.due(now) {
            return;
        }
        self.init.begin();
        match (self.open)() {
            Ok(out) => {
                self.init.succeed();
                self.out = Some(out);
                self.send_programs(now);
            }
            Err(e) => {
                let wait = self.init.fail(now);
                log::warn!("MIDI output unavailable ({}), retrying in {:?}", e, wait);
            }
        }
    }

    fn send_programs(&mut self, now: Instant) {
        let program = self.instrument.program();
        for ch in 0..VOICE_CHANNELS {
            if !self.send(&message::program_change(ch, program), now) {
                return;
            }
        }
    }

    /// Send one message; a failing port is closed and scheduled for retry.
    fn send(&mut self, bytes: &[u8], now: Instant) -> bool {
        let Some(out) = self.out.as_mut() else { return false };
        match out.send(bytes) {
            Ok(()) => true,
            Err(e) => {
                self.out = None;
                self.pending.clear();
                let wait = self.init.fail(now);
                log::error!("MIDI output lost ({}), retrying in {:?}", e, wait);
                false
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TonePlayer — handle to the playback thread
// ════════════════════════════════════════════════════════════════════════════

pub struct TonePlayer {
    cmd_tx: Sender<PlayerCommand>,
}

impl TonePlayer {
    pub fn spawn(voice: ToneVoice) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayerCommand>();
        thread::spawn(move || player_thread(voice, cmd_rx));
        TonePlayer { cmd_tx }
    }

    pub fn set_volume(&self, volume: f32) {
        let _ = self.cmd_tx.send(PlayerCommand::SetVolume(volume));
    }

    pub fn set_instrument(&self, instrument: GeneralMidi) {
        let _ = self.cmd_tx.send(PlayerCommand::SetInstrument(instrument));
    }

    pub fn quit(&self) {
        let _ = self.cmd_tx.send(PlayerCommand::Quit);
    }
}

impl ToneSink for TonePlayer {
    fn play_tone(&mut self, frequency_hz: f32) {
        let _ = self.cmd_tx.send(PlayerCommand::Play(frequency_hz));
    }
}

fn player_thread(mut voice: ToneVoice, cmd_rx: Receiver<PlayerCommand>) {
    loop {
        let wait = voice.next_deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        match cmd_rx.recv_timeout(wait) {
            Ok(PlayerCommand::Play(hz))            => { voice.play(hz, Instant::now()); }
            Ok(PlayerCommand::SetVolume(v))        => voice.set_volume(v),
            Ok(PlayerCommand::SetInstrument(i))    => voice.set_instrument(i, Instant::now()),
            Ok(PlayerCommand::Quit)
            | Err(RecvTimeoutError::Disconnected)  => {
                voice.silence(Instant::now());
                return;
            }
            Err(RecvTimeoutError::Timeout)         => {}
        }
        voice.release_due(Instant::now());
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<Vec<u8>>>>;

    struct Recorder {
        log:  Log,
        fail: bool,
    }

    impl MidiOut for Recorder {
        fn send(&mut self, bytes: &[u8]) -> Result<(), String> {
            if self.fail {
                return Err("unplugged".into());
            }
            self.log.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    fn recording_voice(log: &Log) -> ToneVoice {
        let log = log.clone();
        let open: Opener = Box::new(move || {
            Ok(Box::new(Recorder { log: log.clone(), fail: false }) as Box<dyn MidiOut>)
        });
        ToneVoice::new(open, 0.3, GeneralMidi::Celesta, Duration::from_millis(150))
    }

    fn failing_opener(attempts: Arc<Mutex<u32>>) -> Opener {
        Box::new(move || {
            *attempts.lock().unwrap() += 1;
            Err("no port".to_string())
        })
    }

    fn status_bytes(log: &Log) -> Vec<u8> {
        log.lock().unwrap().iter().map(|m| m[0]).collect()
    }

    #[test]
    fn first_tone_opens_port_and_sets_programs() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        assert!(!v.is_open());
        assert!(v.play(392.0, Instant::now()));
        assert!(v.is_open());

        let msgs = log.lock().unwrap().clone();
        // 8 program changes, then bend + note-on on channel 0.
        assert_eq!(msgs.len(), 10);
        assert!(msgs[..8].iter().all(|m| m[0] & 0xF0 == 0xC0 && m[1] == 8));
        let pitch = MidiPitch::from_frequency(392.0).unwrap();
        assert_eq!(msgs[8], message::pitch_bend(0, pitch.bend).to_vec());
        assert_eq!(msgs[9], vec![0x90, 67, 38]);
    }

    #[test]
    fn note_off_after_tone_length() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        let t0 = Instant::now();
        v.play(440.0, t0);
        assert_eq!(v.next_deadline(), Some(t0 + Duration::from_millis(150)));

        v.release_due(t0 + Duration::from_millis(149));
        assert_eq!(v.sounding(), 1);
        v.release_due(t0 + Duration::from_millis(150));
        assert_eq!(v.sounding(), 0);
        assert_eq!(log.lock().unwrap().last().unwrap(), &vec![0x80, 69, 0]);
    }

    #[test]
    fn tones_rotate_channels() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        let t0 = Instant::now();
        for _ in 0..3 {
            v.play(261.63, t0);
        }
        let note_on_channels: Vec<u8> = status_bytes(&log).into_iter()
            .filter(|s| s & 0xF0 == 0x90)
            .map(|s| s & 0x0F)
            .collect();
        assert_eq!(note_on_channels, vec![0, 1, 2]);
    }

    #[test]
    fn reused_channel_releases_previous_note() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        let t0 = Instant::now();
        for _ in 0..=VOICE_CHANNELS {
            v.play(261.63, t0);
        }
        assert_eq!(v.sounding(), VOICE_CHANNELS as usize);
        assert!(status_bytes(&log).contains(&0x80));
    }

    #[test]
    fn unavailable_port_drops_tone_and_backs_off() {
        let attempts = Arc::new(Mutex::new(0));
        let mut v = ToneVoice::new(
            failing_opener(attempts.clone()), 0.3, GeneralMidi::Celesta, Duration::from_millis(150),
        );
        let t0 = Instant::now();
        assert!(!v.play(440.0, t0));
        assert!(!v.play(440.0, t0 + Duration::from_millis(100)));
        assert_eq!(*attempts.lock().unwrap(), 1);
        assert!(!v.play(440.0, t0 + Duration::from_millis(500)));
        assert_eq!(*attempts.lock().unwrap(), 2);
        assert_eq!(v.sounding(), 0);
    }

    #[test]
    fn failing_send_closes_port() {
        let open: Opener = Box::new(|| {
            Ok(Box::new(Recorder { log: Log::default(), fail: true }) as Box<dyn MidiOut>)
        });
        let mut v = ToneVoice::new(open, 0.3, GeneralMidi::Celesta, Duration::from_millis(150));
        assert!(!v.play(440.0, Instant::now()));
        assert!(!v.is_open());
        assert!(!v.init().is_ready());
    }

    #[test]
    fn volume_sets_velocity() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        v.set_volume(1.0);
        v.play(440.0, Instant::now());
        assert_eq!(log.lock().unwrap().last().unwrap()[2], 127);
        v.set_volume(f32::NAN);
        assert_eq!(v.volume(), 1.0);
    }

    #[test]
    fn instrument_change_reprograms_open_port() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        let t0 = Instant::now();
        v.play(440.0, t0);
        log.lock().unwrap().clear();
        v.set_instrument(GeneralMidi::Kalimba, t0);
        let msgs = log.lock().unwrap().clone();
        assert_eq!(msgs.len(), VOICE_CHANNELS as usize);
        assert!(msgs.iter().all(|m| m[1] == 108));
    }

    #[test]
    fn silence_ends_everything() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        let t0 = Instant::now();
        v.play(440.0, t0);
        v.silence(t0);
        assert_eq!(v.sounding(), 0);
        let tail: Vec<u8> = status_bytes(&log).into_iter().rev().take(8).collect();
        assert!(tail.iter().all(|s| s & 0xF0 == 0xB0));
    }

    #[test]
    fn invalid_frequency_is_dropped() {
        let log = Log::default();
        let mut v = recording_voice(&log);
        assert!(!v.play(f32::NAN, Instant::now()));
        assert_eq!(v.sounding(), 0);
    }
}
