//! Landmark sources: a simulated hand under the mouse, or frames piped in
//! from an external detector.
//!
//! The public interface is [`LandmarkFrame`] delivered over a `mpsc`
//! channel.  The frame tick doesn't need to know where frames came from.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use flow_field::Vec2;
use hand_gesture::{CanvasMap, Landmark, LandmarkFrame, PinchState, FINGERTIPS, HAND_LANDMARKS};

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait
// ════════════════════════════════════════════════════════════════════════════

pub trait LandmarkSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<LandmarkFrame>);
}

/// Spawn a landmark source on its own thread and return the receiving end.
pub fn spawn_landmark_source<S: LandmarkSource>(source: S) -> Receiver<LandmarkFrame> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// SimLandmarkSource — mouse-driven hand (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw pointer event from the window, in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    Pointer { x: f32, y: f32, pressed: bool },
    /// Pointer left the window: the hand disappears.
    Leave,
    Quit,
}

/// Open right hand seen from the camera, as canvas-pixel offsets from the
/// wrist (y grows downward).
const HAND_SHAPE: [(f32, f32); HAND_LANDMARKS] = [
    (  0.0,    0.0),                                                      // wrist
    (-30.0,  -20.0), (-50.0,  -45.0), (-62.0,  -70.0), (-70.0,  -92.0),  // thumb
    (-25.0,  -80.0), (-28.0, -100.0), (-30.0, -113.0), (-32.0, -125.0),  // index
    (  0.0,  -85.0), (  0.0, -110.0), (  0.0, -125.0), (  0.0, -138.0),  // middle
    ( 22.0,  -80.0), ( 25.0, -102.0), ( 27.0, -116.0), ( 28.0, -128.0),  // ring
    ( 40.0,  -70.0), ( 46.0,  -88.0), ( 50.0, -100.0), ( 52.0, -110.0),  // pinky
];

const THUMB_TIP: usize = 4;
const INDEX_TIP: usize = 8;

/// Synthesises detector frames for a hand whose index fingertip follows the
/// pointer.  Holding the button pinches the index finger.
#[derive(Clone, Debug)]
pub struct SimHand {
    canvas:  CanvasMap,
    pressed: bool,
}

impl SimHand {
    pub fn new(canvas: CanvasMap) -> Self {
        SimHand { canvas, pressed: false }
    }

    /// Frame with the index fingertip at canvas point `(x, y)`.
    pub fn frame(&mut self, x: f32, y: f32, pressed: bool) -> LandmarkFrame {
        let state = match (self.pressed, pressed) {
            (false, true)  => PinchState::Start,
            (true,  true)  => PinchState::Holding,
            (true,  false) => PinchState::End,
            (false, false) => PinchState::Idle,
        };
        self.pressed = pressed;

        let tip = Vec2::new(x, y);
        let (ox, oy) = HAND_SHAPE[INDEX_TIP];
        let wrist = tip - Vec2::new(ox, oy);

        let mut hand: Vec<Landmark> = HAND_SHAPE.iter()
            .map(|&(dx, dy)| self.canvas.to_normalized(wrist + Vec2::new(dx, dy)))
            .collect();
        if pressed {
            hand[THUMB_TIP] = hand[INDEX_TIP];
        }

        let mut pinch = vec![PinchState::Idle; FINGERTIPS.len()];
        pinch[0] = state;

        LandmarkFrame { hands: vec![hand], scores: vec![1.0], pinch: vec![pinch] }
    }

    /// Empty frame; also releases any held pinch.
    pub fn leave(&mut self) -> LandmarkFrame {
        self.pressed = false;
        LandmarkFrame::default()
    }
}

/// Translates the window's [`SimInput`]s into frames.
pub struct SimLandmarkSource {
    pub rx:   Receiver<SimInput>,
    pub hand: SimHand,
}

impl LandmarkSource for SimLandmarkSource {
    fn run(self: Box<Self>, tx: Sender<LandmarkFrame>) {
        let SimLandmarkSource { rx, mut hand } = *self;
        for input in rx {
            let frame = match input {
                SimInput::Pointer { x, y, pressed } => hand.frame(x, y, pressed),
                SimInput::Leave                     => hand.leave(),
                SimInput::Quit                      => return,
            };
            if tx.send(frame).is_err() { return; }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// JsonLinesSource — one JSON LandmarkFrame per line
// ════════════════════════════════════════════════════════════════════════════

/// Parse one input line.  Blank lines yield `Ok(None)`.
pub fn parse_frame_line(line: &str) -> Result<Option<LandmarkFrame>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Frames from an external detector, e.g.
///
/// ```text
/// {"hands":[[{"x":0.5,"y":0.5}, …21 points]],"scores":[0.9],"pinch":[["start","none","none","none"]]}
/// ```
pub struct JsonLinesSource<R> {
    reader: R,
}

/// The `--landmarks-stdin` source.
pub type StdinLandmarkSource = JsonLinesSource<io::BufReader<io::Stdin>>;

impl<R: BufRead + Send + 'static> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        JsonLinesSource { reader }
    }
}

impl StdinLandmarkSource {
    pub fn stdin() -> Self {
        JsonLinesSource::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> LandmarkSource for JsonLinesSource<R> {
    fn run(self: Box<Self>, tx: Sender<LandmarkFrame>) {
        for (n, line) in self.reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    log::error!("landmark input closed: {}", e);
                    return;
                }
            };
            match parse_frame_line(&line) {
                Ok(Some(frame)) => {
                    if tx.send(frame).is_err() { return; }
                }
                Ok(None) => {}
                Err(e) => log::warn!("landmark line {} skipped: {}", n + 1, e),
            }
        }
        log::info!("landmark input ended");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
