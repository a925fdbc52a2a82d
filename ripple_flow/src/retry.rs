//! Backoff for audio resources that may not exist yet (no capture device,
//! no MIDI port, device unplugged mid-session).

use std::time::{Duration, Instant};

/// Wait after the 1st, 2nd and every later consecutive failure.
pub const BACKOFF_MS: [u64; 3] = [500, 1000, 5000];

/// Delay before retrying after `failures` consecutive failures (1-based).
pub fn retry_delay(failures: u32) -> Duration {
    let tier = (failures.max(1) as usize - 1).min(BACKOFF_MS.len() - 1);
    Duration::from_millis(BACKOFF_MS[tier])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitPhase {
    Uninitialized,
    Initializing,
    Ready,
    RetryPending { attempt: u32, until: Instant },
}

/// Setup state machine for one resource.
///
/// ```text
///   Uninitialized ─begin─▶ Initializing ─succeed─▶ Ready
///         ▲                     │                    │
///         │                   fail                 lost
///         │                     ▼                    │
///         └──(deadline)── RetryPending ◀─────────────┘
/// ```
#[derive(Clone, Copy, Debug)]
pub struct InitState {
    phase:    InitPhase,
    failures: u32,
}

impl Default for InitState {
    fn default() -> Self {
        InitState { phase: InitPhase::Uninitialized, failures: 0 }
    }
}

impl InitState {
    pub fn phase(&self)    -> InitPhase { self.phase }
    pub fn is_ready(&self) -> bool      { self.phase == InitPhase::Ready }

    /// True when a setup attempt is allowed at `now`.
    pub fn due(&self, now: Instant) -> bool {
        match self.phase {
            InitPhase::Uninitialized               => true,
            InitPhase::RetryPending { until, .. }  => now >= until,
            InitPhase::Initializing | InitPhase::Ready => false,
        }
    }

    pub fn begin(&mut self) {
        self.phase = InitPhase::Initializing;
    }

    pub fn succeed(&mut self) {
        self.phase = InitPhase::Ready;
        self.failures = 0;
    }

    /// Record a failed attempt (or a lost resource) and schedule the retry.
    /// Returns the wait.
    pub fn fail(&mut self, now: Instant) -> Duration {
        self.failures += 1;
        let wait = retry_delay(self.failures);
        self.phase = InitPhase::RetryPending { attempt: self.failures, until: now + wait };
        wait
    }

    /// Time left until the next attempt, `None` if not waiting.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.phase {
            InitPhase::RetryPending { until, .. } => Some(until.saturating_duration_since(now)),
            _ => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
