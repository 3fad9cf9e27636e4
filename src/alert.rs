//! Sustained-low-score alerting
//!
//! The monitor watches the smoothed score once per update tick and decides
//! when to nudge the user with a beep: sustained bad posture for ~5 seconds
//! arms the alert, after which a beep fires every ~2 seconds until the score
//! recovers or the subject leaves the frame. The monitor only decides; the
//! audible side effect belongs to an [`AlertSink`] owned by the host.

use serde::{Deserialize, Serialize};

/// Update tick interval the counters are calibrated for
pub const TICK_INTERVAL_MS: u64 = 200;
/// Ticks of sustained low score before alerts arm (~5 seconds)
pub const SUSTAIN_TICKS: u32 = 25;
/// Ticks between repeated beeps once armed (~2 seconds)
pub const BEEP_INTERVAL_TICKS: u32 = 10;
/// Smoothed score below this is considered bad posture
pub const DEFAULT_LOW_SCORE_THRESHOLD: i32 = 80;

/// Audio collaborator driven by alert decisions. Implementations live in the
/// host application (platform audio APIs); tests use a recording stub.
pub trait AlertSink {
    /// Play one short beep
    fn beep(&mut self);
    /// Stop any continuous alert sound immediately
    fn silence(&mut self);
}

/// Per-tick alerting decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertDecision {
    /// Nothing to do this tick
    Quiet,
    /// Fire one beep now
    Beep,
    /// Score recovered or subject left the frame; stop any ongoing sound
    Recovered,
}

/// Counter state for the sustained-low-score alert.
///
/// Single-owner by design: one session drives `tick` from its update loop;
/// no internal locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMonitor {
    low_score_threshold: i32,
    low_score_ticks: u32,
    beep_tick: u32,
}

impl Default for AlertMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_SCORE_THRESHOLD)
    }
}

impl AlertMonitor {
    pub fn new(low_score_threshold: i32) -> Self {
        Self {
            low_score_threshold,
            low_score_ticks: 0,
            beep_tick: 0,
        }
    }

    /// Advance the alert state by one ~200ms tick.
    ///
    /// While the subject is visible and the smoothed score sits below the
    /// threshold, ticks accumulate toward [`SUSTAIN_TICKS`]; once armed, a
    /// beep fires every [`BEEP_INTERVAL_TICKS`]. Any recovery tick (score at
    /// or above threshold, or subject not visible) resets both counters and
    /// reports [`AlertDecision::Recovered`] exactly once per episode.
    pub fn tick(&mut self, smoothed_score: i32, subject_visible: bool) -> AlertDecision {
        if subject_visible && smoothed_score < self.low_score_threshold {
            if self.low_score_ticks < SUSTAIN_TICKS {
                self.low_score_ticks += 1;
                AlertDecision::Quiet
            } else {
                self.beep_tick += 1;
                if self.beep_tick >= BEEP_INTERVAL_TICKS {
                    self.beep_tick = 0;
                    AlertDecision::Beep
                } else {
                    AlertDecision::Quiet
                }
            }
        } else if self.low_score_ticks != 0 || self.beep_tick != 0 {
            self.low_score_ticks = 0;
            self.beep_tick = 0;
            AlertDecision::Recovered
        } else {
            AlertDecision::Quiet
        }
    }

    /// Drive an [`AlertSink`] directly from one tick's decision
    pub fn tick_with_sink(
        &mut self,
        smoothed_score: i32,
        subject_visible: bool,
        sink: &mut dyn AlertSink,
    ) -> AlertDecision {
        let decision = self.tick(smoothed_score, subject_visible);
        match decision {
            AlertDecision::Beep => sink.beep(),
            AlertDecision::Recovered => sink.silence(),
            AlertDecision::Quiet => {}
        }
        decision
    }

    /// Zero both counters without emitting a decision (session stop)
    pub fn reset(&mut self) {
        self.low_score_ticks = 0;
        self.beep_tick = 0;
    }

    pub fn low_score_threshold(&self) -> i32 {
        self.low_score_threshold
    }
}
