//! Tracking session orchestration
//!
//! A [`TrackingSession`] owns all mutable per-session state: the smoothed
//! score, the calibrator, the alert counters, and the minute recorder. The
//! host drives it from a single-threaded periodic loop: `tick` at ~200ms with
//! the latest landmark frame, `second_tick` at ~1s for duration bookkeeping
//! and sample recording. Stopping zeroes everything so the next session
//! starts clean.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::{AlertDecision, AlertMonitor, DEFAULT_LOW_SCORE_THRESHOLD};
use crate::calibration::Calibrator;
use crate::metrics::MetricsExtractor;
use crate::recorder::MinuteRecorder;
use crate::score::{calculate_score, smooth_score};
use crate::types::{Landmark, MetricFlag, PostureSample, PostureStatus, TrackingSource};

/// Fewer visible landmarks than this means the subject is out of frame
pub const MIN_VISIBLE_LANDMARKS: usize = 4;

/// Everything the UI layer needs from one update tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickUpdate {
    /// Raw frame score before smoothing
    pub raw_score: i32,
    /// Exponentially smoothed score
    pub smoothed_score: i32,
    /// Display status derived from the smoothed score
    pub status: PostureStatus,
    /// Metrics that violated their thresholds this frame
    pub flags: Vec<MetricFlag>,
    /// Whether the subject was considered in frame
    pub subject_visible: bool,
    /// Alerting decision for this tick
    pub alert: AlertDecision,
}

/// Stateful per-session posture tracker
#[derive(Debug, Clone)]
pub struct TrackingSession {
    session_id: Uuid,
    source: TrackingSource,
    started_at: DateTime<Utc>,
    calibrator: Calibrator,
    alert: AlertMonitor,
    recorder: MinuteRecorder,
    smoothed_score: i32,
    subject_visible: bool,
    active_seconds: u64,
}

impl TrackingSession {
    pub fn new(source: TrackingSource) -> Self {
        Self::with_threshold(source, DEFAULT_LOW_SCORE_THRESHOLD)
    }

    /// Session with a custom low-score alert threshold
    pub fn with_threshold(source: TrackingSource, low_score_threshold: i32) -> Self {
        let session_id = Uuid::new_v4();
        Self {
            session_id,
            source,
            started_at: Utc::now(),
            calibrator: Calibrator::new(),
            alert: AlertMonitor::new(low_score_threshold),
            recorder: MinuteRecorder::new(session_id, source),
            smoothed_score: 0,
            subject_visible: false,
            active_seconds: 0,
        }
    }

    /// Sample the current frame as the user's "good posture" baseline.
    /// Best-effort: returns `false` and keeps default thresholds when the
    /// frame carries no usable pose.
    pub fn try_calibrate(&mut self, landmarks: &[Landmark]) -> bool {
        self.calibrator.try_calibrate(landmarks)
    }

    /// Process one landmark frame (~200ms cadence).
    ///
    /// Visibility requires at least [`MIN_VISIBLE_LANDMARKS`] landmarks; an
    /// out-of-frame subject pauses scoring and resets the alert counters.
    /// Short-but-nonempty frames score against zeroed metrics, a defined
    /// degenerate case of the extractor.
    pub fn tick(&mut self, landmarks: &[Landmark]) -> TickUpdate {
        self.subject_visible = landmarks.len() >= MIN_VISIBLE_LANDMARKS;

        let (raw_score, flags) = if landmarks.is_empty() {
            (self.smoothed_score, Vec::new())
        } else {
            let metrics = MetricsExtractor::extract(landmarks);
            let result = calculate_score(&metrics, self.calibrator.thresholds());
            self.smoothed_score = smooth_score(result.score, self.smoothed_score);
            (result.score, result.flags)
        };

        let alert = self.alert.tick(self.smoothed_score, self.subject_visible);

        TickUpdate {
            raw_score,
            smoothed_score: self.smoothed_score,
            status: PostureStatus::classify(self.smoothed_score, self.calibrator.is_calibrated()),
            flags,
            subject_visible: self.subject_visible,
            alert,
        }
    }

    /// Duration bookkeeping (~1s cadence). The timer pauses while the subject
    /// is out of frame. Each counted second feeds the smoothed score to the
    /// minute recorder; a completed minute emits its sample.
    pub fn second_tick(&mut self, now: DateTime<Utc>) -> Option<PostureSample> {
        if !self.subject_visible {
            return None;
        }
        self.active_seconds += 1;
        self.recorder.add_score(self.smoothed_score);

        if self.active_seconds % 60 == 0 {
            self.recorder.emit(now)
        } else {
            None
        }
    }

    /// Stop tracking: flush the in-progress minute and zero all state so a
    /// subsequent session starts clean.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<PostureSample> {
        let final_sample = self.recorder.emit(now);
        self.smoothed_score = 0;
        self.subject_visible = false;
        self.active_seconds = 0;
        self.alert.reset();
        self.calibrator.reset();
        final_sample
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn source(&self) -> TrackingSource {
        self.source
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_calibrated()
    }

    pub fn smoothed_score(&self) -> i32 {
        self.smoothed_score
    }

    /// Seconds of visible tracking time accumulated so far
    pub fn active_seconds(&self) -> u64 {
        self.active_seconds
    }

    pub fn subject_visible(&self) -> bool {
        self.subject_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{landmark_index as idx, POSE_LANDMARK_COUNT};
    use chrono::TimeZone;

    fn upright_frame() -> Vec<Landmark> {
        let mut frame = vec![Landmark::new(0.5, 0.5); POSE_LANDMARK_COUNT];
        frame[idx::NOSE] = Landmark::new(0.5, 0.2);
        frame[idx::LEFT_SHOULDER] = Landmark::new(0.4, 0.4);
        frame[idx::RIGHT_SHOULDER] = Landmark::new(0.6, 0.4);
        frame[idx::LEFT_HIP] = Landmark::new(0.4, 0.7);
        frame[idx::RIGHT_HIP] = Landmark::new(0.6, 0.7);
        frame
    }

    /// Upright frame with a heavy sideways trunk lean
    fn slouched_frame() -> Vec<Landmark> {
        let mut frame = upright_frame();
        frame[idx::LEFT_SHOULDER] = Landmark::new(0.7, 0.4);
        frame[idx::RIGHT_SHOULDER] = Landmark::new(0.9, 0.4);
        frame
    }

    fn at_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_uncalibrated_session_reports_calibrating() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        let update = session.tick(&upright_frame());

        assert_eq!(update.status, PostureStatus::Calibrating);
        assert!(update.subject_visible);
    }

    #[test]
    fn test_calibrated_upright_session_scores_good() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        assert!(session.try_calibrate(&upright_frame()));

        let update = session.tick(&upright_frame());
        assert_eq!(update.raw_score, 100);
        assert_eq!(update.smoothed_score, 100);
        assert_eq!(update.status, PostureStatus::Good);
        assert!(update.flags.is_empty());
    }

    #[test]
    fn test_smoothing_carries_across_ticks() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        session.try_calibrate(&upright_frame());

        // Seed at 100, then a bad frame pulls the smoothed score down by 30%
        session.tick(&upright_frame());
        let update = session.tick(&slouched_frame());
        assert!(update.raw_score < 100);
        let expected = crate::score::smooth_score(update.raw_score, 100);
        assert_eq!(update.smoothed_score, expected);
    }

    #[test]
    fn test_empty_frame_marks_subject_not_visible() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        session.try_calibrate(&upright_frame());
        session.tick(&upright_frame());

        let update = session.tick(&[]);
        assert!(!update.subject_visible);
        // Score state is held, not recomputed
        assert_eq!(update.smoothed_score, 100);
    }

    #[test]
    fn test_sustained_bad_posture_beeps_then_recovers() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        session.try_calibrate(&upright_frame());

        let bad = slouched_frame();
        let mut first_beep_tick = None;
        for tick in 1..=40 {
            let update = session.tick(&bad);
            if update.alert == AlertDecision::Beep && first_beep_tick.is_none() {
                first_beep_tick = Some(tick);
            }
        }
        // Smoothing seeds directly at the first bad score, so accumulation
        // starts on tick 1 and the first beep lands at 25 + 10
        assert_eq!(first_beep_tick, Some(35));

        let update = session.tick(&upright_frame());
        // One good frame is not enough to lift the smoothed score past 80,
        // so recovery needs a few ticks
        assert!(update.smoothed_score < 80);
        let mut recovered = update.alert == AlertDecision::Recovered;
        for _ in 0..20 {
            if session.tick(&upright_frame()).alert == AlertDecision::Recovered {
                recovered = true;
            }
        }
        assert!(recovered);
    }

    #[test]
    fn test_minute_boundary_emits_sample() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        session.try_calibrate(&upright_frame());
        session.tick(&upright_frame());

        for _ in 0..59 {
            assert!(session.second_tick(at_noon()).is_none());
        }
        let sample = session.second_tick(at_noon()).unwrap();
        assert_eq!(sample.average_score, 100);
        assert_eq!(sample.samples_count, 60);
        assert_eq!(sample.session_id, session.session_id());
    }

    #[test]
    fn test_timer_pauses_while_not_visible() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        session.try_calibrate(&upright_frame());
        session.tick(&[]);

        for _ in 0..10 {
            assert!(session.second_tick(at_noon()).is_none());
        }
        assert_eq!(session.active_seconds(), 0);
    }

    #[test]
    fn test_stop_flushes_partial_minute_and_resets() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        session.try_calibrate(&upright_frame());
        session.tick(&upright_frame());
        for _ in 0..30 {
            session.second_tick(at_noon());
        }

        let final_sample = session.stop(at_noon()).unwrap();
        assert_eq!(final_sample.samples_count, 30);

        // Everything zeroed for the next run
        assert_eq!(session.smoothed_score(), 0);
        assert_eq!(session.active_seconds(), 0);
        assert!(!session.is_calibrated());
        assert!(!session.subject_visible());

        // First tick of the next run seeds smoothing from scratch
        let update = session.tick(&upright_frame());
        assert_eq!(update.smoothed_score, update.raw_score);
        assert_eq!(update.status, PostureStatus::Calibrating);
    }

    #[test]
    fn test_stop_with_empty_minute_emits_nothing() {
        let mut session = TrackingSession::new(TrackingSource::Phone);
        assert!(session.stop(at_noon()).is_none());
    }
}
