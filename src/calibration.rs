//! Per-session calibration
//!
//! Thresholds personalize the score engine to the user's own baseline
//! posture: shortly after tracking starts, one stable frame is sampled and
//! each threshold is set to the observed metric plus a fixed margin. Without
//! a usable frame at that instant the defaults stay in effect and the session
//! keeps reporting a calibrating status.

use crate::metrics::MetricsExtractor;
use crate::types::{Landmark, PoseMetrics, POSE_LANDMARK_COUNT};
use serde::{Deserialize, Serialize};

/// Margin added to the angle-like metrics (degrees / scaled units)
pub const ANGLE_MARGIN: f64 = 3.0;
/// Margin subtracted from the head-z baseline (more negative is worse)
pub const HEAD_Z_MARGIN: f64 = 0.02;
/// Margin added to the shoulder asymmetry baseline
pub const SHOULDER_ASYM_MARGIN: f64 = 0.02;

/// Per-metric score thresholds. Values beyond a threshold in the metric's
/// "bad" direction draw penalties; `head_z_delta` is the one metric whose bad
/// direction is less-than.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationThresholds {
    pub torso_tilt: f64,
    pub shoulder_tilt: f64,
    pub neck_flex: f64,
    pub head_z_delta: f64,
    pub shoulder_asym_y: f64,
}

impl Default for CalibrationThresholds {
    /// Defaults used until a per-user baseline exists
    fn default() -> Self {
        Self {
            torso_tilt: 10.0,
            shoulder_tilt: 7.0,
            neck_flex: 12.0,
            head_z_delta: -0.05,
            shoulder_asym_y: 0.03,
        }
    }
}

impl CalibrationThresholds {
    /// Build thresholds from a baseline frame's metrics: the observed posture
    /// becomes "good", with a fixed margin per metric before penalties start.
    pub fn from_baseline(baseline: &PoseMetrics) -> Self {
        Self {
            torso_tilt: baseline.torso_tilt + ANGLE_MARGIN,
            shoulder_tilt: baseline.shoulder_tilt + ANGLE_MARGIN,
            neck_flex: baseline.neck_flex + ANGLE_MARGIN,
            head_z_delta: baseline.head_z_delta - HEAD_Z_MARGIN,
            shoulder_asym_y: baseline.shoulder_asym_y + SHOULDER_ASYM_MARGIN,
        }
    }

    /// Load thresholds from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize thresholds to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One-shot calibration state for a tracking session.
///
/// `try_calibrate` is best-effort: it succeeds at most once and fails
/// harmlessly on an unusable frame. The calibrator never retries on its own;
/// the session owner decides whether to try again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Calibrator {
    thresholds: Option<CalibrationThresholds>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the given frame as the user's baseline. Returns `false` when
    /// the frame carries no usable pose (fewer than 33 landmarks) or the
    /// session is already calibrated.
    pub fn try_calibrate(&mut self, landmarks: &[Landmark]) -> bool {
        if self.thresholds.is_some() || landmarks.len() < POSE_LANDMARK_COUNT {
            return false;
        }
        let baseline = MetricsExtractor::extract(landmarks);
        self.thresholds = Some(CalibrationThresholds::from_baseline(&baseline));
        true
    }

    pub fn is_calibrated(&self) -> bool {
        self.thresholds.is_some()
    }

    /// Calibrated thresholds, if any. The score engine falls back to
    /// defaults when this is `None`.
    pub fn thresholds(&self) -> Option<&CalibrationThresholds> {
        self.thresholds.as_ref()
    }

    /// Drop the baseline so a fresh session starts uncalibrated
    pub fn reset(&mut self) {
        self.thresholds = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::landmark_index as idx;

    fn upright_frame() -> Vec<Landmark> {
        let mut frame = vec![Landmark::new(0.5, 0.5); POSE_LANDMARK_COUNT];
        frame[idx::NOSE] = Landmark::new(0.5, 0.2);
        frame[idx::LEFT_SHOULDER] = Landmark::new(0.4, 0.4);
        frame[idx::RIGHT_SHOULDER] = Landmark::new(0.6, 0.4);
        frame[idx::LEFT_HIP] = Landmark::new(0.4, 0.7);
        frame[idx::RIGHT_HIP] = Landmark::new(0.6, 0.7);
        frame
    }

    #[test]
    fn test_margins_applied_per_metric_direction() {
        let baseline = PoseMetrics {
            torso_tilt: 2.0,
            shoulder_tilt: 1.5,
            neck_flex: 4.0,
            head_z_delta: -0.18,
            shoulder_asym_y: 0.01,
        };
        let thresholds = CalibrationThresholds::from_baseline(&baseline);

        assert!((thresholds.torso_tilt - 5.0).abs() < 1e-9);
        assert!((thresholds.shoulder_tilt - 4.5).abs() < 1e-9);
        assert!((thresholds.neck_flex - 7.0).abs() < 1e-9);
        // Bad direction for head_z_delta is less-than, so the margin tightens
        // the threshold downward
        assert!((thresholds.head_z_delta - (-0.20)).abs() < 1e-9);
        assert!((thresholds.shoulder_asym_y - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_calibrate_succeeds_once() {
        let mut calibrator = Calibrator::new();
        assert!(!calibrator.is_calibrated());

        assert!(calibrator.try_calibrate(&upright_frame()));
        assert!(calibrator.is_calibrated());

        // Second attempt is a no-op
        assert!(!calibrator.try_calibrate(&upright_frame()));
    }

    #[test]
    fn test_calibrate_skipped_without_usable_pose() {
        let mut calibrator = Calibrator::new();
        let short = vec![Landmark::new(0.5, 0.5); 4];

        assert!(!calibrator.try_calibrate(&short));
        assert!(!calibrator.is_calibrated());
        assert!(calibrator.thresholds().is_none());
    }

    #[test]
    fn test_reset_clears_baseline() {
        let mut calibrator = Calibrator::new();
        calibrator.try_calibrate(&upright_frame());
        calibrator.reset();

        assert!(!calibrator.is_calibrated());
        // A new session can calibrate again after reset
        assert!(calibrator.try_calibrate(&upright_frame()));
    }

    #[test]
    fn test_thresholds_json_round_trip() {
        let baseline = PoseMetrics {
            torso_tilt: 2.0,
            shoulder_tilt: 1.0,
            neck_flex: 3.0,
            head_z_delta: -0.15,
            shoulder_asym_y: 0.005,
        };
        let thresholds = CalibrationThresholds::from_baseline(&baseline);

        let json = thresholds.to_json().unwrap();
        let loaded = CalibrationThresholds::from_json(&json).unwrap();
        assert_eq!(thresholds, loaded);
    }
}
