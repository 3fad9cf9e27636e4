//! Head-tilt scoring path
//!
//! Motion-sensor earbuds report a single head-tilt angle instead of camera
//! landmarks. The score comes from a banded taper over the deviation's excess
//! past the calibrated threshold, with progressively steeper slopes, then
//! feeds the same smoothing, status, and alert machinery as the camera path.

use serde::{Deserialize, Serialize};

/// Threshold used until the wearer calibrates
pub const DEFAULT_TILT_THRESHOLD: f64 = 12.0;
/// Margin added to the calibrated baseline angle
pub const TILT_MARGIN: f64 = 8.0;
/// Angles at or past this are too extreme to accept as a baseline
pub const MAX_CALIBRATION_ANGLE: f64 = 30.0;
/// Neutral score shown while uncalibrated
pub const NEUTRAL_SCORE: i32 = 50;

/// Banded score over a tilt deviation (absolute degrees from level).
///
/// Inside the threshold: 100. Each 5-10 degree band past it tapers faster,
/// bottoming out at 0. Band floors keep transitions monotonic.
pub fn tilt_score(deviation: f64, threshold: f64) -> i32 {
    if deviation <= threshold {
        100
    } else if deviation <= threshold + 5.0 {
        let excess = deviation - threshold;
        ((100.0 - excess * 3.0) as i32).max(80)
    } else if deviation <= threshold + 10.0 {
        let excess = deviation - threshold - 5.0;
        ((80.0 - excess * 4.0) as i32).max(60)
    } else if deviation <= threshold + 20.0 {
        let excess = deviation - threshold - 10.0;
        ((60.0 - excess * 2.0) as i32).max(30)
    } else {
        let excess = deviation - threshold - 20.0;
        ((30.0 - excess) as i32).max(0)
    }
}

/// One-shot tilt calibration plus scoring for an earbud session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TiltScorer {
    threshold: Option<f64>,
}

impl TiltScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the current head angle as the wearer's baseline. Rejected when
    /// the angle is too extreme to be a plausible resting posture.
    pub fn try_calibrate(&mut self, tilt_deg: f64) -> bool {
        if self.threshold.is_some() || tilt_deg.abs() >= MAX_CALIBRATION_ANGLE {
            return false;
        }
        self.threshold = Some(tilt_deg.abs() + TILT_MARGIN);
        true
    }

    pub fn is_calibrated(&self) -> bool {
        self.threshold.is_some()
    }

    /// Active threshold: calibrated baseline + margin, or the default
    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_TILT_THRESHOLD)
    }

    /// Raw score for the current head angle. Shows the neutral score while
    /// calibration has not happened yet.
    pub fn score(&self, tilt_deg: f64) -> i32 {
        if !self.is_calibrated() {
            return NEUTRAL_SCORE;
        }
        tilt_score(tilt_deg.abs(), self.threshold())
    }

    /// Drop the baseline for a fresh session
    pub fn reset(&mut self) {
        self.threshold = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_threshold_scores_100() {
        assert_eq!(tilt_score(0.0, 12.0), 100);
        assert_eq!(tilt_score(12.0, 12.0), 100);
    }

    #[test]
    fn test_band_edges_are_monotonic() {
        // First band: slope 3 per degree, floored at 80
        assert_eq!(tilt_score(13.0, 12.0), 97);
        assert_eq!(tilt_score(17.0, 12.0), 85);
        // Second band: slope 4, floored at 60
        assert_eq!(tilt_score(18.0, 12.0), 76);
        assert_eq!(tilt_score(22.0, 12.0), 60);
        // Third band: slope 2, floored at 30
        assert_eq!(tilt_score(23.0, 12.0), 58);
        assert_eq!(tilt_score(32.0, 12.0), 40);
        // Final band: slope 1, floored at 0
        assert_eq!(tilt_score(33.0, 12.0), 29);
        assert_eq!(tilt_score(100.0, 12.0), 0);

        // No band transition ever raises the score
        let mut previous = 100;
        for tenths in 0..600 {
            let score = tilt_score(tenths as f64 / 10.0, 12.0);
            assert!(score <= previous, "score rose at {} deg", tenths as f64 / 10.0);
            previous = score;
        }
    }

    #[test]
    fn test_calibration_gate_at_30_degrees() {
        let mut scorer = TiltScorer::new();
        assert!(!scorer.try_calibrate(30.0));
        assert!(!scorer.try_calibrate(-45.0));
        assert!(!scorer.is_calibrated());

        assert!(scorer.try_calibrate(-4.0));
        // Baseline |−4| + 8 margin
        assert!((scorer.threshold() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_uncalibrated_scores_neutral() {
        let scorer = TiltScorer::new();
        assert_eq!(scorer.score(0.0), NEUTRAL_SCORE);
        assert_eq!(scorer.score(60.0), NEUTRAL_SCORE);
    }

    #[test]
    fn test_calibrate_once_then_reset() {
        let mut scorer = TiltScorer::new();
        assert!(scorer.try_calibrate(2.0));
        assert!(!scorer.try_calibrate(5.0));
        assert_eq!(scorer.score(2.0), 100);

        scorer.reset();
        assert!(!scorer.is_calibrated());
        assert!(scorer.try_calibrate(5.0));
        assert!((scorer.threshold() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_deviation_uses_absolute_angle() {
        let mut scorer = TiltScorer::new();
        scorer.try_calibrate(0.0);
        assert_eq!(scorer.score(-9.0), scorer.score(9.0));
    }
}
