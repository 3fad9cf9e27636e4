//! Score engine
//!
//! Maps the five posture metrics onto a single 0-100 score. Penalties are
//! independently additive with no interaction terms; each one is proportional
//! to the excess over its threshold, capped per metric, and truncated to an
//! integer before subtraction. The truncation order is load-bearing: recorded
//! session history was produced with exactly this arithmetic.

use crate::calibration::CalibrationThresholds;
use crate::types::{MetricFlag, PoseMetrics, ScoreResult};

/// Per-metric penalty shape: excess over threshold is divided by `divisor`,
/// scaled by `max_penalty`, and capped at `max_penalty`.
struct PenaltyRule {
    divisor: f64,
    max_penalty: f64,
}

const TORSO_TILT_PENALTY: PenaltyRule = PenaltyRule {
    divisor: 20.0,
    max_penalty: 25.0,
};
const SHOULDER_TILT_PENALTY: PenaltyRule = PenaltyRule {
    divisor: 20.0,
    max_penalty: 15.0,
};
const NECK_FLEX_PENALTY: PenaltyRule = PenaltyRule {
    divisor: 20.0,
    max_penalty: 35.0,
};
const HEAD_Z_PENALTY: PenaltyRule = PenaltyRule {
    divisor: 0.10,
    max_penalty: 45.0,
};
const SHOULDER_ASYM_PENALTY: PenaltyRule = PenaltyRule {
    divisor: 0.10,
    max_penalty: 20.0,
};

impl PenaltyRule {
    fn penalty(&self, excess: f64) -> i32 {
        (excess / self.divisor * self.max_penalty).min(self.max_penalty) as i32
    }
}

/// Score one frame's metrics against the session thresholds.
///
/// Falls back to [`CalibrationThresholds::default`] when no calibration
/// exists. The score starts at 100; each metric past its threshold in the bad
/// direction (greater-than everywhere except `head_z_delta`, where more
/// negative is worse) subtracts a capped penalty and appends its flag.
pub fn calculate_score(
    metrics: &PoseMetrics,
    thresholds: Option<&CalibrationThresholds>,
) -> ScoreResult {
    let defaults = CalibrationThresholds::default();
    let thresholds = thresholds.unwrap_or(&defaults);

    let mut score = 100;
    let mut flags = Vec::new();

    if metrics.torso_tilt > thresholds.torso_tilt {
        score -= TORSO_TILT_PENALTY.penalty(metrics.torso_tilt - thresholds.torso_tilt);
        flags.push(MetricFlag::TorsoTilt);
    }

    if metrics.shoulder_tilt > thresholds.shoulder_tilt {
        score -= SHOULDER_TILT_PENALTY.penalty(metrics.shoulder_tilt - thresholds.shoulder_tilt);
        flags.push(MetricFlag::ShoulderTilt);
    }

    if metrics.neck_flex > thresholds.neck_flex {
        score -= NECK_FLEX_PENALTY.penalty(metrics.neck_flex - thresholds.neck_flex);
        flags.push(MetricFlag::NeckFlex);
    }

    if metrics.head_z_delta < thresholds.head_z_delta {
        score -= HEAD_Z_PENALTY.penalty(thresholds.head_z_delta - metrics.head_z_delta);
        flags.push(MetricFlag::ForwardHead);
    }

    if metrics.shoulder_asym_y > thresholds.shoulder_asym_y {
        score -= SHOULDER_ASYM_PENALTY.penalty(metrics.shoulder_asym_y - thresholds.shoulder_asym_y);
        flags.push(MetricFlag::ShoulderAsymmetry);
    }

    ScoreResult {
        score: score.clamp(0, 100),
        flags,
    }
}

/// Weight of the new observation in the exponential moving average
const SMOOTHING_WEIGHT: f64 = 0.3;

/// Exponentially smooth a score across update ticks.
///
/// The first nonzero observation passes through unchanged so the display
/// does not ramp up slowly from zero at session start. Subsequent ticks blend
/// 30% new data with 70% history, rounded to the nearest integer and clamped
/// to [0, 100].
pub fn smooth_score(new_score: i32, previous_smoothed: i32) -> i32 {
    if previous_smoothed == 0 {
        return new_score;
    }

    let smoothed = (new_score as f64) * SMOOTHING_WEIGHT
        + (previous_smoothed as f64) * (1.0 - SMOOTHING_WEIGHT);
    (smoothed.round() as i32).clamp(0, 100)
}
