//! Metrics extraction
//!
//! Derives the five scalar posture metrics from one frame of normalized 2D
//! landmarks. All angle metrics are measured from the vertical axis (a
//! perfectly upright subject scores 0 on every angle).

use crate::types::{landmark_index as idx, Landmark, PoseMetrics, POSE_LANDMARK_COUNT};

/// Metrics extractor for deriving posture metrics from landmark frames
pub struct MetricsExtractor;

impl MetricsExtractor {
    /// Derive [`PoseMetrics`] from a landmark frame.
    ///
    /// A frame with fewer than [`POSE_LANDMARK_COUNT`] landmarks carries no
    /// usable pose and yields all-zero metrics. This is a defined degenerate
    /// case, not an error.
    pub fn extract(landmarks: &[Landmark]) -> PoseMetrics {
        if landmarks.len() < POSE_LANDMARK_COUNT {
            return PoseMetrics::default();
        }

        let nose = landmarks[idx::NOSE];
        let left_shoulder = landmarks[idx::LEFT_SHOULDER];
        let right_shoulder = landmarks[idx::RIGHT_SHOULDER];
        let left_hip = landmarks[idx::LEFT_HIP];
        let right_hip = landmarks[idx::RIGHT_HIP];

        let shoulder_center = midpoint(left_shoulder, right_shoulder);
        let torso_center = midpoint(left_hip, right_hip);

        let torso_tilt = angle_from_vertical(shoulder_center, torso_center);
        let shoulder_tilt = shoulder_tilt(left_shoulder, right_shoulder);
        let neck_flex = angle_from_vertical((nose.x, nose.y), shoulder_center);
        let head_z_delta = (nose.y - shoulder_center.1) as f64;
        let shoulder_asym_y = (left_shoulder.y - right_shoulder.y).abs() as f64;

        PoseMetrics {
            torso_tilt,
            shoulder_tilt,
            neck_flex,
            head_z_delta,
            shoulder_asym_y,
        }
    }
}

fn midpoint(a: Landmark, b: Landmark) -> (f32, f32) {
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Angle of the segment `from -> to` measured from the vertical axis,
/// in non-negative degrees.
///
/// Uses `atan2(dx, dy)` (not the usual `atan2(dy, dx)`) so that a segment
/// pointing straight down the image gives 0; pointing straight up gives 180.
/// Coincident points give `atan2(0, 0) == 0` rather than NaN.
pub fn angle_from_vertical(from: (f32, f32), to: (f32, f32)) -> f64 {
    let dx = (to.0 - from.0) as f64;
    let dy = (to.1 - from.1) as f64;
    (dx.atan2(dy) * 180.0 / std::f64::consts::PI).abs()
}

/// Shoulder height difference scaled by 100 for sensitivity
pub fn shoulder_tilt(left_shoulder: Landmark, right_shoulder: Landmark) -> f64 {
    ((left_shoulder.y - right_shoulder.y) as f64).abs() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Full 33-landmark frame, upright and symmetric: nose directly above the
    /// shoulder midpoint, shoulders directly above the hips, equal shoulder y.
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
    fn test_short_frame_yields_zero_metrics() {
        assert_eq!(MetricsExtractor::extract(&[]), PoseMetrics::default());

        let short = vec![Landmark::new(0.5, 0.5); POSE_LANDMARK_COUNT - 1];
        assert_eq!(MetricsExtractor::extract(&short), PoseMetrics::default());
    }

    #[test]
    fn test_upright_frame_scores_zero_angles() {
        let metrics = MetricsExtractor::extract(&upright_frame());

        assert!(metrics.torso_tilt.abs() < 1e-9);
        assert!(metrics.shoulder_tilt.abs() < 1e-9);
        assert!(metrics.neck_flex.abs() < 1e-9);
        assert!(metrics.shoulder_asym_y.abs() < 1e-9);
        // Head above the shoulder line: negative delta
        assert!((metrics.head_z_delta - (-0.2)).abs() < 1e-6);
    }

    #[test]
    fn test_angle_from_vertical() {
        // Straight down: 0 degrees
        assert!(angle_from_vertical((0.5, 0.2), (0.5, 0.8)).abs() < 1e-9);
        // Straight up: atan2(0, -dy) is pi, so the reading is 180 degrees
        assert!((angle_from_vertical((0.5, 0.8), (0.5, 0.2)) - 180.0).abs() < 1e-9);
        // 45 degree lean
        let angle = angle_from_vertical((0.0, 0.0), (0.5, 0.5));
        assert!((angle - 45.0).abs() < 1e-9);
        // Horizontal: 90 degrees
        let angle = angle_from_vertical((0.0, 0.5), (1.0, 0.5));
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_points_treated_as_zero_angle() {
        let angle = angle_from_vertical((0.5, 0.4), (0.5, 0.4));
        assert_eq!(angle, 0.0);
        assert!(!angle.is_nan());
    }

    #[test]
    fn test_shoulder_tilt_scaling() {
        let left = Landmark::new(0.4, 0.45);
        let right = Landmark::new(0.6, 0.40);
        // |0.45 - 0.40| * 100 = 5.0, sign-independent. The inputs are f32, so
        // allow for single-precision representation error.
        assert!((shoulder_tilt(left, right) - 5.0).abs() < 1e-4);
        assert!((shoulder_tilt(right, left) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_leaning_torso_raises_torso_tilt() {
        let mut frame = upright_frame();
        // Shift both shoulders sideways: trunk now leans relative to the hips
        frame[idx::LEFT_SHOULDER] = Landmark::new(0.55, 0.4);
        frame[idx::RIGHT_SHOULDER] = Landmark::new(0.75, 0.4);

        let metrics = MetricsExtractor::extract(&frame);
        // dx = 0.15 over dy = 0.3 -> atan2(0.15, 0.3) ~= 26.57 degrees
        assert!((metrics.torso_tilt - 26.565).abs() < 1e-3);
    }

    #[test]
    fn test_shoulder_metrics_track_height_difference() {
        let mut frame = upright_frame();
        frame[idx::LEFT_SHOULDER] = Landmark::new(0.4, 0.44);

        let metrics = MetricsExtractor::extract(&frame);
        assert!((metrics.shoulder_asym_y - 0.04).abs() < 1e-6);
        assert!((metrics.shoulder_tilt - 4.0).abs() < 1e-4);
    }
}
