//! Core types for the Posturely scoring engine
//!
//! This module defines the value objects that flow through each stage of the
//! pipeline: landmarks, derived pose metrics, score results, and per-minute
//! session samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of landmarks in a full-body pose, fixed by the upstream pose model.
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Landmark indices used by the metrics extractor (pose model convention).
pub mod landmark_index {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
}

/// A single tracked body keypoint with image-normalized coordinates.
///
/// `x` and `y` are normalized to [0, 1] relative to frame width/height.
/// Depth and confidence fields are optional; the 2D scoring path ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<f32>,
}

impl Landmark {
    /// 2D landmark with no depth or confidence data
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
            presence: None,
        }
    }
}

/// Tracking source for provenance on recorded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingSource {
    Phone,
    Laptop,
    Earbuds,
}

impl TrackingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingSource::Phone => "phone",
            TrackingSource::Laptop => "laptop",
            TrackingSource::Earbuds => "earbuds",
        }
    }
}

/// Five scalar posture metrics derived from one landmark frame.
///
/// Derived fresh on every frame; never persisted. Angles are degrees from
/// the vertical axis, always non-negative. `head_z_delta` is signed: more
/// negative means the head sits higher relative to the shoulder line, so it
/// serves as a forward-head proxy in the 2D path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseMetrics {
    /// Trunk lean, degrees from vertical (>= 0)
    pub torso_tilt: f64,
    /// Shoulder height difference scaled by 100 for sensitivity (>= 0)
    pub shoulder_tilt: f64,
    /// Head lean relative to shoulder center, degrees from vertical (>= 0)
    pub neck_flex: f64,
    /// nose.y - shoulder_center.y, signed
    pub head_z_delta: f64,
    /// Unscaled shoulder height difference (>= 0)
    pub shoulder_asym_y: f64,
}

/// Metric that violated its threshold during scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFlag {
    TorsoTilt,
    ShoulderTilt,
    NeckFlex,
    ForwardHead,
    ShoulderAsymmetry,
}

impl MetricFlag {
    /// Human-readable name shown in the UI layer
    pub fn label(&self) -> &'static str {
        match self {
            MetricFlag::TorsoTilt => "Torso tilt",
            MetricFlag::ShoulderTilt => "Shoulder tilt",
            MetricFlag::NeckFlex => "Neck flexion",
            MetricFlag::ForwardHead => "Forward head",
            MetricFlag::ShoulderAsymmetry => "Shoulder asymmetry",
        }
    }
}

/// Result of scoring one frame: clamped score plus violated-metric flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Posture score in [0, 100]
    pub score: i32,
    /// Metrics that exceeded their thresholds, in evaluation order
    pub flags: Vec<MetricFlag>,
}

/// Posture status shown alongside the smoothed score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostureStatus {
    Calibrating,
    Good,
    Ok,
    Bad,
}

impl PostureStatus {
    /// Classify a smoothed score. `calibrated = false` always reports
    /// `Calibrating`, matching the tracking UI.
    pub fn classify(smoothed_score: i32, calibrated: bool) -> Self {
        if !calibrated {
            PostureStatus::Calibrating
        } else if smoothed_score >= 80 {
            PostureStatus::Good
        } else if smoothed_score >= 60 {
            PostureStatus::Ok
        } else {
            PostureStatus::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostureStatus::Calibrating => "CALIBRATING",
            PostureStatus::Good => "GOOD",
            PostureStatus::Ok => "OK",
            PostureStatus::Bad => "BAD",
        }
    }
}

/// One recorded posture sample: the average smoothed score over one minute
/// of visible tracking time. Emitted by the minute recorder; persistence of
/// these records is the host application's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureSample {
    /// Session this sample belongs to
    pub session_id: uuid::Uuid,
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Wall-clock time, `HH:MM:SS`
    pub time: String,
    /// Truncated mean of the per-second smoothed scores in this minute
    pub average_score: i32,
    /// Source that produced the underlying frames
    pub tracking_source: TrackingSource,
    /// Epoch milliseconds at emission
    pub timestamp_ms: i64,
    /// Number of per-second scores that contributed
    pub samples_count: usize,
}

impl PostureSample {
    pub(crate) fn at(
        session_id: uuid::Uuid,
        source: TrackingSource,
        average_score: i32,
        samples_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            average_score,
            tracking_source: source,
            timestamp_ms: now.timestamp_millis(),
            samples_count,
        }
    }
}
