//! pose.frame.v1 schema definition
//!
//! A device-agnostic wire format for pose landmark frames. Any producer
//! (phone camera, laptop webcam bridge, recorded capture) can emit frames in
//! this shape; the engine consumes them without knowing the detector behind
//! them. An empty landmark list is a valid frame meaning "no subject
//! detected".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Landmark, TrackingSource, POSE_LANDMARK_COUNT};

/// Current schema version
pub const SCHEMA_VERSION: &str = "pose.frame.v1";

/// Frame producer information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSource {
    /// Tracking device category (phone, laptop, earbuds)
    pub tracking_source: TrackingSource,
    /// Device model (e.g., "MacBook Pro", "Pixel 8")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    /// Unique device identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// The main pose.frame.v1 record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Schema version identifier
    pub schema_version: String,
    /// Unique frame identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,
    /// Capture timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Producer information
    pub source: FrameSource,
    /// Landmark list: empty (no detection) or the full detector output
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

impl PoseFrame {
    /// Create a new frame with a generated frame ID
    pub fn new(
        timestamp: DateTime<Utc>,
        source: FrameSource,
        landmarks: Vec<Landmark>,
    ) -> Self {
        PoseFrame {
            schema_version: SCHEMA_VERSION.to_string(),
            frame_id: Some(uuid::Uuid::new_v4().to_string()),
            timestamp,
            source,
            landmarks,
        }
    }

    /// Validate the frame against the schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        // Empty means "no detection"; anything else must be a full detector
        // output so the fixed landmark indices are meaningful
        if !self.landmarks.is_empty() && self.landmarks.len() != POSE_LANDMARK_COUNT {
            return Err(ValidationError::UnexpectedLandmarkCount {
                expected: POSE_LANDMARK_COUNT,
                actual: self.landmarks.len(),
            });
        }

        for (index, lm) in self.landmarks.iter().enumerate() {
            if !lm.x.is_finite() || !lm.y.is_finite() {
                return Err(ValidationError::NonFiniteCoordinate { index });
            }
        }

        Ok(())
    }
}

/// Validation errors for pose frames
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Unexpected landmark count: expected 0 or {expected}, got {actual}")]
    UnexpectedLandmarkCount { expected: usize, actual: usize },

    #[error("Non-finite coordinate at landmark {index}")]
    NonFiniteCoordinate { index: usize },
}

/// Parser for frame payloads
pub struct FrameAdapter;

impl FrameAdapter {
    /// Parse a JSON string containing a single frame
    pub fn parse_frame(json: &str) -> Result<PoseFrame, EngineError> {
        let frame: PoseFrame = serde_json::from_str(json)?;
        Ok(frame)
    }

    /// Parse a JSON string containing an array of frames
    pub fn parse_array(json: &str) -> Result<Vec<PoseFrame>, EngineError> {
        let frames: Vec<PoseFrame> = serde_json::from_str(json)?;
        Ok(frames)
    }

    /// Parse NDJSON (newline-delimited JSON) containing frames
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<PoseFrame>, EngineError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<PoseFrame>(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    return Err(EngineError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }

    /// Validate a batch of frames, returning only the failures
    pub fn validate_frames(frames: &[PoseFrame]) -> Vec<ValidationFailure> {
        frames
            .iter()
            .enumerate()
            .filter_map(|(index, frame)| {
                frame.validate().err().map(|error| ValidationFailure {
                    index,
                    frame_id: frame.frame_id.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// A single failed frame from batch validation
#[derive(Debug)]
pub struct ValidationFailure {
    pub index: usize,
    pub frame_id: Option<String>,
    pub error: ValidationError,
}
