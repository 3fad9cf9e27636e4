//! posture.session.v1 encoding
//!
//! Encodes a finished tracking session and its per-minute samples into a
//! versioned JSON report that hosts can store or sync. Ensures all required
//! fields are present and properly formatted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::types::{PostureSample, TrackingSource};
use crate::{ENGINE_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "posture.session.v1";

/// Producer metadata identifying the engine instance that built the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Session-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSession {
    pub session_id: Uuid,
    pub tracking_source: TrackingSource,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub calibrated: bool,
    /// Seconds the subject was visible and being scored
    pub active_seconds: u64,
}

/// Aggregates over the per-minute samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub average_score: i32,
    pub min_score: i32,
    pub max_score: i32,
    pub minutes_recorded: usize,
}

/// The main posture.session.v1 payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Report schema version identifier
    pub report_version: String,
    pub producer: ReportProducer,
    pub session: ReportSession,
    /// Per-minute samples in chronological order
    pub samples: Vec<PostureSample>,
    /// Absent when the session produced no samples
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReportSummary>,
}

/// Report encoder for producing posture.session.v1 payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode a finished session into a report payload
    pub fn encode(&self, session: ReportSession, samples: Vec<PostureSample>) -> SessionReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let summary = Self::build_summary(&samples);

        SessionReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            session,
            samples,
            summary,
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        session: ReportSession,
        samples: Vec<PostureSample>,
    ) -> Result<String, EngineError> {
        let report = self.encode(session, samples);
        serde_json::to_string_pretty(&report).map_err(EngineError::JsonError)
    }

    fn build_summary(samples: &[PostureSample]) -> Option<ReportSummary> {
        if samples.is_empty() {
            return None;
        }

        let total: i64 = samples.iter().map(|s| s.average_score as i64).sum();
        let min_score = samples.iter().map(|s| s.average_score).min().unwrap_or(0);
        let max_score = samples.iter().map(|s| s.average_score).max().unwrap_or(0);

        Some(ReportSummary {
            average_score: (total / samples.len() as i64) as i32,
            min_score,
            max_score,
            minutes_recorded: samples.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(session_id: Uuid, score: i32, minute: u32) -> PostureSample {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap();
        PostureSample::at(session_id, TrackingSource::Laptop, score, 60, at)
    }

    fn test_session(session_id: Uuid) -> ReportSession {
        ReportSession {
            session_id,
            tracking_source: TrackingSource::Laptop,
            started_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 3, 0).unwrap(),
            calibrated: true,
            active_seconds: 180,
        }
    }

    #[test]
    fn test_encode_session_report() {
        let session_id = Uuid::new_v4();
        let samples = vec![
            sample(session_id, 90, 1),
            sample(session_id, 70, 2),
            sample(session_id, 83, 3),
        ];

        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(test_session(session_id), samples);

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.version, ENGINE_VERSION);
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.samples.len(), 3);

        // (90 + 70 + 83) / 3 = 81
        let summary = report.summary.unwrap();
        assert_eq!(summary.average_score, 81);
        assert_eq!(summary.min_score, 70);
        assert_eq!(summary.max_score, 90);
        assert_eq!(summary.minutes_recorded, 3);
    }

    #[test]
    fn test_summary_average_truncates() {
        let session_id = Uuid::new_v4();
        let samples = vec![sample(session_id, 85, 1), sample(session_id, 80, 2)];

        let report = ReportEncoder::new().encode(test_session(session_id), samples);

        // 165 / 2 = 82.5, truncated
        assert_eq!(report.summary.unwrap().average_score, 82);
    }

    #[test]
    fn test_empty_session_has_no_summary() {
        let session_id = Uuid::new_v4();
        let report = ReportEncoder::new().encode(test_session(session_id), vec![]);

        assert!(report.summary.is_none());

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("summary"));
    }

    #[test]
    fn test_encode_to_json() {
        let session_id = Uuid::new_v4();
        let samples = vec![sample(session_id, 88, 1)];

        let json = ReportEncoder::new()
            .encode_to_json(test_session(session_id), samples)
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["report_version"], "posture.session.v1");
        assert!(parsed.get("producer").is_some());
        assert!(parsed.get("session").is_some());
        assert_eq!(parsed["samples"][0]["average_score"], 88);
    }
}
