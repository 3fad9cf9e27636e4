//! Posturely Core - On-device posture scoring engine
//!
//! Turns camera pose landmarks into a live 0-100 posture score through a
//! deterministic pipeline: metric extraction → threshold scoring → temporal
//! smoothing → status/alerting → per-minute aggregation.
//!
//! ## Modules
//!
//! - **Camera Pipeline**: Score full-body landmark frames (phone, laptop)
//! - **Tilt Pipeline**: Score single-angle head-tilt streams (earbuds)
//!
//! The per-frame path is pure and allocation-light; parsing, validation, and
//! report encoding live at the edges.

pub mod alert;
pub mod calibration;
pub mod error;
pub mod metrics;
pub mod recorder;
pub mod report;
pub mod schema;
pub mod score;
pub mod session;
pub mod source;
pub mod tilt;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use alert::{AlertDecision, AlertMonitor, AlertSink};
pub use calibration::{CalibrationThresholds, Calibrator};
pub use error::EngineError;
pub use metrics::MetricsExtractor;
pub use score::{calculate_score, smooth_score};
pub use session::{TickUpdate, TrackingSession};
pub use tilt::{tilt_score, TiltScorer};
pub use types::{
    Landmark, MetricFlag, PoseMetrics, PostureSample, PostureStatus, ScoreResult, TrackingSource,
};

// Schema exports
pub use schema::{FrameAdapter, PoseFrame, SCHEMA_VERSION};

// Report exports
pub use report::{ReportEncoder, SessionReport, REPORT_VERSION};

/// Engine version embedded in all session reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "posturely-core";
