//! Error types for Posturely Core
//!
//! Errors only occur at the I/O boundary: parsing frame payloads, validating
//! schemas, encoding reports. Per-frame scoring and smoothing are total
//! functions and never return `Result`.

use thiserror::Error;

/// Errors that can occur while parsing or encoding frame data
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to parse frame payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema validation failed: {0}")]
    SchemaError(#[from] crate::schema::ValidationError),

    #[error("Unsupported tracking source: {0}")]
    UnsupportedSource(String),
}
