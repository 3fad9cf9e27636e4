//! FFI bindings for Posturely Core
//!
//! This module provides C-compatible functions for calling the engine from
//! host apps (Kotlin/Swift/JS bridges). All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `posturely_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, TimeZone, Utc};

use crate::calibration::CalibrationThresholds;
use crate::error::EngineError;
use crate::metrics::MetricsExtractor;
use crate::schema::FrameAdapter;
use crate::score::{calculate_score, smooth_score};
use crate::session::TrackingSession;
use crate::types::{Landmark, TrackingSource};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Parse a pose.frame.v1 payload and return its landmarks
fn parse_frame_landmarks(json: &str) -> Result<Vec<Landmark>, EngineError> {
    let frame = FrameAdapter::parse_frame(json)?;
    frame.validate()?;
    Ok(frame.landmarks)
}

fn parse_source(s: &str) -> Option<TrackingSource> {
    match s {
        "phone" => Some(TrackingSource::Phone),
        "laptop" => Some(TrackingSource::Laptop),
        "earbuds" => Some(TrackingSource::Earbuds),
        _ => None,
    }
}

fn timestamp_from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a single pose.frame.v1 JSON payload against default or provided
/// thresholds. Returns a JSON object with `metrics`, `score`, and `flags`.
///
/// # Safety
/// - `frame_json` must be a valid null-terminated C string.
/// - `thresholds_json` may be NULL (default thresholds) or a valid
///   null-terminated C string containing calibration thresholds JSON.
/// - Returns a newly allocated string that must be freed with
///   `posturely_free_string`.
/// - Returns NULL on error; call `posturely_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn posturely_score_frame(
    frame_json: *const c_char,
    thresholds_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let frame_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame JSON string pointer");
            return ptr::null_mut();
        }
    };

    let landmarks = match parse_frame_landmarks(&frame_str) {
        Ok(lm) => lm,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let thresholds = if thresholds_json.is_null() {
        None
    } else {
        let thresholds_str = match cstr_to_string(thresholds_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid thresholds string pointer");
                return ptr::null_mut();
            }
        };
        match CalibrationThresholds::from_json(&thresholds_str) {
            Ok(t) => Some(t),
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let metrics = MetricsExtractor::extract(&landmarks);
    let result = calculate_score(&metrics, thresholds.as_ref());

    let payload = serde_json::json!({
        "metrics": metrics,
        "score": result.score,
        "flags": result.flags,
    });
    match serde_json::to_string(&payload) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Blend a new raw score into the previous smoothed score.
///
/// # Safety
/// - Always safe to call; pure function exposed for host-side smoothing.
#[no_mangle]
pub unsafe extern "C" fn posturely_smooth_score(new_score: i32, previous: i32) -> i32 {
    smooth_score(new_score, previous)
}

// ============================================================================
// Stateful Session API
// ============================================================================

/// Opaque handle to a TrackingSession
pub struct PostureSessionHandle {
    session: TrackingSession,
}

/// Create a new tracking session for the given source
/// ("phone", "laptop", or "earbuds").
///
/// # Safety
/// - `source` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `posturely_session_free`.
/// - Returns NULL on error; call `posturely_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn posturely_session_new(
    source: *const c_char,
) -> *mut PostureSessionHandle {
    clear_last_error();

    let source_str = match cstr_to_string(source) {
        Some(s) => s,
        None => {
            set_last_error("Invalid source string pointer");
            return ptr::null_mut();
        }
    };

    let source = match parse_source(&source_str) {
        Some(s) => s,
        None => {
            set_last_error(&EngineError::UnsupportedSource(source_str).to_string());
            return ptr::null_mut();
        }
    };

    let handle = Box::new(PostureSessionHandle {
        session: TrackingSession::new(source),
    });
    Box::into_raw(handle)
}

/// Free a tracking session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posturely_session_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posturely_session_free(session: *mut PostureSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Calibrate the session from a pose.frame.v1 JSON payload.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posturely_session_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns 1 if calibration was captured, 0 if the frame was rejected
///   (already calibrated or too few landmarks), -1 on error.
#[no_mangle]
pub unsafe extern "C" fn posturely_session_calibrate(
    session: *mut PostureSessionHandle,
    frame_json: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;

    let frame_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame JSON string pointer");
            return -1;
        }
    };

    let landmarks = match parse_frame_landmarks(&frame_str) {
        Ok(lm) => lm,
        Err(e) => {
            set_last_error(&e.to_string());
            return -1;
        }
    };

    if handle.session.try_calibrate(&landmarks) {
        1
    } else {
        0
    }
}

/// Process one frame tick and return the tick update as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posturely_session_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with
///   `posturely_free_string`.
/// - Returns NULL on error; call `posturely_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn posturely_session_tick(
    session: *mut PostureSessionHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let frame_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame JSON string pointer");
            return ptr::null_mut();
        }
    };

    let landmarks = match parse_frame_landmarks(&frame_str) {
        Ok(lm) => lm,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let update = handle.session.tick(&landmarks);
    match serde_json::to_string(&update) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Advance the session's one-second timer. Returns a per-minute sample as
/// JSON when a minute boundary completes, NULL otherwise.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posturely_session_new`.
/// - `timestamp_ms` is milliseconds since the Unix epoch.
/// - A NULL return with no error set means no sample was due; check
///   `posturely_last_error` to distinguish.
/// - Non-NULL returns must be freed with `posturely_free_string`.
#[no_mangle]
pub unsafe extern "C" fn posturely_session_second_tick(
    session: *mut PostureSessionHandle,
    timestamp_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let now = match timestamp_from_millis(timestamp_ms) {
        Some(t) => t,
        None => {
            set_last_error("Invalid timestamp");
            return ptr::null_mut();
        }
    };

    match handle.session.second_tick(now) {
        Some(sample) => match serde_json::to_string(&sample) {
            Ok(json) => string_to_cstr(&json),
            Err(e) => {
                set_last_error(&e.to_string());
                ptr::null_mut()
            }
        },
        None => ptr::null_mut(),
    }
}

/// Stop the session, flushing any partial minute. Returns the final sample as
/// JSON, or NULL when no scores were pending.
///
/// # Safety
/// - `session` must be a valid pointer returned by `posturely_session_new`.
/// - `timestamp_ms` is milliseconds since the Unix epoch.
/// - A NULL return with no error set means there was nothing to flush.
/// - Non-NULL returns must be freed with `posturely_free_string`.
#[no_mangle]
pub unsafe extern "C" fn posturely_session_stop(
    session: *mut PostureSessionHandle,
    timestamp_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *session;

    let now = match timestamp_from_millis(timestamp_ms) {
        Some(t) => t,
        None => {
            set_last_error("Invalid timestamp");
            return ptr::null_mut();
        }
    };

    match handle.session.stop(now) {
        Some(sample) => match serde_json::to_string(&sample) {
            Ok(json) => string_to_cstr(&json),
            Err(e) => {
                set_last_error(&e.to_string());
                ptr::null_mut()
            }
        },
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Posturely functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Posturely function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn posturely_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Posturely call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn posturely_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn posturely_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn upright_frame_json() -> CString {
        let mut landmarks: Vec<serde_json::Value> = (0..33)
            .map(|_| serde_json::json!({"x": 0.5, "y": 0.55}))
            .collect();
        landmarks[0] = serde_json::json!({"x": 0.5, "y": 0.37});
        landmarks[11] = serde_json::json!({"x": 0.4, "y": 0.4});
        landmarks[12] = serde_json::json!({"x": 0.6, "y": 0.4});
        landmarks[23] = serde_json::json!({"x": 0.4, "y": 0.7});
        landmarks[24] = serde_json::json!({"x": 0.6, "y": 0.7});

        let frame = serde_json::json!({
            "schema_version": "pose.frame.v1",
            "timestamp": "2025-06-01T12:00:00Z",
            "source": {"tracking_source": "laptop"},
            "landmarks": landmarks,
        });
        CString::new(frame.to_string()).unwrap()
    }

    #[test]
    fn test_ffi_score_frame() {
        let frame = upright_frame_json();

        unsafe {
            let result = posturely_score_frame(frame.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let parsed: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(parsed["score"], 100);
            assert!(parsed["flags"].as_array().unwrap().is_empty());

            posturely_free_string(result);
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let source = CString::new("laptop").unwrap();
            let session = posturely_session_new(source.as_ptr());
            assert!(!session.is_null());

            let frame = upright_frame_json();
            assert_eq!(posturely_session_calibrate(session, frame.as_ptr()), 1);
            // Second calibration attempt is rejected
            assert_eq!(posturely_session_calibrate(session, frame.as_ptr()), 0);

            let update = posturely_session_tick(session, frame.as_ptr());
            assert!(!update.is_null());
            let update_str = CStr::from_ptr(update).to_str().unwrap();
            let parsed: serde_json::Value = serde_json::from_str(update_str).unwrap();
            assert_eq!(parsed["smoothed_score"], 100);
            assert_eq!(parsed["status"], "GOOD");
            posturely_free_string(update);

            // Partial minute, then stop flushes it
            let base_ms = 1_748_779_200_000i64;
            for s in 0..5 {
                let sample = posturely_session_second_tick(session, base_ms + s * 1000);
                assert!(sample.is_null());
                assert!(posturely_last_error().is_null());
            }

            let sample = posturely_session_stop(session, base_ms + 5000);
            assert!(!sample.is_null());
            let sample_str = CStr::from_ptr(sample).to_str().unwrap();
            let parsed: serde_json::Value = serde_json::from_str(sample_str).unwrap();
            assert_eq!(parsed["average_score"], 100);
            assert_eq!(parsed["samples_count"], 5);
            posturely_free_string(sample);

            posturely_session_free(session);
        }
    }

    #[test]
    fn test_ffi_rejects_unknown_source() {
        unsafe {
            let source = CString::new("webcam").unwrap();
            let session = posturely_session_new(source.as_ptr());
            assert!(session.is_null());

            let error = posturely_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert_eq!(error_str, "Unsupported tracking source: webcam");
        }
    }

    #[test]
    fn test_ffi_rejects_wrong_schema_version() {
        let frame = serde_json::json!({
            "schema_version": "pose.frame.v2",
            "timestamp": "2025-06-01T12:00:00Z",
            "source": {"tracking_source": "laptop"},
            "landmarks": [],
        });
        let frame = CString::new(frame.to_string()).unwrap();

        unsafe {
            let result = posturely_score_frame(frame.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = posturely_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("pose.frame.v1"));
            assert!(error_str.contains("pose.frame.v2"));
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid = CString::new("not json").unwrap();
            let result = posturely_score_frame(invalid.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = posturely_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = posturely_version();
            assert!(!version.is_null());
            assert!(!CStr::from_ptr(version).to_str().unwrap().is_empty());
        }
    }
}
