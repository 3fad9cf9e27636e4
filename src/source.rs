//! Pose acquisition
//!
//! The tick loop consumes landmark frames through the [`PoseSource`] trait so
//! that live-sensor and simulated producers are an explicit selection at
//! startup rather than a runtime fallback. Live producers (camera + pose
//! detector callbacks) publish into a [`SharedPoseSlot`]: a single-slot,
//! latest-value handoff with overwrite semantics — only the most recent frame
//! matters, so nothing queues and neither side blocks for long.

use std::sync::{Arc, Mutex};

use crate::types::{landmark_index as idx, Landmark, POSE_LANDMARK_COUNT};

/// A producer of landmark frames for the tracking loop
pub trait PoseSource {
    /// Begin producing frames
    fn start(&mut self);
    /// Stop producing frames and clear any held frame
    fn stop(&mut self);
    fn is_tracking(&self) -> bool;
    /// Most recent frame, if any. Repeated calls may return the same frame;
    /// the scoring path is idempotent over duplicates.
    fn latest_frame(&self) -> Option<Vec<Landmark>>;
}

/// Shared single-slot frame handoff between an asynchronous producer
/// callback and the single-threaded tick loop.
///
/// Cloning shares the slot. A publish overwrites whatever frame was there;
/// consumers never observe a partially written frame.
#[derive(Debug, Clone, Default)]
pub struct SharedPoseSlot {
    slot: Arc<Mutex<Option<Vec<Landmark>>>>,
}

impl SharedPoseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the latest frame, replacing any unconsumed one
    pub fn publish(&self, landmarks: Vec<Landmark>) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(landmarks);
    }

    /// Snapshot of the latest frame without consuming it
    pub fn peek(&self) -> Option<Vec<Landmark>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    /// Remove and return the latest frame
    pub fn take(&self) -> Option<Vec<Landmark>> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }

    /// Drop any held frame (producer stopped or subject lost)
    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

/// Live source backed by a [`SharedPoseSlot`] that some platform bridge
/// publishes into from its detection callback.
pub struct SlotPoseSource {
    slot: SharedPoseSlot,
    tracking: bool,
}

impl SlotPoseSource {
    pub fn new(slot: SharedPoseSlot) -> Self {
        Self {
            slot,
            tracking: false,
        }
    }
}

impl PoseSource for SlotPoseSource {
    fn start(&mut self) {
        self.tracking = true;
    }

    fn stop(&mut self) {
        self.tracking = false;
        self.slot.clear();
    }

    fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn latest_frame(&self) -> Option<Vec<Landmark>> {
        if !self.tracking {
            return None;
        }
        self.slot.peek()
    }
}

/// Deterministic synthetic source: an upright subject with a slow sway.
///
/// Useful on hosts without a camera bridge and in integration tests; selected
/// explicitly at startup instead of being an error-path fallback.
pub struct SimulatedPoseSource {
    tracking: bool,
    phase: u32,
}

impl Default for SimulatedPoseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPoseSource {
    pub fn new() -> Self {
        Self {
            tracking: false,
            phase: 0,
        }
    }

    /// Advance the sway phase by one frame
    pub fn advance(&mut self) {
        self.phase = self.phase.wrapping_add(1);
    }

    fn frame(&self) -> Vec<Landmark> {
        // Sway amplitude stays well inside the default thresholds
        let sway = (self.phase as f32 / 20.0).sin() * 0.005;

        let mut frame = vec![Landmark::new(0.5, 0.55); POSE_LANDMARK_COUNT];
        // Nose sits just above the shoulder line so the head offset stays
        // inside the default forward-head threshold
        frame[idx::NOSE] = Landmark::new(0.5 + sway, 0.37);
        frame[idx::LEFT_SHOULDER] = Landmark::new(0.4 + sway, 0.4);
        frame[idx::RIGHT_SHOULDER] = Landmark::new(0.6 + sway, 0.4);
        frame[idx::LEFT_HIP] = Landmark::new(0.4, 0.7);
        frame[idx::RIGHT_HIP] = Landmark::new(0.6, 0.7);
        frame
    }
}

impl PoseSource for SimulatedPoseSource {
    fn start(&mut self) {
        self.tracking = true;
        self.phase = 0;
    }

    fn stop(&mut self) {
        self.tracking = false;
    }

    fn is_tracking(&self) -> bool {
        self.tracking
    }

    fn latest_frame(&self) -> Option<Vec<Landmark>> {
        if !self.tracking {
            return None;
        }
        Some(self.frame())
    }
}
