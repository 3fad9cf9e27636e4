//! Per-minute sample aggregation
//!
//! During tracking, one smoothed score is collected per visible second; at
//! each completed minute the recorder emits a [`PostureSample`] carrying the
//! truncated mean. The host persists samples wherever it likes (remote store,
//! local history); this module only aggregates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{PostureSample, TrackingSource};

/// Upper bound on retained per-second scores (one minute at 1/s)
const MAX_SCORES_PER_MINUTE: usize = 60;

/// Rolling aggregator for the current minute of a tracking session
#[derive(Debug, Clone)]
pub struct MinuteRecorder {
    session_id: Uuid,
    source: TrackingSource,
    scores: Vec<i32>,
}

impl MinuteRecorder {
    pub fn new(session_id: Uuid, source: TrackingSource) -> Self {
        Self {
            session_id,
            source,
            scores: Vec::with_capacity(MAX_SCORES_PER_MINUTE),
        }
    }

    /// Add one per-second smoothed score. Non-positive scores carry no
    /// signal (session start, subject absent) and are dropped. Retention is
    /// capped at one minute's worth; older entries fall off the front.
    pub fn add_score(&mut self, score: i32) {
        if score <= 0 {
            return;
        }
        self.scores.push(score);
        if self.scores.len() > MAX_SCORES_PER_MINUTE {
            self.scores.remove(0);
        }
    }

    /// Emit the sample for the minute just completed and reset for the next
    /// one. Returns `None` when no scores were collected (subject out of
    /// frame for the whole minute).
    pub fn emit(&mut self, now: DateTime<Utc>) -> Option<PostureSample> {
        if self.scores.is_empty() {
            return None;
        }
        let count = self.scores.len();
        let average = self.scores.iter().sum::<i32>() / count as i32;
        self.scores.clear();
        Some(PostureSample::at(
            self.session_id,
            self.source,
            average,
            count,
            now,
        ))
    }

    /// Truncated mean of the in-progress minute, 0 when empty
    pub fn current_average(&self) -> i32 {
        if self.scores.is_empty() {
            0
        } else {
            self.scores.iter().sum::<i32>() / self.scores.len() as i32
        }
    }

    /// Number of scores collected for the in-progress minute
    pub fn pending_count(&self) -> usize {
        self.scores.len()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}
