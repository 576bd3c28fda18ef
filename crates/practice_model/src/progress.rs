//! Spaced-practice progress for a single poem

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Practice progress as reported by the practice screen.
///
/// A poem climbs through memorization stages; within a stage it has to be
/// recited a number of times (`stage_repetition`) before it is promoted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Current memorization stage (0 = just added)
    pub stage: u32,
    /// Repetitions completed within the current stage
    pub stage_repetition: u32,
    /// When the poem was last practiced
    pub last_practiced: Option<DateTime<Utc>>,
    /// Total number of reviews passed
    pub successful_reviews: u32,
    /// Total number of hints revealed
    pub hints_used: u32,
}

impl Progress {
    /// Progress for a poem that has never been practiced
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stage and repetition
    pub fn with_stage(mut self, stage: u32, repetition: u32) -> Self {
        self.stage = stage;
        self.stage_repetition = repetition;
        self
    }

    /// Set the review counters
    pub fn with_reviews(mut self, successful_reviews: u32, hints_used: u32) -> Self {
        self.successful_reviews = successful_reviews;
        self.hints_used = hints_used;
        self
    }

    /// Set the last practice time
    pub fn practiced_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_practiced = Some(at);
        self
    }

    /// Stamp this progress, producing the snapshot kept locally.
    pub fn snapshot_at(self, updated_at: DateTime<Utc>) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self,
            updated_at,
        }
    }
}

/// The latest known progress of a poem, stamped with when it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub progress: Progress,
    pub updated_at: DateTime<Utc>,
}

impl std::ops::Deref for ProgressSnapshot {
    type Target = Progress;

    fn deref(&self) -> &Progress {
        &self.progress
    }
}
