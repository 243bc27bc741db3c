//! The external job facility, seen from the core
//!
//! All scheduling state lives behind this seam as a keyed map of
//! pending jobs: at most one live submission per key, and every new
//! submission for a key atomically replaces whatever was queued there.
//! That replace primitive is the only concurrency mechanism the core
//! relies on. The in-memory implementation here backs the tests and
//! the CLI schedule preview; a host application supplies its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job-queue keys for trend-derived alerts
pub const KEY_TREND_LOW: &str = "trend-low";
pub const KEY_TREND_HIGH: &str = "trend-high";

/// Job-queue key for the post-meal check reminder
pub const KEY_POST_MEAL: &str = "post-meal-check";

/// What a job carries through to its firing callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    /// A configured reminder; `setting_id` lets the firing handler look
    /// the setting back up to re-arm
    Reminder { setting_id: Uuid, message: String },

    /// A trend-derived threshold alert
    TrendAlert {
        message: String,
        /// Predicted instant of the threshold crossing
        expected_at: DateTime<Utc>,
    },

    /// A post-meal re-check prompt
    PostMealCheck { message: String },
}

impl JobPayload {
    /// The message handed to the notification facility on firing
    pub fn message(&self) -> &str {
        match self {
            JobPayload::Reminder { message, .. } => message,
            JobPayload::TrendAlert { message, .. } => message,
            JobPayload::PostMealCheck { message } => message,
        }
    }
}

/// A one-shot timed job bound for the external execution facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Stable key; the queue holds at most one live submission per key
    pub key: String,

    /// Instant the host should invoke the firing callback
    pub fire_at: DateTime<Utc>,

    pub payload: JobPayload,
}

/// The narrow interface the core drives the host's job facility through
pub trait JobQueue {
    /// Replace the key's pending submission with a single job
    fn submit(&mut self, job: ScheduledJob);

    /// Replace the key's pending submission with a batch that fires as
    /// a unit (used for the immediate + pre-emptive alert pair)
    fn submit_batch(&mut self, key: &str, jobs: Vec<ScheduledJob>);

    /// Drop the key's pending submission, if any
    fn cancel(&mut self, key: &str);
}

/// In-memory job queue for tests and the CLI schedule preview
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    pending: std::collections::HashMap<String, Vec<ScheduledJob>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs currently pending under a key
    pub fn pending(&self, key: &str) -> &[ScheduledJob] {
        self.pending.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All pending jobs across keys, soonest first
    pub fn all_pending(&self) -> Vec<&ScheduledJob> {
        let mut jobs: Vec<&ScheduledJob> = self.pending.values().flatten().collect();
        jobs.sort_by_key(|j| j.fire_at);
        jobs
    }

    /// Remove and return every job due at or before `now`, soonest
    /// first, the way a host would drain its timer wheel
    pub fn drain_due(&mut self, now: DateTime<Utc>) -> Vec<ScheduledJob> {
        let mut due = Vec::new();
        for jobs in self.pending.values_mut() {
            let mut i = 0;
            while i < jobs.len() {
                if jobs[i].fire_at <= now {
                    due.push(jobs.remove(i));
                } else {
                    i += 1;
                }
            }
        }
        self.pending.retain(|_, jobs| !jobs.is_empty());
        due.sort_by_key(|j| j.fire_at);
        due
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl JobQueue for InMemoryJobQueue {
    fn submit(&mut self, job: ScheduledJob) {
        self.pending.insert(job.key.clone(), vec![job]);
    }

    fn submit_batch(&mut self, key: &str, jobs: Vec<ScheduledJob>) {
        if jobs.is_empty() {
            self.pending.remove(key);
        } else {
            self.pending.insert(key.to_string(), jobs);
        }
    }

    fn cancel(&mut self, key: &str) {
        self.pending.remove(key);
    }
}
