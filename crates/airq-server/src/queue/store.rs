//! Job store abstraction
//!
//! The store is the single source of truth for job state. Every mutating
//! operation only applies when the job is in the state the transition starts
//! from; otherwise it reports `false` and leaves the record untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::job::{Job, JobId, JobProgress};
use crate::ingest::IngestionResult;

/// Terminal jobs kept by default
pub const DEFAULT_KEEP_COMPLETED: usize = 100;
pub const DEFAULT_KEEP_FAILED: usize = 50;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt job record {id}: {reason}")]
    Corrupt { id: JobId, reason: String },
}

/// How many terminal jobs survive eviction, newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_completed: usize,
    pub keep_failed: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_completed: DEFAULT_KEEP_COMPLETED,
            keep_failed: DEFAULT_KEEP_FAILED,
        }
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Record a new `queued` job
    async fn insert(&self, job: &Job) -> Result<(), QueueError>;

    /// Move the oldest `queued` job to `active`, stamping `started_at` and
    /// counting the first attempt
    async fn claim_next(&self) -> Result<Option<Job>, QueueError>;

    /// Persist the attempt counter and last error of an `active` job
    async fn record_attempt(&self, id: JobId, attempt: u32, error: &str) -> Result<bool, QueueError>;

    /// Replace the progress snapshot of an `active` job
    async fn update_progress(&self, id: JobId, progress: JobProgress) -> Result<bool, QueueError>;

    /// `active → completed` with the ingestion result attached
    async fn complete(&self, id: JobId, result: &IngestionResult) -> Result<bool, QueueError>;

    /// `active → failed` with the failure reason
    async fn fail(&self, id: JobId, error: &str) -> Result<bool, QueueError>;

    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError>;

    /// Fail every `active` job started before `started_before`; returns the
    /// failed records so their uploads can be removed
    async fn fail_stalled(
        &self,
        started_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<Job>, QueueError>;

    /// Drop terminal jobs beyond the retention window; returns how many
    async fn evict_terminal(&self, policy: RetentionPolicy) -> Result<u64, QueueError>;

    /// Liveness check
    async fn ping(&self) -> Result<(), QueueError>;
}
