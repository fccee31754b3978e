//! In-process job store
//!
//! Used by the test suite and when the server runs with
//! `AIRQ_JOB_STORE=memory`. Jobs do not survive a restart.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::job::{Job, JobId, JobProgress, JobState};
use super::store::{JobStore, QueueError, RetentionPolicy};
use crate::ingest::IngestionResult;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// Ids of `queued` jobs, oldest first
    queued: VecDeque<JobId>,
}

impl Inner {
    fn transition(&mut self, id: JobId, to: JobState) -> Option<&mut Job> {
        let job = self.jobs.get_mut(&id)?;
        if !job.state.can_transition_to(to) {
            return None;
        }
        job.state = to;
        Some(job)
    }

    fn active(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&id).filter(|job| job.state == JobState::Active)
    }
}

#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let is_new = inner.jobs.insert(job.id, job.clone()).is_none();
        if is_new && job.state == JobState::Queued {
            inner.queued.push_back(job.id);
        }
        Ok(())
    }

    async fn claim_next(&self) -> Result<Option<Job>, QueueError> {
        let mut inner = self.inner.lock().await;

        let Some(id) = inner.queued.pop_front() else {
            return Ok(None);
        };

        Ok(inner.transition(id, JobState::Active).map(|job| {
            job.started_at = Some(Utc::now());
            job.attempts = 1;
            job.clone()
        }))
    }

    async fn record_attempt(&self, id: JobId, attempt: u32, error: &str) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .active(id)
            .map(|job| {
                job.attempts = attempt;
                job.error = Some(error.to_string());
            })
            .is_some())
    }

    async fn update_progress(&self, id: JobId, progress: JobProgress) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.active(id).map(|job| job.progress = progress).is_some())
    }

    async fn complete(&self, id: JobId, result: &IngestionResult) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .transition(id, JobState::Completed)
            .map(|job| {
                job.result = Some(result.clone());
                job.finished_at = Some(Utc::now());
            })
            .is_some())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .transition(id, JobState::Failed)
            .map(|job| {
                job.error = Some(error.to_string());
                job.finished_at = Some(Utc::now());
            })
            .is_some())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn fail_stalled(
        &self,
        started_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<Job>, QueueError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut stalled = Vec::new();

        for job in inner.jobs.values_mut() {
            let is_stalled = job.state == JobState::Active
                && job.started_at.is_some_and(|started| started < started_before);
            if is_stalled {
                job.state = JobState::Failed;
                job.error = Some(reason.to_string());
                job.finished_at = Some(now);
                stalled.push(job.clone());
            }
        }

        Ok(stalled)
    }

    async fn evict_terminal(&self, policy: RetentionPolicy) -> Result<u64, QueueError> {
        let mut inner = self.inner.lock().await;

        let mut evict = Vec::new();
        for (state, keep) in [
            (JobState::Completed, policy.keep_completed),
            (JobState::Failed, policy.keep_failed),
        ] {
            let mut terminal: Vec<&Job> = inner.jobs.values().filter(|j| j.state == state).collect();
            terminal.sort_by(|a, b| b.finished_at.cmp(&a.finished_at).then(b.id.cmp(&a.id)));
            evict.extend(terminal.iter().skip(keep).map(|j| j.id));
        }

        for id in &evict {
            inner.jobs.remove(id);
        }

        Ok(evict.len() as u64)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
