//! Job model

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::IngestionResult;

pub type JobId = Uuid;

/// Lifecycle state of an ingestion job
///
/// `queued → active → {completed | failed}`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Active)
                | (JobState::Active, JobState::Completed)
                | (JobState::Active, JobState::Failed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{}'", other)),
        }
    }
}

/// What was submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobData {
    /// Temporary upload location; removed once the job is terminal
    pub file_path: PathBuf,
    pub original_file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub submitted_by: String,
}

/// Latest progress snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub processed: u64,
    pub total: u64,
    pub percentage: u32,
}

impl JobProgress {
    pub fn new(processed: u64, total: u64) -> Self {
        Self {
            processed,
            total,
            percentage: completion_percentage(processed, total),
        }
    }
}

/// `round(processed / total * 100)`, 0 when there is nothing to process
pub fn completion_percentage(processed: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u32
}

/// Job record as held by a [`JobStore`](super::JobStore)
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub data: JobData,
    pub state: JobState,
    /// Attempts started so far
    pub attempts: u32,
    pub max_attempts: u32,
    pub progress: JobProgress,
    pub result: Option<IngestionResult>,
    /// Last failure reason; set on retries and on terminal failure
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(data: JobData, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            state: JobState::Queued,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            progress: JobProgress::default(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.id,
            state: self.state,
            progress: self.progress,
            result: self.result.clone(),
            error: self.error.clone(),
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            original_file_name: self.data.original_file_name.clone(),
            created_at: self.created_at,
            processed_on: self.started_at,
            finished_on: self.finished_at,
        }
    }
}

/// Polling view of a job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: JobProgress,
    pub result: Option<IngestionResult>,
    pub error: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub original_file_name: String,
    pub created_at: DateTime<Utc>,
    pub processed_on: Option<DateTime<Utc>>,
    pub finished_on: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(JobState::Queued.can_transition_to(JobState::Active));
        assert!(JobState::Active.can_transition_to(JobState::Completed));
        assert!(JobState::Active.can_transition_to(JobState::Failed));

        assert!(!JobState::Queued.can_transition_to(JobState::Completed));
        assert!(!JobState::Completed.can_transition_to(JobState::Failed));
        assert!(!JobState::Failed.can_transition_to(JobState::Active));
        assert!(!JobState::Active.can_transition_to(JobState::Queued));
    }

    #[test]
    fn test_state_round_trip() {
        for state in [JobState::Queued, JobState::Active, JobState::Completed, JobState::Failed] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("waiting".parse::<JobState>().is_err());
    }

    #[test]
    fn test_completion_percentage() {
        assert_eq!(completion_percentage(0, 0), 0);
        assert_eq!(completion_percentage(1000, 2500), 40);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 67);
        assert_eq!(completion_percentage(2500, 2500), 100);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let job = Job::new(
            JobData {
                file_path: PathBuf::from("/tmp/upload.csv"),
                original_file_name: "AirQualityUCI.csv".to_string(),
                uploaded_at: Utc::now(),
                submitted_by: "127.0.0.1".to_string(),
            },
            3,
        );

        let json = serde_json::to_value(job.status()).unwrap();
        assert_eq!(json["state"], "queued");
        assert_eq!(json["maxAttempts"], 3);
        assert_eq!(json["progress"]["percentage"], 0);
        assert!(json["processedOn"].is_null());
        assert!(json.get("jobId").is_some());
    }
}
