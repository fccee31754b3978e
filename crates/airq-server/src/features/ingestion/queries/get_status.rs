//! Get ingestion job status

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::queue::{JobQueue, JobStatus, QueueError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetIngestionStatusQuery {
    pub job_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetIngestionStatusError {
    #[error("Job not found")]
    NotFound,
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

pub async fn handle(
    queue: &JobQueue,
    query: GetIngestionStatusQuery,
) -> Result<JobStatus, GetIngestionStatusError> {
    // a malformed id cannot name an existing job
    let job_id = Uuid::parse_str(query.job_id.trim()).map_err(|_| GetIngestionStatusError::NotFound)?;

    queue
        .status(job_id)
        .await?
        .ok_or(GetIngestionStatusError::NotFound)
}
